mod commands;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use clap_derive::{Parser, Subcommand};
use config::{PathManager, Settings, load_env_file};
use tracing::info;
use triptic_core::storage::{FsBlobStore, SqliteStorage, SqliteStore, SqliteStores};
use triptic_core::{
    EngineConfig, PlaceholderGenerator, PlaylistId, QueueConfig, Screen, Triptic,
};

#[derive(Parser, Debug)]
#[command(name = "triptic", author, version, about = "Manage triptych displays", long_about = None)]
struct Args {
    /// Use this directory for the database, blobs and logs
    #[arg(long, global = true, env = "TRIPTIC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show counts, the selected playlist and the display lock
    Status,
    /// Show what each screen displays now
    Display {
        #[arg(long)]
        playlist: Option<String>,
    },
    /// Manage asset groups
    #[command(subcommand)]
    AssetGroup(commands::AssetGroupCommand),
    /// Manage screen versions
    #[command(subcommand)]
    Version(commands::VersionCommand),
    /// Add a file as a new version of a screen
    Upload {
        group: String,
        screen: Screen,
        file: PathBuf,
        /// The file is a video
        #[arg(long)]
        video: bool,
    },
    /// Mirror the current image of a screen
    Flip { group: String, screen: Screen },
    /// Exchange two screens' histories
    Swap { group: String, a: Screen, b: Screen },
    /// Copy the current version of one screen onto another
    Copy {
        group: String,
        source: Screen,
        target: Screen,
    },
    /// Generate or edit a screen image and wait for the result
    Imgen {
        group: String,
        screen: Screen,
        /// Empty reuses the current prompt
        #[arg(default_value = "")]
        prompt: String,
        /// Other screens to pass as reference images
        #[arg(long, value_delimiter = ',')]
        context: Vec<Screen>,
        /// Edit the current image instead of generating a new one
        #[arg(long, conflicts_with = "context")]
        edit: bool,
    },
    /// Manage playlists
    #[command(subcommand)]
    Playlist(commands::PlaylistCommand),
    /// Pin or release the display
    #[command(subcommand)]
    Lock(commands::LockCommand),
}

fn engine_config(settings: &Settings) -> EngineConfig {
    EngineConfig {
        rotation_interval_secs: settings.rotation_interval_secs,
        queue: QueueConfig {
            max_concurrent_jobs: settings.max_concurrent_jobs,
            job_retention: Duration::from_secs(settings.job_retention_secs),
            ..QueueConfig::default()
        },
    }
}

async fn open(settings: &Settings) -> anyhow::Result<Triptic<SqliteStorage>> {
    PathManager::ensure_dirs_exist().context("Failed to create data directories")?;
    let db_path = PathManager::db_path().context("Could not determine database path")?;
    let blobs_dir = PathManager::blobs_dir().context("Could not determine blob directory")?;

    let blobs = FsBlobStore::new(blobs_dir);
    let stale = blobs.cleanup_temp_files().await?;
    if stale > 0 {
        info!("Removed {} stale temp files", stale);
    }
    let stores = SqliteStores::new(Arc::new(SqliteStore::open(&db_path)?), Arc::new(blobs));

    let generator = PlaceholderGenerator::new()
        .with_size(settings.placeholder_width, settings.placeholder_height);
    let triptic = Triptic::open(&stores, Arc::new(generator), engine_config(settings)).await?;

    if triptic.display().current_playlist().is_none() {
        if let Some(name) = &settings.default_playlist {
            let id = PlaylistId::parse(name)?;
            if triptic.display().playlist(&id).is_ok() {
                triptic.display().select_playlist(Some(id)).await?;
            }
        }
    }
    Ok(triptic)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    let args = Args::parse();

    if let Some(dir) = args.data_dir.clone() {
        PathManager::set_data_dir(dir);
    }
    let _guard = logging::init_logging(args.verbose);

    let settings = Settings::load();
    let triptic = open(&settings).await?;
    let out = commands::Output::new(args.json);

    let result = commands::run(&triptic, args.command, &out).await;
    triptic.shutdown().await;
    result
}
