//! Subcommand handlers

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap_derive::Subcommand;
use serde_json::json;
use triptic_core::storage::SqliteStorage;
use triptic_core::{
    AssetGroupId, AssetVersion, GenerationRequest, JobState, MediaKind, PlaylistId, Screen,
    ScreenContent, Triptic,
};

use crate::Command;

type Engine = Triptic<SqliteStorage>;

const POLL_EVERY: Duration = Duration::from_millis(200);

#[derive(Subcommand, Debug)]
pub enum AssetGroupCommand {
    /// Create an empty asset group, e.g. `animals/cat`
    Create { name: String },
    List,
    Show { name: String },
    /// Delete a group and remove it from every playlist
    Delete { name: String },
    Rename { name: String, new_name: String },
    /// Copy a group with all of its versions under a new name
    Duplicate { name: String, new_name: String },
}

#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    List { group: String, screen: Screen },
    /// Make a version current
    Set {
        group: String,
        screen: Screen,
        version: u64,
    },
    /// Delete a version that is not current
    Delete {
        group: String,
        screen: Screen,
        version: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlaylistCommand {
    Create {
        name: String,
        /// Seconds per item; defaults to the configured rotation interval
        #[arg(long)]
        interval: Option<u64>,
    },
    List,
    Show { name: String },
    /// Append a group to one or more playlists
    Add {
        group: String,
        #[arg(required = true)]
        playlists: Vec<String>,
    },
    Remove { name: String, group: String },
    /// Set the item order; every current item must be listed once
    Reorder {
        name: String,
        #[arg(required = true)]
        groups: Vec<String>,
    },
    Rename { name: String, new_name: String },
    /// Set seconds per item; omit to fall back to the configured default
    Interval { name: String, secs: Option<u64> },
    Delete { name: String },
    /// Select the playlist shown when none is named; omit to clear
    Select { name: Option<String> },
    /// Show the item on display now for the selected playlist
    Current,
}

#[derive(Subcommand, Debug)]
pub enum LockCommand {
    /// Pin every screen to one asset group
    Set { group: String },
    Clear,
}

/// Prints either human-readable lines or JSON
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit(&self, value: serde_json::Value, text: impl FnOnce() -> String) {
        if self.json {
            println!("{}", value);
        } else {
            println!("{}", text());
        }
    }
}

fn group_id(raw: &str) -> anyhow::Result<AssetGroupId> {
    Ok(AssetGroupId::parse(raw)?)
}

fn playlist_id(raw: &str) -> anyhow::Result<PlaylistId> {
    Ok(PlaylistId::parse(raw)?)
}

fn format_time(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn describe_version(v: &AssetVersion, current: bool) -> String {
    let marker = if current { "*" } else { " " };
    let derived = v
        .derived_from
        .map(|src| format!(" from {} v{}", src.screen, src.version))
        .unwrap_or_default();
    format!(
        "{} v{:<3} {:<9} {:<5} {}{}  {:?}",
        marker,
        v.version_number,
        v.origin.as_str(),
        if v.media == MediaKind::Video { "video" } else { "image" },
        format_time(v.created_at),
        derived,
        v.prompt
    )
}

pub async fn run(triptic: &Engine, command: Command, out: &Output) -> anyhow::Result<()> {
    match command {
        Command::Status => {
            let status = triptic.status().await;
            out.emit(serde_json::to_value(&status)?, || {
                format!(
                    "asset groups: {}\nplaylists: {}\nselected playlist: {}\nlock: {}\njobs: {} queued, {} processing",
                    status.asset_groups,
                    status.playlists,
                    status
                        .current_playlist
                        .as_ref()
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "(none)".into()),
                    status
                        .lock
                        .as_ref()
                        .map(|l| l.asset_group.to_string())
                        .unwrap_or_else(|| "(none)".into()),
                    status.queued_jobs,
                    status.processing_jobs,
                )
            });
        }
        Command::Display { playlist } => {
            let playlist = playlist.as_deref().map(playlist_id).transpose()?;
            let now = Utc::now();
            for screen in Screen::ALL {
                let item = triptic.display_item(playlist.as_ref(), screen, now).await?;
                out.emit(serde_json::to_value(&item)?, || {
                    let content = match &item.content {
                        ScreenContent::Version {
                            version, content_ref, ..
                        } => format!("v{} {}", version, content_ref),
                        ScreenContent::Placeholder => "(placeholder)".to_string(),
                    };
                    let lock = if item.locked { " [locked]" } else { "" };
                    format!("{:<6} {} {}{}", screen.as_str(), item.asset_group, content, lock)
                });
            }
        }
        Command::AssetGroup(cmd) => asset_group(triptic, cmd, out).await?,
        Command::Version(cmd) => version(triptic, cmd, out).await?,
        Command::Upload {
            group,
            screen,
            file,
            video,
        } => {
            let id = group_id(&group)?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let media = if video { MediaKind::Video } else { MediaKind::Image };
            let number = triptic.registry().upload(&id, screen, &bytes, media).await?;
            out.emit(json!({ "group": id, "screen": screen, "version": number }), || {
                format!("Uploaded {} as {}/{} v{}", file.display(), id, screen, number)
            });
        }
        Command::Flip { group, screen } => {
            let id = group_id(&group)?;
            let number = triptic.registry().flip(&id, screen).await?;
            out.emit(json!({ "group": id, "screen": screen, "version": number }), || {
                format!("Flipped {}/{} into v{}", id, screen, number)
            });
        }
        Command::Swap { group, a, b } => {
            let id = group_id(&group)?;
            triptic.registry().swap(&id, a, b).await?;
            out.emit(json!({ "group": id, "swapped": [a, b] }), || {
                format!("Swapped {} and {} of {}", a, b, id)
            });
        }
        Command::Copy {
            group,
            source,
            target,
        } => {
            let id = group_id(&group)?;
            let number = triptic.registry().copy(&id, source, target).await?;
            out.emit(json!({ "group": id, "screen": target, "version": number }), || {
                format!("Copied {} to {}/{} v{}", source, id, target, number)
            });
        }
        Command::Imgen {
            group,
            screen,
            prompt,
            context,
            edit,
        } => {
            let id = group_id(&group)?;
            let job_id = if edit {
                triptic.edit(&id, screen, &prompt).await?
            } else {
                let request = GenerationRequest::new(prompt).with_context(context);
                triptic.generate(&id, screen, request).await?
            };
            let job = triptic.queue().wait(&job_id, POLL_EVERY).await?;
            out.emit(serde_json::to_value(&job)?, || match (&job.state, &job.result) {
                (JobState::Complete, Some(result)) => format!(
                    "{} {}/{} v{} ({})",
                    job.kind, id, screen, result.version, result.content_ref
                ),
                _ => format!(
                    "{} {}: {}",
                    job.kind,
                    job.state,
                    job.error_message.as_deref().unwrap_or("no result")
                ),
            });
            if job.state != JobState::Complete {
                anyhow::bail!("job {} ended as {}", job.id, job.state);
            }
        }
        Command::Playlist(cmd) => playlist(triptic, cmd, out).await?,
        Command::Lock(LockCommand::Set { group }) => {
            let lock = triptic.set_lock(&group_id(&group)?).await?;
            out.emit(serde_json::to_value(&lock)?, || {
                format!("Display locked to {}", lock.asset_group)
            });
        }
        Command::Lock(LockCommand::Clear) => {
            let previous = triptic.clear_lock().await?;
            out.emit(json!({ "cleared": previous }), || match &previous {
                Some(lock) => format!("Released lock on {}", lock.asset_group),
                None => "Display was not locked".to_string(),
            });
        }
    }
    Ok(())
}

async fn asset_group(triptic: &Engine, cmd: AssetGroupCommand, out: &Output) -> anyhow::Result<()> {
    let registry = triptic.registry();
    match cmd {
        AssetGroupCommand::Create { name } => {
            let id = triptic.create_asset_group(&name).await?;
            out.emit(json!({ "created": id }), || format!("Created {}", id));
        }
        AssetGroupCommand::List => {
            let ids = registry.list();
            out.emit(json!(ids), || {
                ids.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        AssetGroupCommand::Show { name } => {
            let id = group_id(&name)?;
            let group = registry.get(&id).await?;
            let playlists = triptic.display().playlists_containing(&id);
            out.emit(json!({ "group": group, "playlists": playlists }), || {
                let mut lines = vec![format!("{} (created {})", id, format_time(group.created_at))];
                for (screen, store) in group.iter() {
                    let current = store
                        .current()
                        .map(|v| format!("v{} {:?}", v.version_number, v.prompt))
                        .unwrap_or_else(|| "(empty)".into());
                    lines.push(format!(
                        "  {:<6} {} versions, current {}",
                        screen.as_str(),
                        store.len(),
                        current
                    ));
                }
                if !playlists.is_empty() {
                    let names: Vec<String> = playlists.iter().map(|p| p.to_string()).collect();
                    lines.push(format!("  in playlists: {}", names.join(", ")));
                }
                lines.join("\n")
            });
        }
        AssetGroupCommand::Delete { name } => {
            let id = group_id(&name)?;
            registry.delete(&id).await?;
            out.emit(json!({ "deleted": id }), || format!("Deleted {}", id));
        }
        AssetGroupCommand::Rename { name, new_name } => {
            let new_id = triptic.rename_asset_group(&group_id(&name)?, &new_name).await?;
            out.emit(json!({ "renamed": name, "to": new_id }), || {
                format!("Renamed {} to {}", name, new_id)
            });
        }
        AssetGroupCommand::Duplicate { name, new_name } => {
            let new_id = triptic.duplicate_asset_group(&group_id(&name)?, &new_name).await?;
            out.emit(json!({ "duplicated": name, "to": new_id }), || {
                format!("Duplicated {} as {}", name, new_id)
            });
        }
    }
    Ok(())
}

async fn version(triptic: &Engine, cmd: VersionCommand, out: &Output) -> anyhow::Result<()> {
    let registry = triptic.registry();
    match cmd {
        VersionCommand::List { group, screen } => {
            let id = group_id(&group)?;
            let group = registry.get(&id).await?;
            let store = group.screen(screen);
            let current = store.current_number();
            out.emit(json!({ "current": current, "versions": store.versions() }), || {
                if store.is_empty() {
                    return format!("{}/{} has no versions", id, screen);
                }
                store
                    .versions()
                    .iter()
                    .map(|v| describe_version(v, Some(v.version_number) == current))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        VersionCommand::Set {
            group,
            screen,
            version,
        } => {
            let id = group_id(&group)?;
            registry.set_current(&id, screen, version).await?;
            out.emit(json!({ "group": id, "screen": screen, "current": version }), || {
                format!("{}/{} now shows v{}", id, screen, version)
            });
        }
        VersionCommand::Delete {
            group,
            screen,
            version,
        } => {
            let id = group_id(&group)?;
            let removed = registry.delete_version(&id, screen, version).await?;
            out.emit(serde_json::to_value(&removed)?, || {
                format!("Deleted {}/{} v{}", id, screen, removed.version_number)
            });
        }
    }
    Ok(())
}

async fn playlist(triptic: &Engine, cmd: PlaylistCommand, out: &Output) -> anyhow::Result<()> {
    let display = triptic.display();
    match cmd {
        PlaylistCommand::Create { name, interval } => {
            let created = display.create_playlist(playlist_id(&name)?, interval).await?;
            out.emit(serde_json::to_value(&created)?, || format!("Created playlist {}", created.id));
        }
        PlaylistCommand::List => {
            let playlists = display.playlists();
            let selected = display.current_playlist();
            out.emit(json!({ "selected": selected, "playlists": playlists }), || {
                playlists
                    .iter()
                    .map(|p| {
                        let marker = if Some(&p.id) == selected.as_ref() { "*" } else { " " };
                        format!(
                            "{} {:<20} {} items, {}s",
                            marker,
                            p.id.as_str(),
                            p.len(),
                            display.interval_for(p)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        PlaylistCommand::Show { name } => {
            let p = display.playlist(&playlist_id(&name)?)?;
            out.emit(serde_json::to_value(&p)?, || {
                let mut lines = vec![format!("{} ({}s per item)", p.id, display.interval_for(&p))];
                lines.extend(
                    p.items
                        .iter()
                        .enumerate()
                        .map(|(i, g)| format!("  {:>2}. {}", i + 1, g)),
                );
                lines.join("\n")
            });
        }
        PlaylistCommand::Add { group, playlists } => {
            let ids = playlists
                .iter()
                .map(|p| playlist_id(p))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let id = group_id(&group)?;
            let added = triptic.add_to_playlists(&id, &ids).await?;
            out.emit(json!({ "group": id, "added_to": added }), || {
                if added.is_empty() {
                    format!("{} was already in every playlist given", id)
                } else {
                    let names: Vec<String> = added.iter().map(|p| p.to_string()).collect();
                    format!("Added {} to {}", id, names.join(", "))
                }
            });
        }
        PlaylistCommand::Remove { name, group } => {
            let removed = display
                .remove_item(&playlist_id(&name)?, &group_id(&group)?)
                .await?;
            out.emit(json!({ "removed": removed }), || {
                if removed {
                    format!("Removed {} from {}", group, name)
                } else {
                    format!("{} is not in {}", group, name)
                }
            });
        }
        PlaylistCommand::Reorder { name, groups } => {
            let id = playlist_id(&name)?;
            let items = groups
                .iter()
                .map(|g| group_id(g))
                .collect::<anyhow::Result<Vec<_>>>()?;
            display.reorder(&id, items).await?;
            out.emit(json!({ "reordered": id }), || format!("Reordered {}", id));
        }
        PlaylistCommand::Rename { name, new_name } => {
            let renamed = display
                .rename_playlist(&playlist_id(&name)?, playlist_id(&new_name)?)
                .await?;
            out.emit(json!({ "renamed": name, "to": renamed.id }), || {
                format!("Renamed playlist {} to {}", name, renamed.id)
            });
        }
        PlaylistCommand::Interval { name, secs } => {
            let id = playlist_id(&name)?;
            display.set_interval(&id, secs).await?;
            let p = display.playlist(&id)?;
            let effective = display.interval_for(&p);
            out.emit(json!({ "playlist": id, "interval_secs": secs, "effective_secs": effective }), || {
                format!("{} now shows each item for {}s", id, effective)
            });
        }
        PlaylistCommand::Delete { name } => {
            let id = playlist_id(&name)?;
            display.delete_playlist(&id).await?;
            out.emit(json!({ "deleted": id }), || format!("Deleted playlist {}", id));
        }
        PlaylistCommand::Select { name } => {
            let id = name.as_deref().map(playlist_id).transpose()?;
            display.select_playlist(id.clone()).await?;
            out.emit(json!({ "selected": id }), || match &id {
                Some(id) => format!("Selected playlist {}", id),
                None => "Cleared playlist selection".to_string(),
            });
        }
        PlaylistCommand::Current => {
            let now = Utc::now();
            let group = triptic.rotator().resolve(None, now)?;
            let remaining = match display.current_playlist() {
                Some(p) if display.lock().is_none() => {
                    Some(triptic.rotator().seconds_until_next(&p, now)?)
                }
                _ => None,
            };
            out.emit(json!({ "asset_group": group, "next_in_secs": remaining }), || {
                match remaining {
                    Some(secs) => format!("{} (next in {}s)", group, secs),
                    None => format!("{} (locked)", group),
                }
            });
        }
    }
    Ok(())
}
