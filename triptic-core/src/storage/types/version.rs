//! Version records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::blob::ContentRef;
use super::screen::Screen;

/// Kind of media a version holds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

/// How a version came to exist
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionOrigin {
    Generate,
    Edit,
    Upload,
    Video,
    Flip,
    Copy,
    Duplicate,
}

impl VersionOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionOrigin::Generate => "generate",
            VersionOrigin::Edit => "edit",
            VersionOrigin::Upload => "upload",
            VersionOrigin::Video => "video",
            VersionOrigin::Flip => "flip",
            VersionOrigin::Copy => "copy",
            VersionOrigin::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for VersionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(VersionOrigin::Generate),
            "edit" => Ok(VersionOrigin::Edit),
            "upload" => Ok(VersionOrigin::Upload),
            "video" => Ok(VersionOrigin::Video),
            "flip" => Ok(VersionOrigin::Flip),
            "copy" => Ok(VersionOrigin::Copy),
            "duplicate" => Ok(VersionOrigin::Duplicate),
            other => Err(format!("Unknown version origin: {}", other)),
        }
    }
}

/// The version a derived version was produced from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSource {
    pub screen: Screen,
    pub version: u64,
}

/// An immutable snapshot of one screen's content
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetVersion {
    /// Monotonic number, unique within the owning screen
    pub version_number: u64,
    pub content_ref: ContentRef,
    /// Prompt that produced the content (empty for uploads)
    pub prompt: String,
    /// Unix timestamp (milliseconds) when created
    pub created_at: i64,
    pub media: MediaKind,
    pub origin: VersionOrigin,
    /// Set for flips and copies
    pub derived_from: Option<VersionSource>,
}

impl AssetVersion {
    /// Whether this version was derived from another one rather than produced fresh
    pub fn is_derived(&self) -> bool {
        self.derived_from.is_some()
    }
}

/// Input for a new version; the number and timestamp are assigned on commit
#[derive(Clone, Debug)]
pub struct NewVersion {
    pub content_ref: ContentRef,
    pub prompt: String,
    pub media: MediaKind,
    pub origin: VersionOrigin,
    pub derived_from: Option<VersionSource>,
}

impl NewVersion {
    pub fn new(content_ref: ContentRef, prompt: impl Into<String>, origin: VersionOrigin) -> Self {
        Self {
            content_ref,
            prompt: prompt.into(),
            media: MediaKind::Image,
            origin,
            derived_from: None,
        }
    }

    pub fn with_media(mut self, media: MediaKind) -> Self {
        self.media = media;
        self
    }

    pub fn derived_from(mut self, screen: Screen, version: u64) -> Self {
        self.derived_from = Some(VersionSource { screen, version });
        self
    }
}
