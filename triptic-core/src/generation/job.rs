//! Generation job records

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::ids::{AssetGroupId, JobId};
use crate::storage::types::{ContentRef, Screen};

/// Maximum number of other screens passed to the generator as context
pub const MAX_CONTEXT_SCREENS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    ImageGenerate,
    ImageEdit,
    VideoGenerate,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::ImageGenerate => "image-generate",
            JobKind::ImageEdit => "image-edit",
            JobKind::VideoGenerate => "video-generate",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Complete,
    Error,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Error | JobState::Cancelled)
    }

    /// Whether `self -> to` is a legal forward transition
    pub fn can_transition(self, to: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, to),
            (Queued, Processing)
                | (Queued, Cancelled)
                | (Processing, Complete)
                | (Processing, Error)
                | (Processing, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Complete => "complete",
            JobState::Error => "error",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screen a job writes its result to
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobTarget {
    pub group: AssetGroupId,
    pub screen: Screen,
}

impl JobTarget {
    pub fn new(group: AssetGroupId, screen: Screen) -> Self {
        Self { group, screen }
    }
}

impl fmt::Display for JobTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.screen)
    }
}

/// Output of a completed job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub content_ref: ContentRef,
    /// Version number committed on the target screen
    pub version: u64,
}

/// Caller-supplied parameters for a job
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Empty means "reuse the target's current prompt" for generate and video jobs
    pub prompt: String,
    /// Other screens whose current images guide an image-generate job
    pub context: Vec<Screen>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, screens: impl IntoIterator<Item = Screen>) -> Self {
        self.context = screens.into_iter().collect();
        self
    }
}

/// Snapshot of a job as returned by `poll`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: JobId,
    pub kind: JobKind,
    pub target: JobTarget,
    pub state: JobState,
    /// Prompt after fallback resolution
    pub prompt: String,
    pub context: Vec<Screen>,
    pub result: Option<JobResult>,
    pub error_message: Option<String>,
    /// Unix timestamps (milliseconds)
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl GenerationJob {
    pub fn new(kind: JobKind, target: JobTarget, prompt: String, context: Vec<Screen>, now: i64) -> Self {
        Self {
            id: JobId::new(),
            kind,
            target,
            state: JobState::Queued,
            prompt,
            context,
            result: None,
            error_message: None,
            created_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `to` if legal; returns false and changes nothing otherwise
    pub(crate) fn transition(&mut self, to: JobState, now: i64) -> bool {
        if !self.state.can_transition(to) {
            return false;
        }
        self.state = to;
        if to == JobState::Processing {
            self.started_at = Some(now);
        }
        if to.is_terminal() {
            self.finished_at = Some(now);
        }
        true
    }

    pub(crate) fn complete(&mut self, result: JobResult, now: i64) -> bool {
        if !self.transition(JobState::Complete, now) {
            return false;
        }
        self.result = Some(result);
        true
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>, now: i64) -> bool {
        if !self.transition(JobState::Error, now) {
            return false;
        }
        self.error_message = Some(message.into());
        true
    }
}

/// Outcome of a batch cancel
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CancelReport {
    pub cancelled: Vec<JobId>,
    /// Already complete, failed or cancelled; left untouched
    pub already_terminal: Vec<JobId>,
    /// Never existed or already collected
    pub unknown: Vec<JobId>,
}
