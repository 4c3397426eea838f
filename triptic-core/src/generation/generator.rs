//! Generator trait for external image and video backends

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::ids::JobId;
use crate::storage::types::Screen;

/// Backend that turns prompts and images into new media bytes.
///
/// Calls may take from seconds to several minutes. Failures are reported as
/// errors and end up on the job, never as a registry change.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Produce an image for one screen.
    ///
    /// `context` holds the current images of other screens in the same group
    /// that the result should stay visually consistent with.
    async fn generate(&self, prompt: &str, screen: Screen, context: &[Vec<u8>]) -> Result<Vec<u8>>;

    /// Modify an existing image according to `prompt`
    async fn edit(&self, image: &[u8], prompt: &str) -> Result<Vec<u8>>;

    /// Animate an image into a short video
    async fn generate_video(&self, image: &[u8], prompt: &str) -> Result<Vec<u8>>;

    /// Best-effort request to stop work for a cancelled job
    async fn abort(&self, _job: &JobId) {}
}
