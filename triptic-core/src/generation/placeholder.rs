//! Offline generator producing flat colour frames
//!
//! Each screen has its own base colour. The prompt shifts the shade slightly so
//! that different prompts yield different content references.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::generator::Generator;
use crate::imaging;
use crate::storage::types::Screen;

/// Base colour used for a screen's placeholder art
pub fn screen_colour(screen: Screen) -> [u8; 3] {
    match screen {
        Screen::Left => [0x34, 0x98, 0xdb],
        Screen::Center => [0xe7, 0x4c, 0x3c],
        Screen::Right => [0x2e, 0xcc, 0x71],
    }
}

#[derive(Debug, Clone)]
pub struct PlaceholderGenerator {
    width: u32,
    height: u32,
    delay: Option<Duration>,
}

impl Default for PlaceholderGenerator {
    fn default() -> Self {
        Self {
            width: 270,
            height: 480,
            delay: None,
        }
    }
}

impl PlaceholderGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Simulate backend latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn shade(screen: Screen, prompt: &str) -> [u8; 3] {
        let digest = Sha256::digest(prompt.as_bytes());
        let base = screen_colour(screen);
        let mut out = [0u8; 3];
        for (i, channel) in out.iter_mut().enumerate() {
            let offset = (digest[i] % 32) as i16 - 16;
            *channel = (base[i] as i16 + offset).clamp(0, 255) as u8;
        }
        out
    }
}

#[async_trait]
impl Generator for PlaceholderGenerator {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn generate(&self, prompt: &str, screen: Screen, _context: &[Vec<u8>]) -> Result<Vec<u8>> {
        self.wait().await;
        imaging::solid_png(self.width, self.height, Self::shade(screen, prompt))
    }

    async fn edit(&self, image: &[u8], _prompt: &str) -> Result<Vec<u8>> {
        self.wait().await;
        imaging::invert(image)
    }

    async fn generate_video(&self, _image: &[u8], _prompt: &str) -> Result<Vec<u8>> {
        self.wait().await;
        anyhow::bail!("placeholder generator cannot produce video")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_is_deterministic_per_prompt() {
        let generator = PlaceholderGenerator::new().with_size(2, 2);
        let a = generator.generate("owl", Screen::Left, &[]).await.unwrap();
        let b = generator.generate("owl", Screen::Left, &[]).await.unwrap();
        assert_eq!(a, b);
        assert!(imaging::is_image(&a));
        // green channels sit 52 apart, more than the prompt offset can cover
        assert_ne!(
            PlaceholderGenerator::shade(Screen::Left, "owl"),
            PlaceholderGenerator::shade(Screen::Right, "owl")
        );
    }

    #[tokio::test]
    async fn test_video_unsupported() {
        let generator = PlaceholderGenerator::new();
        assert!(generator.generate_video(b"", "").await.is_err());
    }
}
