//! Pure image transforms on encoded bytes
//!
//! Inputs may be any format the `image` crate was built with; outputs are PNG.

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("Failed to decode image")
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(out.into_inner())
}

/// Mirror an image left-to-right
pub fn flip_horizontal(bytes: &[u8]) -> Result<Vec<u8>> {
    encode_png(&decode(bytes)?.fliph())
}

/// Invert every colour channel, keeping alpha
pub fn invert(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut img = decode(bytes)?;
    img.invert();
    encode_png(&img)
}

/// A single-colour image
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Result<Vec<u8>> {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    encode_png(&DynamicImage::ImageRgb8(img))
}

/// Whether the bytes decode as an image at all
pub fn is_image(bytes: &[u8]) -> bool {
    image::guess_format(bytes).is_ok()
}
