//! Image validation, resizing and re-encoding
//!
//! Course images are scaled down to fit the requested bounds and re-encoded
//! as JPEG, together with a small thumbnail for listings.

pub mod mime;
pub mod mock;
pub mod processor;

pub use mime::{detect_image_mime, ALLOWED_IMAGE_TYPES};
pub use mock::MockImageProcessor;
pub use processor::ImageProcessor;

use crate::Result;
use async_trait::async_trait;

pub const THUMBNAIL_MAX_WIDTH: u32 = 300;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeOptions {
    /// JPEG quality, 1..=100.
    pub quality: u8,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            quality: 80,
            max_width: 1200,
            max_height: 800,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub original: Vec<u8>,
    pub thumbnail: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
    pub extension: &'static str,
}

#[async_trait]
pub trait ImageService: Send + Sync {
    async fn process_image(&self, image_data: &[u8], options: ResizeOptions)
        -> Result<ProcessedImage>;
}
