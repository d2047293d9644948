use super::{
    ImageService, ProcessedImage, ResizeOptions, THUMBNAIL_MAX_HEIGHT, THUMBNAIL_MAX_WIDTH,
};
use crate::{Error, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Resizes with the `image` crate on the blocking thread pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    fn fit_within(image: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
        if image.width() <= max_width && image.height() <= max_height {
            image.clone()
        } else {
            image.resize(max_width, max_height, FilterType::Lanczos3)
        }
    }

    // JPEG has no alpha channel; composite onto white so transparent
    // regions do not turn black.
    fn flatten(image: &DynamicImage) -> RgbImage {
        if !image.color().has_alpha() {
            return image.to_rgb8();
        }
        let rgba = image.to_rgba8();
        RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let alpha = a as u32;
            let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
            Rgb([blend(r), blend(g), blend(b)])
        })
    }

    fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let rgb = Self::flatten(image);
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(&rgb)?;
        Ok(bytes)
    }

    fn process_sync(image_data: &[u8], options: ResizeOptions) -> Result<ProcessedImage> {
        let format = image::guess_format(image_data)
            .map_err(|e| Error::Validation(format!("File content is not a supported image: {}", e)))?;
        if !matches!(
            format,
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Gif
        ) {
            return Err(Error::Validation(format!(
                "Unsupported image format: {:?}",
                format
            )));
        }

        // Truncated, corrupt or oversized input is the uploader's problem.
        let image = image::load_from_memory_with_format(image_data, format)
            .map_err(|e| Error::Validation(format!("Could not decode image: {}", e)))?;

        let original = Self::fit_within(&image, options.max_width, options.max_height);
        let thumbnail = Self::fit_within(&original, THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT);

        Ok(ProcessedImage {
            original: Self::encode_jpeg(&original, options.quality)?,
            thumbnail: Self::encode_jpeg(&thumbnail, options.quality)?,
            width: original.width(),
            height: original.height(),
            content_type: "image/jpeg",
            extension: "jpg",
        })
    }
}

#[async_trait]
impl ImageService for ImageProcessor {
    async fn process_image(
        &self,
        image_data: &[u8],
        options: ResizeOptions,
    ) -> Result<ProcessedImage> {
        let data = image_data.to_vec();
        tokio::task::spawn_blocking(move || Self::process_sync(&data, options))
            .await
            .map_err(|e| Error::Invariant(format!("Image processing task join error: {}", e)))?
    }
}
