use super::{ImageService, ProcessedImage, ResizeOptions};
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Returns canned bytes instead of decoding anything.
#[derive(Clone)]
pub struct MockImageProcessor {
    process_count: Arc<Mutex<usize>>,
    last_options: Arc<Mutex<Option<ResizeOptions>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockImageProcessor {
    pub fn new() -> Self {
        Self {
            process_count: Arc::new(Mutex::new(0)),
            last_options: Arc::new(Mutex::new(None)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_process_count(&self) -> usize {
        *self.process_count.lock().unwrap()
    }

    pub fn last_options(&self) -> Option<ResizeOptions> {
        *self.last_options.lock().unwrap()
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageService for MockImageProcessor {
    async fn process_image(
        &self,
        image_data: &[u8],
        options: ResizeOptions,
    ) -> Result<ProcessedImage> {
        if *self.should_fail.lock().unwrap() {
            return Err(crate::Error::Image(image::ImageError::IoError(
                std::io::Error::other("Mock failure"),
            )));
        }

        *self.process_count.lock().unwrap() += 1;
        *self.last_options.lock().unwrap() = Some(options);

        let mut original = b"original:".to_vec();
        original.extend_from_slice(image_data);
        let mut thumbnail = b"thumbnail:".to_vec();
        thumbnail.extend_from_slice(image_data);

        Ok(ProcessedImage {
            original,
            thumbnail,
            width: options.max_width,
            height: options.max_height,
            content_type: "image/jpeg",
            extension: "jpg",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_image_processor() {
        let processor = MockImageProcessor::new();

        let result = processor
            .process_image(b"img", ResizeOptions::default())
            .await
            .unwrap();

        assert_eq!(result.original, b"original:img");
        assert_eq!(result.thumbnail, b"thumbnail:img");
        assert_eq!(processor.get_process_count(), 1);
        assert_eq!(processor.last_options(), Some(ResizeOptions::default()));
    }

    #[tokio::test]
    async fn test_mock_with_failure() {
        let processor = MockImageProcessor::new().with_failure(true);

        let result = processor.process_image(b"data", ResizeOptions::default()).await;
        assert!(result.is_err());
    }
}
