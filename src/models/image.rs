use serde::{Deserialize, Serialize};

pub const DEFAULT_DIMENSION: u32 = 1024;
pub const MAX_IMAGES_PER_REQUEST: u32 = 4;

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: String,
    pub model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub num_images: Option<u32>,
    pub api_key: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_num_images(mut self, count: u32) -> Self {
        self.num_images = Some(count);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.width.filter(|w| *w > 0).unwrap_or(DEFAULT_DIMENSION)
    }

    pub fn height(&self) -> u32 {
        self.height.filter(|h| *h > 0).unwrap_or(DEFAULT_DIMENSION)
    }

    /// Requested image count, clamped into `1..=4`.
    pub fn count(&self) -> u32 {
        self.num_images
            .unwrap_or(1)
            .clamp(1, MAX_IMAGES_PER_REQUEST)
    }

    /// Size hint sent upstream, e.g. `"1024x1024"`.
    pub fn size_hint(&self) -> String {
        format!("{}x{}", self.width(), self.height())
    }
}

/// Metadata for an image written to the content directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredImage {
    pub filename: String,
    pub url: String,
    pub prompt: String,
    pub model: String,
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub images: Vec<StoredImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
}

/// One entry of the gallery listing, projected from a file on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageListing {
    pub filename: String,
    pub url: String,
    pub timestamp: i64,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageListResponse {
    pub images: Vec<ImageListing>,
}

/// Public URL under which a stored file is served.
pub fn public_url(filename: &str) -> String {
    format!("/uploads/{}", filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = GenerationRequest::new("a lighthouse");
        assert_eq!(request.width(), 1024);
        assert_eq!(request.height(), 1024);
        assert_eq!(request.count(), 1);
        assert_eq!(request.size_hint(), "1024x1024");
    }

    #[test]
    fn test_count_is_clamped() {
        assert_eq!(GenerationRequest::new("x").with_num_images(0).count(), 1);
        assert_eq!(GenerationRequest::new("x").with_num_images(9).count(), 4);
        assert_eq!(GenerationRequest::new("x").with_num_images(3).count(), 3);
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: GenerationRequest = serde_json::from_str(
            r#"{"prompt":"fox","model":"dalle3","width":1280,"height":720,"numImages":2,"apiKey":"sk-1"}"#,
        )
        .unwrap();

        assert_eq!(request.prompt, "fox");
        assert_eq!(request.model.as_deref(), Some("dalle3"));
        assert_eq!(request.size_hint(), "1280x720");
        assert_eq!(request.count(), 2);
        assert_eq!(request.api_key.as_deref(), Some("sk-1"));
    }

    #[test]
    fn test_usage_omitted_when_absent() {
        let result = GenerationResult {
            success: true,
            images: vec![],
            usage: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "images": []}));
    }
}
