pub mod rate_limit;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::{
    config::Config,
    error::{GatewayError, Result},
    logger,
    models::{
        public_url, CompletionRequest, GenerationRequest, GenerationResult, ImageListing,
        ImagePayload, ImageSource, ModelInfo, StoredImage,
    },
    openrouter::OpenRouterClient,
    storage::{ImageStorage, LocalImageStorage, LISTING_LIMIT},
};
use base64::{
    alphabet,
    engine::{
        general_purpose::{GeneralPurpose, GeneralPurposeConfig},
        DecodePaddingMode,
    },
    Engine as _,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use uuid::Uuid;

pub use rate_limit::{RateDecision, RateLimiter};

/// Per-batch values shared by every image of one generation.
struct Batch<'a> {
    request_id: &'a str,
    prompt: &'a str,
    model: &'a str,
    timestamp: i64,
    width: u32,
    height: u32,
}

pub struct Gateway {
    client: OpenRouterClient,
    limiter: RateLimiter,
    storage: Arc<dyn ImageStorage>,
    default_api_key: Option<String>,
    fetch_concurrency: usize,
    last_batch: AtomicI64,
}

impl Gateway {
    pub fn new(config: &Config, storage: Arc<dyn ImageStorage>) -> Result<Self> {
        Ok(Self {
            client: OpenRouterClient::new(config)?,
            limiter: RateLimiter::new(&config.rate_limit),
            storage,
            default_api_key: config.provider.api_key.clone(),
            fetch_concurrency: config.fetch_concurrency.max(1),
            last_batch: AtomicI64::new(0),
        })
    }

    /// Gateway backed by the content directory named in `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let storage = LocalImageStorage::new(config.uploads_dir.clone()).await?;
        Self::new(config, Arc::new(storage))
    }

    pub fn storage(&self) -> &Arc<dyn ImageStorage> {
        &self.storage
    }

    pub fn models(&self) -> Vec<ModelInfo> {
        self.client.models().supported_models()
    }

    /// Runs one generation for the caller `identity`.
    ///
    /// Rate limiting and validation fail before the provider is contacted.
    /// A provider failure aborts the whole request with nothing written.
    /// Images that cannot be fetched or decoded are skipped, so a successful
    /// result may carry fewer images than requested, or none.
    pub async fn submit(
        &self,
        identity: &str,
        request: GenerationRequest,
    ) -> Result<GenerationResult> {
        let request_id = Uuid::new_v4().simple().to_string()[..8].to_string();

        let decision = self.limiter.check(identity);
        if !decision.allowed {
            log::warn!(
                "[{}] Rate limit exceeded for {} (retry in {}ms)",
                request_id,
                identity,
                decision.retry_after_ms
            );
            return Err(GatewayError::RateLimitError {
                retry_after_ms: decision.retry_after_ms,
            });
        }

        if request.prompt.trim().is_empty() {
            return Err(GatewayError::ValidationError("prompt required".into()));
        }

        let api_key = request
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .or(self.default_api_key.as_deref())
            .ok_or_else(|| GatewayError::ValidationError("credential required".into()))?
            .to_string();

        let model = self.client.models().resolve(request.model.as_deref());
        let completion = CompletionRequest::image(
            model,
            request.prompt.as_str(),
            request.count(),
            request.size_hint(),
        );

        log::info!(
            "[{}] 🎨 Generation requested by {} (model key: {:?} -> {})",
            request_id,
            identity,
            request.model,
            model
        );

        let body = {
            let _timer = logger::timer("provider call");
            self.client.image().generate(&api_key, &completion).await?
        };

        let usage = body.get("usage").filter(|u| !u.is_null()).cloned();
        let entries = ImagePayload::from_response(&body).into_entries();
        if entries.is_empty() {
            log::warn!("[{}] Provider response contained no images", request_id);
        }

        let batch = Batch {
            request_id: &request_id,
            prompt: &request.prompt,
            model,
            timestamp: self.next_batch_timestamp(),
            width: request.width(),
            height: request.height(),
        };

        // buffered() keeps provider order, so filenames follow sequence index
        let stored: Vec<Option<StoredImage>> = stream::iter(entries.into_iter().enumerate())
            .map(|(i, entry)| self.store_entry(&batch, i + 1, entry))
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await?;
        let images: Vec<StoredImage> = stored.into_iter().flatten().collect();

        log::info!(
            "[{}] ✅ Stored {} image(s) for batch {}",
            request_id,
            images.len(),
            batch.timestamp
        );

        Ok(GenerationResult {
            success: true,
            images,
            usage,
        })
    }

    /// Most recent images in the content directory, newest first.
    pub async fn list(&self) -> Result<Vec<ImageListing>> {
        self.storage.list(LISTING_LIMIT).await
    }

    pub async fn read_image(&self, filename: &str) -> Result<Vec<u8>> {
        self.storage.read(filename).await
    }

    async fn store_entry(
        &self,
        batch: &Batch<'_>,
        index: usize,
        entry: Option<ImageSource>,
    ) -> Result<Option<StoredImage>> {
        let bytes = match entry {
            None => {
                log::warn!(
                    "[{}] Image {} has no url, skipping",
                    batch.request_id,
                    index
                );
                return Ok(None);
            }
            Some(ImageSource::Inline(uri)) => match decode_data_uri(&uri) {
                Some(bytes) => bytes,
                None => {
                    log::warn!(
                        "[{}] Image {} has an undecodable data URI, skipping",
                        batch.request_id,
                        index
                    );
                    return Ok(None);
                }
            },
            Some(ImageSource::Remote(url)) => match self.client.image().download(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!(
                        "[{}] Failed to fetch image URL {}: {}",
                        batch.request_id,
                        url,
                        e
                    );
                    return Ok(None);
                }
            },
        };

        let filename = format!("image_{}_{}.png", batch.timestamp, index);
        self.storage.save(&filename, &bytes).await?;

        Ok(Some(StoredImage {
            url: public_url(&filename),
            filename,
            prompt: batch.prompt.to_string(),
            model: batch.model.to_string(),
            timestamp: batch.timestamp,
            width: batch.width,
            height: batch.height,
        }))
    }

    /// Epoch millis, strictly increasing across batches of this process.
    fn next_batch_timestamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self
            .last_batch
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }
}

/// Standard alphabet; padding optional, trailing bits tolerated.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes the payload of a `data:<mime>;base64,<payload>` URI.
///
/// Line breaks and other ASCII whitespace inside the payload are ignored.
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let (header, payload) = uri.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(compact).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, RateLimitConfig};
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use serde_json::json;
    use tempfile::TempDir;

    const PNG_HEADER_URI: &str = "data:image/png;base64,iVBORw0KGgo=";
    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn config(server: &MockServer, dir: &TempDir, api_key: Option<&str>) -> Config {
        let mut provider = ProviderConfig::new().with_base_url(server.url("/api/v1"));
        if let Some(key) = api_key {
            provider = provider.with_api_key(key);
        }
        Config::new()
            .with_uploads_dir(dir.path())
            .with_provider(provider)
    }

    async fn gateway(server: &MockServer, dir: &TempDir) -> Gateway {
        Gateway::from_config(&config(server, dir, Some("sk-default")))
            .await
            .unwrap()
    }

    fn files_in(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_decode_data_uri() {
        assert_eq!(decode_data_uri(PNG_HEADER_URI).unwrap(), PNG_HEADER);
        assert!(decode_data_uri("data:image/png;base64,!!!").is_none());
        assert!(decode_data_uri("data:image/png,raw").is_none());
        assert!(decode_data_uri("no-comma").is_none());
    }

    #[test]
    fn test_decode_data_uri_unpadded_and_wrapped() {
        assert_eq!(
            decode_data_uri("data:image/png;base64,iVBORw0KGgo").unwrap(),
            PNG_HEADER
        );
        assert_eq!(
            decode_data_uri("data:image/png;base64,iVBORw0K\nGgo=").unwrap(),
            PNG_HEADER
        );
        assert_eq!(
            decode_data_uri("data:image/png;base64, iVBO Rw0K\r\nGgo ").unwrap(),
            PNG_HEADER
        );
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_data_uri_image() {
        let server = MockServer::start_async().await;
        let missing = server.url("/cdn/missing.png");
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cdn/missing.png");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"images": [
                        {"image_url": {"url": PNG_HEADER_URI}},
                        {"image_url": {"url": missing}}
                    ]}}],
                    "usage": {"total_tokens": 12}
                }));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let gateway = gateway(&server, &dir).await;
        let result = gateway
            .submit("127.0.0.1", GenerationRequest::new("a lighthouse").with_num_images(2))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.images.len(), 1);
        assert_eq!(result.usage, Some(json!({"total_tokens": 12})));

        let image = &result.images[0];
        assert!(image.filename.starts_with("image_"));
        assert!(image.filename.ends_with("_1.png"));
        assert_eq!(image.url, format!("/uploads/{}", image.filename));
        assert_eq!(image.prompt, "a lighthouse");
        assert_eq!(image.model, "black-forest-labs/flux.2-pro");
        assert_eq!((image.width, image.height), (1024, 1024));

        assert_eq!(files_in(&dir), vec![image.filename.clone()]);
        assert_eq!(
            gateway.read_image(&image.filename).await.unwrap(),
            PNG_HEADER
        );
    }

    #[tokio::test]
    async fn test_sequence_index_follows_provider_position() {
        let server = MockServer::start_async().await;
        let remote = server.url("/cdn/ok.png");
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cdn/ok.png");
                then.status(200).body(vec![7u8, 7, 7]);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"images": [
                        {"type": "image_url"},
                        {"url": remote},
                        {"image_url": {"url": PNG_HEADER_URI}}
                    ]}}]
                }));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let gateway = gateway(&server, &dir).await;
        let result = gateway
            .submit("127.0.0.1", GenerationRequest::new("kites"))
            .await
            .unwrap();

        let suffixes: Vec<_> = result
            .images
            .iter()
            .map(|img| img.filename.rsplit('_').next().unwrap().to_string())
            .collect();
        assert_eq!(suffixes, vec!["2.png", "3.png"]);
        assert_eq!(
            gateway.read_image(&result.images[0].filename).await.unwrap(),
            vec![7, 7, 7]
        );
    }

    #[tokio::test]
    async fn test_flat_shape_base64() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200)
                    .json_body(json!({"data": [{"b64_json": "iVBORw0KGgo="}]}));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let gateway = gateway(&server, &dir).await;
        let result = gateway
            .submit("127.0.0.1", GenerationRequest::new("a cat").with_size(512, 768))
            .await
            .unwrap();

        assert_eq!(result.images.len(), 1);
        assert_eq!((result.images[0].width, result.images[0].height), (512, 768));
        assert_eq!(
            gateway.read_image(&result.images[0].filename).await.unwrap(),
            PNG_HEADER
        );
    }

    #[tokio::test]
    async fn test_empty_response_is_success() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content": "I cannot draw that."}}]
                }));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let result = gateway(&server, &dir)
            .await
            .submit("127.0.0.1", GenerationRequest::new("a cat"))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.images.is_empty());
        assert!(result.usage.is_none());
        assert!(files_in(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_upstream_error_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(429)
                    .json_body(json!({"error": {"message": "quota exceeded"}}));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let err = gateway(&server, &dir)
            .await
            .submit("127.0.0.1", GenerationRequest::new("a cat"))
            .await
            .unwrap_err();

        match err {
            GatewayError::UpstreamError(msg) => assert_eq!(msg, "quota exceeded"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(files_in(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let server = MockServer::start_async().await;
        let provider = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200).json_body(json!({}));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let without_key = Gateway::from_config(&config(&server, &dir, None))
            .await
            .unwrap();

        let err = without_key
            .submit("127.0.0.1", GenerationRequest::new("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ValidationError(ref m) if m == "prompt required"));

        let err = without_key
            .submit("127.0.0.1", GenerationRequest::new("a cat"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ValidationError(ref m) if m == "credential required"));

        provider.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_request_credential_and_model_fallback() {
        let server = MockServer::start_async().await;
        let provider = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/chat/completions")
                    .header("authorization", "Bearer sk-caller")
                    .body_includes("\"model\":\"black-forest-labs/flux.2-pro\"")
                    .body_includes("\"n\":4")
                    .body_includes("\"size\":\"1280x720\"");
                then.status(200).json_body(json!({"data": []}));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let gateway = Gateway::from_config(&config(&server, &dir, None))
            .await
            .unwrap();
        let request = GenerationRequest::new("a cat")
            .with_model("dalle-9000")
            .with_size(1280, 720)
            .with_num_images(6)
            .with_api_key("sk-caller");

        gateway.submit("127.0.0.1", request).await.unwrap();
        provider.assert_async().await;
    }

    #[tokio::test]
    async fn test_slow_download_is_skipped() {
        let server = MockServer::start_async().await;
        let slow = server.url("/cdn/slow.png");
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cdn/slow.png");
                then.status(200)
                    .body(vec![1u8, 2, 3])
                    .delay(std::time::Duration::from_secs(3));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200).json_body(json!({
                    "data": [{"url": slow}, {"b64_json": "iVBORw0KGgo="}]
                }));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let provider = ProviderConfig::new()
            .with_base_url(server.url("/api/v1"))
            .with_api_key("sk-default")
            .with_timeouts(
                std::time::Duration::from_secs(5),
                std::time::Duration::from_millis(200),
            );
        let gateway = Gateway::from_config(
            &Config::new()
                .with_uploads_dir(dir.path())
                .with_provider(provider),
        )
        .await
        .unwrap();

        let result = gateway
            .submit("127.0.0.1", GenerationRequest::new("a cat").with_num_images(2))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.images.len(), 1);
        assert!(result.images[0].filename.ends_with("_2.png"));
        assert_eq!(files_in(&dir), vec![result.images[0].filename.clone()]);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_before_provider() {
        let server = MockServer::start_async().await;
        let provider = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200).json_body(json!({"data": []}));
            })
            .await;

        let dir = TempDir::new().unwrap();
        let config = config(&server, &dir, Some("sk"))
            .with_rate_limit(RateLimitConfig::new(60_000, 2));
        let gateway = Gateway::from_config(&config).await.unwrap();

        for _ in 0..2 {
            gateway
                .submit("10.1.1.1", GenerationRequest::new("a cat"))
                .await
                .unwrap();
        }
        let err = gateway
            .submit("10.1.1.1", GenerationRequest::new("a cat"))
            .await
            .unwrap_err();
        match err {
            GatewayError::RateLimitError { retry_after_ms } => {
                assert!(retry_after_ms > 0 && retry_after_ms <= 60_000)
            }
            other => panic!("unexpected error: {other:?}"),
        }

        gateway
            .submit("10.1.1.2", GenerationRequest::new("a cat"))
            .await
            .unwrap();
        provider.assert_calls_async(3).await;
    }

    #[tokio::test]
    async fn test_batch_timestamps_strictly_increase() {
        let server = MockServer::start_async().await;
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&server, &dir).await;

        let stamps: Vec<i64> = (0..100).map(|_| gateway.next_batch_timestamp()).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
