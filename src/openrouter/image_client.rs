use crate::{
    config::ProviderConfig,
    error::{GatewayError, Result},
    models::{provider_error_message, CompletionRequest},
};
use reqwest::Client;
use serde_json::Value;

#[derive(Clone)]
pub struct ImageClient {
    http: Client,
    config: ProviderConfig,
}

impl ImageClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| GatewayError::ConfigError(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { http, config })
    }

    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }

    /// Calls the provider and returns its parsed body.
    ///
    /// An empty body parses as `{}`. A non-success status fails with the
    /// provider's own error message when it sent one.
    pub async fn generate(&self, api_key: &str, request: &CompletionRequest) -> Result<Value> {
        log::info!(
            "Generating {} image(s) with model: {} ({})",
            request.n,
            request.model,
            request.size
        );

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .timeout(self.config.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                log::error!("Provider request failed: {}", e);
                if e.is_timeout() {
                    GatewayError::UpstreamError("provider request timed out".into())
                } else {
                    GatewayError::UpstreamError(format!("provider request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            log::error!("Failed to read provider response: {}", e);
            if e.is_timeout() {
                GatewayError::UpstreamError("provider request timed out".into())
            } else {
                GatewayError::UpstreamError("invalid response".into())
            }
        })?;

        let body: Value = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&text).map_err(|e| {
                log::error!("Provider returned non-JSON body ({}): {}", status, e);
                GatewayError::UpstreamError("invalid response".into())
            })?
        };

        if !status.is_success() {
            let message = provider_error_message(&body)
                .unwrap_or_else(|| format!("API error: {}", status.as_u16()));
            log::error!("Provider error {}: {}", status.as_u16(), message);
            return Err(GatewayError::UpstreamError(message));
        }

        log::debug!("Provider response: {}", body);
        Ok(body)
    }

    /// Downloads one remote image.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .timeout(self.config.fetch_timeout)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamError(format!("image fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::UpstreamError(format!(
                "Failed to fetch image: {}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::UpstreamError(format!("image read failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
