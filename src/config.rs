use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL_KEY: &str = "flux2-pro";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub referer: String,
    pub title: String,
    pub request_timeout: Duration,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: Option<u16>,
    pub uploads_dir: PathBuf,
    pub default_model: String,
    pub fetch_concurrency: usize,
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: "http://localhost:3001".to_string(),
            title: "BildGenerator".to_string(),
            request_timeout: Duration::from_secs(120),
            fetch_timeout: Duration::from_secs(60),
        }
    }
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let base_url = env::var("OPENROUTER_BASE_URL").unwrap_or(defaults.base_url);
        let referer = env::var("OPENROUTER_REFERER").unwrap_or(defaults.referer);
        let title = env::var("OPENROUTER_TITLE").unwrap_or(defaults.title);
        let request_timeout = env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let fetch_timeout = env::var("FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);

        ProviderConfig {
            api_key,
            base_url,
            referer,
            title,
            request_timeout,
            fetch_timeout,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeouts(mut self, request_timeout: Duration, fetch_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.fetch_timeout = fetch_timeout;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            window_ms: 60_000,
            max_requests: 10,
        }
    }
}

impl RateLimitConfig {
    pub fn new(window_ms: u64, max_requests: u32) -> Self {
        RateLimitConfig {
            window_ms,
            max_requests,
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let window_ms = env::var("RATE_LIMIT_WINDOW_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.window_ms);
        let max_requests = env::var("RATE_LIMIT_MAX_REQUESTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_requests);

        RateLimitConfig {
            window_ms,
            max_requests,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: None,
            uploads_dir: PathBuf::from("uploads"),
            default_model: DEFAULT_MODEL_KEY.to_string(),
            fetch_concurrency: 4,
            provider: ProviderConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = env::var("HOST").unwrap_or(defaults.host);
        let port = env::var("PORT").ok().and_then(|port| port.parse().ok());
        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.uploads_dir);
        let default_model = env::var("DEFAULT_MODEL").unwrap_or(defaults.default_model);
        let fetch_concurrency = env::var("FETCH_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.fetch_concurrency);

        Config {
            host,
            port,
            uploads_dir,
            default_model,
            fetch_concurrency,
            provider: ProviderConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
        }
    }

    /// Port to bind, falling back to 3001 when unset.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(3001)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = dir.into();
        self
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_provider(mut self, config: ProviderConfig) -> Self {
        self.provider = config;
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }
}
