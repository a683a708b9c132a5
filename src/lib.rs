pub mod config;
pub mod error;
pub mod gateway;
pub mod logger;
pub mod models;
pub mod openrouter;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;

pub use config::{Config, ProviderConfig, RateLimitConfig};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, RateDecision, RateLimiter};
pub use models::*;
pub use openrouter::{ImageClient, ModelResolver, OpenRouterClient};
pub use storage::{ImageStorage, LocalImageStorage};
