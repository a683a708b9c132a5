pub mod image_client;
pub mod models;

use crate::{config::Config, error::Result};

pub use image_client::ImageClient;
pub use models::ModelResolver;

#[derive(Clone)]
pub struct OpenRouterClient {
    image_client: ImageClient,
    models: ModelResolver,
}

impl OpenRouterClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            image_client: ImageClient::new(config.provider.clone())?,
            models: ModelResolver::new(&config.default_model),
        })
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }

    pub fn models(&self) -> &ModelResolver {
        &self.models
    }
}
