use crate::{config::DEFAULT_MODEL_KEY, models::ModelInfo};

/// (key, display name, provider model id)
const MODEL_TABLE: &[(&str, &str, &str)] = &[
    ("flux2-pro", "FLUX.2 Pro", "black-forest-labs/flux.2-pro"),
    (
        "gemini",
        "Google Gemini 2.5 Flash Image",
        "google/gemini-2.5-flash-image-preview",
    ),
    ("dalle3", "DALL-E 3", "openai/dall-e-3"),
    ("dalle2", "DALL-E 2", "openai/dall-e-2"),
    (
        "stable-diffusion",
        "Stable Diffusion XL",
        "stabilityai/stable-diffusion-xl-v1.0",
    ),
];

/// Maps short model keys to provider model ids.
///
/// Unknown or missing keys never fail: they resolve to the default key's model.
#[derive(Debug, Clone)]
pub struct ModelResolver {
    default_key: &'static str,
}

impl ModelResolver {
    pub fn new(default_key: &str) -> Self {
        let default_key = match lookup(default_key) {
            Some((key, _, _)) => key,
            None => {
                log::warn!(
                    "⚠️  Default model '{}' is not supported, using '{}'",
                    default_key,
                    DEFAULT_MODEL_KEY
                );
                DEFAULT_MODEL_KEY
            }
        };
        Self { default_key }
    }

    pub fn default_key(&self) -> &str {
        self.default_key
    }

    pub fn resolve(&self, key: Option<&str>) -> &'static str {
        match key.and_then(lookup) {
            Some((_, _, provider_model)) => provider_model,
            None => {
                if let Some(key) = key {
                    log::debug!(
                        "Unknown model key '{}', falling back to '{}'",
                        key,
                        self.default_key
                    );
                }
                lookup(self.default_key)
                    .map(|(_, _, provider_model)| provider_model)
                    .unwrap_or(MODEL_TABLE[0].2)
            }
        }
    }

    pub fn supported_models(&self) -> Vec<ModelInfo> {
        MODEL_TABLE
            .iter()
            .map(|(key, name, provider_model)| ModelInfo {
                key: key.to_string(),
                name: name.to_string(),
                provider_model: provider_model.to_string(),
                default: *key == self.default_key,
            })
            .collect()
    }
}

impl Default for ModelResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_KEY)
    }
}

fn lookup(key: &str) -> Option<(&'static str, &'static str, &'static str)> {
    MODEL_TABLE.iter().copied().find(|(k, _, _)| *k == key)
}
