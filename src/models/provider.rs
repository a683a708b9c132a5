use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat-completion body sent to the provider.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub modalities: Vec<String>,
    pub n: u32,
    pub size: String,
}

impl CompletionRequest {
    pub fn image(model: impl Into<String>, prompt: impl Into<String>, n: u32, size: String) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.into(),
            }],
            modalities: vec!["image".to_string(), "text".to_string()],
            n,
            size,
        }
    }
}

/// Where the bytes of one returned image live.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// `data:image/...;base64,...`
    Inline(String),
    Remote(String),
}

impl ImageSource {
    pub fn classify(raw: String) -> Self {
        if raw.starts_with("data:image") {
            ImageSource::Inline(raw)
        } else {
            ImageSource::Remote(raw)
        }
    }
}

/// Images carried by a provider response, decoded by which field is present.
///
/// Entries keep their position in the provider list; an entry without a usable
/// url is `None` so later entries still get their original sequence index.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    /// `choices[0].message.images[*].image_url.url` (or `.url`)
    Chat(Vec<Option<ImageSource>>),
    /// `data[*].url` or `data[*].b64_json`
    Flat(Vec<Option<ImageSource>>),
    Empty,
}

impl ImagePayload {
    pub fn from_response(body: &Value) -> Self {
        if let Some(images) = body
            .pointer("/choices/0/message/images")
            .and_then(Value::as_array)
        {
            let entries = images
                .iter()
                .map(|img| {
                    non_empty_str(img.pointer("/image_url/url"))
                        .or_else(|| non_empty_str(img.get("url")))
                        .map(|url| ImageSource::classify(url.to_string()))
                })
                .collect();
            return ImagePayload::Chat(entries);
        }

        if let Some(items) = body.get("data").and_then(Value::as_array) {
            let entries = items
                .iter()
                .map(|item| {
                    if let Some(url) = non_empty_str(item.get("url")) {
                        return Some(ImageSource::classify(url.to_string()));
                    }
                    non_empty_str(item.get("b64_json")).map(|data| {
                        ImageSource::Inline(format!("data:image/png;base64,{}", data))
                    })
                })
                .collect();
            return ImagePayload::Flat(entries);
        }

        ImagePayload::Empty
    }

    pub fn into_entries(self) -> Vec<Option<ImageSource>> {
        match self {
            ImagePayload::Chat(entries) | ImagePayload::Flat(entries) => entries,
            ImagePayload::Empty => Vec::new(),
        }
    }
}

/// Message from the provider's own `error` field, if it sent one.
pub fn provider_error_message(body: &Value) -> Option<String> {
    non_empty_str(body.pointer("/error/message"))
        .or_else(|| non_empty_str(body.get("error")))
        .map(String::from)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
