use serde::{Deserialize, Serialize};

/// Every backend response is wrapped in this envelope, errors included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    /// Number of documents matching the query, for list responses.
    #[serde(default)]
    pub count: u64,
}

impl<T> Envelope<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            meta: Meta {
                success: true,
                message: message.into(),
                count: 0,
            },
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.meta.count = count;
        self
    }
}

/// The part of an error response we care about. `data` is usually null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub meta: Meta,
}

impl ErrorBody {
    /// Extract the server message from an error body, falling back to the
    /// raw text when it isn't an envelope.
    pub fn message_from(text: &str) -> String {
        match serde_json::from_str::<ErrorBody>(text) {
            Ok(body) if !body.meta.message.is_empty() => body.meta.message,
            _ => text.to_string(),
        }
    }
}
