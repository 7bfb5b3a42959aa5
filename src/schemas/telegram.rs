//! Telegram Bot API schema types
//!
//! Only the pieces of the Bot API the uploader touches: the common response
//! envelope and the `InputMedia` descriptors of a media group.

use serde::{Deserialize, Serialize};

// ============================================================================
// Response Envelope
// ============================================================================

/// Envelope every Bot API method responds with
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub ok: bool,

    /// Human-readable failure reason (present when `ok` is false)
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub error_code: Option<i64>,

    #[serde(default)]
    pub result: Option<serde_json::Value>,

    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

/// Extra information attached to some failures
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseParameters {
    /// Seconds the server asks clients to wait after a 429
    #[serde(default)]
    pub retry_after: Option<u64>,
}

impl ApiResponse {
    /// Failure reason for logs and errors
    pub fn failure_reason(&self) -> String {
        match (&self.description, self.error_code) {
            (Some(description), _) => description.clone(),
            (None, Some(code)) => format!("error code {}", code),
            (None, None) => "response without ok flag".to_string(),
        }
    }
}

// ============================================================================
// Media Group
// ============================================================================

/// Media kind of a group member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
}

/// One entry of the `media` field of `sendMediaGroup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputMedia {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// `attach://<file key>` reference to a multipart file part
    pub media: String,
}

/// Multipart key of the file at position `index` of a batch
pub fn file_key(index: usize) -> String {
    format!("file{}", index)
}

impl InputMedia {
    pub fn photo_attachment(index: usize) -> Self {
        Self {
            kind: MediaKind::Photo,
            media: format!("attach://{}", file_key(index)),
        }
    }
}

/// `media` descriptors for a batch of `count` photos, in batch order
pub fn photo_manifest(count: usize) -> Vec<InputMedia> {
    (0..count).map(InputMedia::photo_attachment).collect()
}
