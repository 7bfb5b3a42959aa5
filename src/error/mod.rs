//! Error types shared across the uploader

mod types;

pub use types::{SourceError, UploadError, UploadResult};
