//! Request and response schemas for the remote messaging service

pub mod telegram;

pub use telegram::{file_key, photo_manifest, ApiResponse, InputMedia, MediaKind};
