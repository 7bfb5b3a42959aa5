//! Telegram batch uploader library
//!
//! Uploads images from directories and zip archives to a Telegram chat as
//! media groups, spreading the load over pools of bot tokens and Bot API
//! mirrors that shrink as members fail.

// Public modules
pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod schemas;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::{App, SourceTarget};
pub use config::Settings;
pub use error::{UploadError, UploadResult};
