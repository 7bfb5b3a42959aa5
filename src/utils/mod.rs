//! Utility modules
//!
//! Contains the retry wrapper and string helpers.

pub mod retry;
pub mod string;

pub use retry::{retry_with_delay, RetryConfig, RetryDecision, RetryResult};
pub use string::{mask_token, truncate_str};
