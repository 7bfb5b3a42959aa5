//! Configuration management module
//!
//! This module handles loading and validating application configuration
//! from environment variables, `.env` files and INI configuration files.

pub mod settings;

pub use settings::{
    split_list, BatchSettings, ConfigFile, LogFormat, RetrySettings, Settings, DEFAULT_API_URL,
    MAX_GROUP_SIZE,
};
