//! Backend Pool Module
//!
//! This module manages the two shrinking working sets a run draws from: Bot API
//! mirror endpoints and bot tokens.
//!
//! # Features
//! - Least-used selection with random tie breaking
//! - Permanent removal of failing members (the working set only shrinks)
//! - Startup liveness probing of tokens through the endpoint pool
//!
//! # Example
//! ```ignore
//! use backend_pool::{CredentialPool, EndpointPool};
//!
//! let endpoints = EndpointPool::new(["api.telegram.org"])?;
//! let credentials = CredentialPool::probe(&endpoints, &client, tokens).await?;
//!
//! if let (Some(endpoint), Some(token)) = (endpoints.select(), credentials.select()) {
//!     // issue a call, then report the outcome back
//!     endpoints.record_success(&endpoint);
//!     credentials.record_success(&token);
//! }
//! ```

mod credential;
mod endpoint;
mod pool;

pub use credential::{CredentialPool, TokenProbe};
pub use endpoint::{normalize_address, EndpointPool};
pub use pool::{PoolEntry, PoolStats, UsagePool};
