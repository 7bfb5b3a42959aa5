//! Service layer
//!
//! Pools, the Bot API client and the delivery dispatcher built on top of them.

pub mod backend_pool;
pub mod dispatcher;
pub mod telegram;

pub use backend_pool::{CredentialPool, EndpointPool, PoolStats, TokenProbe};
pub use dispatcher::Dispatcher;
pub use telegram::{BotApiClient, CallError};
