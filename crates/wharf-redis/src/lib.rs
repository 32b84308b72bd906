//! wharf-redis: managed Redis connections for the Wharf platform
//!
//! Exposes one long-lived connection (single node or cluster) through the
//! plugin service registry, opened on the host's ready signal and closed
//! on shutdown, plus independently owned connections on demand via
//! [`RedisManager::isolate`].

pub mod config;
pub mod error;
pub mod handle;
pub mod plugin;
pub mod service;

pub use config::{RedisConfig, RedisInputConfig, RedisMode, RedisTopology, StartupFailurePolicy};
pub use error::RedisPluginError;
pub use handle::RedisHandle;
pub use plugin::RedisPlugin;
pub use service::{ConnectionState, RedisManager};
