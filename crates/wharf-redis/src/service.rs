//! Connection manager: owns the primary handle and builds isolated ones

use std::time::Duration;

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::cluster::ClusterClientBuilder;
use redis::Client;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{RedisConfig, RedisTopology, StartupFailurePolicy};
use crate::error::RedisPluginError;
use crate::handle::RedisHandle;

/// Delay between attempts under the `retry` startup policy
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Lifecycle of the primary handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Startup has not fired yet, or the startup connect failed
    Uninitialized,
    /// Startup connect in flight
    Connecting,
    /// Primary handle is live
    Connected,
    /// Shutdown ran; terminal
    Disposed,
}

struct ManagerInner {
    state: ConnectionState,
    primary: Option<RedisHandle>,
}

/// Manages the long-lived primary connection and hands out isolated ones
///
/// The primary handle is written by exactly one logical path (startup)
/// and read by dependents only after that path completes. The manager is
/// shared through the service registry as an `Arc`, never as a global.
pub struct RedisManager {
    config: RedisConfig,
    inner: RwLock<ManagerInner>,
}

impl RedisManager {
    /// Create a manager from validated configuration
    pub fn new(config: RedisConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(ManagerInner {
                state: ConnectionState::Uninitialized,
                primary: None,
            }),
        }
    }

    /// The configuration this manager runs with
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Current lifecycle state of the primary handle
    pub async fn state(&self) -> ConnectionState {
        self.inner.read().await.state
    }

    /// The primary handle, if startup has completed successfully
    pub async fn handle(&self) -> Option<RedisHandle> {
        self.inner.read().await.primary.clone()
    }

    /// The primary handle, or [`RedisPluginError::NotConnected`] when unset
    pub async fn require_handle(&self) -> Result<RedisHandle, RedisPluginError> {
        self.handle().await.ok_or(RedisPluginError::NotConnected)
    }

    /// Open the primary connection. Invoked once by the host's ready signal.
    ///
    /// On failure the behavior follows the configured
    /// [`StartupFailurePolicy`]: the default leaves the primary unset and
    /// returns `Ok`, `retry` attempts the connect again before giving up,
    /// and `abort` returns the error to the host.
    pub async fn start(&self) -> Result<(), RedisPluginError> {
        {
            let mut inner = self.inner.write().await;
            match inner.state {
                ConnectionState::Uninitialized => inner.state = ConnectionState::Connecting,
                ConnectionState::Disposed => {
                    warn!("Redis manager already disposed, ignoring start");
                    return Ok(());
                }
                _ => {
                    warn!("Redis manager already started, ignoring start");
                    return Ok(());
                }
            }
        }

        let attempts = match self.config.on_startup_failure {
            StartupFailurePolicy::Retry => self.config.retry_attempts.max(1),
            _ => 1,
        };

        let mut last_error = None;
        for attempt in 1..=attempts {
            match connect(&self.config, true).await {
                Ok(handle) => {
                    let mut inner = self.inner.write().await;
                    // shutdown may have raced the connect; do not resurrect
                    if inner.state != ConnectionState::Connecting {
                        return Ok(());
                    }
                    inner.primary = Some(handle);
                    inner.state = ConnectionState::Connected;
                    return Ok(());
                }
                Err(e) => {
                    // already logged by the factory
                    last_error = Some(e);
                    if attempt < attempts {
                        debug!("Retrying Redis connect, attempt {}/{}", attempt + 1, attempts);
                        sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        {
            let mut inner = self.inner.write().await;
            if inner.state == ConnectionState::Connecting {
                inner.state = ConnectionState::Uninitialized;
            }
        }

        match (self.config.on_startup_failure, last_error) {
            (StartupFailurePolicy::Abort, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Tear down the primary connection. Invoked once by the host's dispose signal.
    ///
    /// Safe to call before startup; the manager still moves to `Disposed`
    /// so a late `start` cannot resurrect a connection the host already
    /// asked to tear down. Repeated calls are ignored. Clones of the
    /// primary handle held by dependents keep the driver connection open
    /// until they are dropped as well.
    pub async fn stop(&self) {
        let mut inner = self.inner.write().await;
        if inner.state == ConnectionState::Disposed {
            warn!("Redis manager already disposed");
            return;
        }

        if inner.primary.take().is_some() {
            info!("Redis connection closed");
        }
        inner.state = ConnectionState::Disposed;
    }

    /// Open an additional, independently owned connection
    ///
    /// Invokes the same factory as the primary connection with milestone
    /// logging suppressed. The returned handle never aliases the primary
    /// and is not tracked by the manager: the caller owns it, and the
    /// underlying connection closes when the last clone of the handle is
    /// dropped. Connection failures are logged once and propagated.
    pub async fn isolate(&self) -> Result<RedisHandle, RedisPluginError> {
        connect(&self.config, false).await
    }

    /// PING the primary handle
    ///
    /// A failure is logged at error level and reported as `false`, but
    /// never mutates manager state or closes the connection.
    pub async fn health_check(&self) -> bool {
        let Some(mut handle) = self.handle().await else {
            debug!("Redis health check skipped, no primary handle");
            return false;
        };

        match redis::cmd("PING").query_async::<String>(&mut handle).await {
            Ok(_) => true,
            Err(e) => {
                error!("Redis health check failed: {}", e);
                false
            }
        }
    }
}

/// Build and connect a handle for the configured topology
///
/// Logs any failure once at error level before returning it; callers
/// decide whether to swallow (startup, per policy) or propagate
/// (`isolate`).
async fn connect(
    config: &RedisConfig,
    log_milestones: bool,
) -> Result<RedisHandle, RedisPluginError> {
    match try_connect(config, log_milestones).await {
        Ok(handle) => Ok(handle),
        Err(e) => {
            error!("Failed to connect to Redis: {}", e);
            Err(e)
        }
    }
}

async fn try_connect(
    config: &RedisConfig,
    log_milestones: bool,
) -> Result<RedisHandle, RedisPluginError> {
    let mut handle = match &config.topology {
        RedisTopology::Client { url } => {
            if log_milestones {
                info!("Connecting to Redis at {}", url);
            }

            let client = Client::open(url.as_str())?;
            let mut manager_config = ConnectionManagerConfig::new();
            if config.disable_offline_queue {
                // fail commands fast while disconnected instead of retrying
                manager_config = manager_config.set_number_of_retries(0);
            }
            let connection = ConnectionManager::new_with_config(client, manager_config).await?;
            RedisHandle::Single(connection)
        }
        RedisTopology::Cluster {
            root_nodes,
            use_replicas,
        } => {
            if log_milestones {
                info!(
                    "Connecting to Redis cluster via {} root nodes",
                    root_nodes.len()
                );
            }

            let mut builder = ClusterClientBuilder::new(root_nodes.clone());
            if *use_replicas {
                builder = builder.read_from_replicas();
            }
            if config.disable_offline_queue {
                builder = builder.retries(0);
            }
            let connection = builder.build()?.get_async_connection().await?;
            RedisHandle::Cluster(connection)
        }
    };

    // command readiness is a separate milestone from the socket being up
    redis::cmd("PING").query_async::<String>(&mut handle).await?;

    if config.readonly {
        if let RedisHandle::Single(_) = handle {
            // replica routing covers the cluster case at the driver level
            redis::cmd("READONLY").query_async::<()>(&mut handle).await?;
        }
    }

    if log_milestones {
        info!("Redis connection ready");
    }

    Ok(handle)
}
