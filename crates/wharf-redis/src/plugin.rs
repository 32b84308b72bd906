//! Redis plugin implementation for the Wharf plugin system
//!
//! Registers a [`RedisManager`] in the service registry; the primary
//! connection opens on the host's ready signal and closes on shutdown.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use wharf_core::plugin::{PluginContext, PluginError, ServiceRegistrationContext, WharfPlugin};

use crate::config::{RedisConfig, RedisInputConfig};
use crate::error::RedisPluginError;
use crate::service::RedisManager;

/// Redis plugin exposing a managed connection to other plugins
pub struct RedisPlugin {
    config: RedisConfig,
}

impl RedisPlugin {
    /// Create the plugin from validated configuration
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }

    /// Create the plugin from user-supplied input configuration
    pub fn from_input(input: RedisInputConfig) -> Result<Self, RedisPluginError> {
        Ok(Self::new(RedisConfig::try_from(input)?))
    }
}

impl WharfPlugin for RedisPlugin {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let manager = Arc::new(RedisManager::new(self.config.clone()));
            context.register_service(manager);

            tracing::debug!("Redis plugin services registered successfully");
            Ok(())
        })
    }

    fn on_ready<'a>(
        &'a self,
        context: &'a PluginContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let manager = context.require_service::<RedisManager>();
            manager.start().await.map_err(|e| PluginError::StartupFailed {
                plugin_name: self.name().to_string(),
                error: e.to_string(),
            })
        })
    }

    fn on_shutdown<'a>(
        &'a self,
        context: &'a PluginContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let manager = context.require_service::<RedisManager>();
            manager.stop().await;
            Ok(())
        })
    }
}
