//! Plugin system for modular service registration and lifecycle management
//!
//! This module provides a trait-based plugin system that enables:
//! - Type-safe service dependency injection
//! - An explicit, exactly-once startup/shutdown lifecycle
//! - Clear dependency management with fail-fast error handling
//! - Modular architecture without compile-time coupling

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors that can occur during plugin operations
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin registration failed for '{plugin_name}': {error}")]
    PluginRegistrationFailed { plugin_name: String, error: String },

    #[error("Plugin startup failed for '{plugin_name}': {error}")]
    StartupFailed { plugin_name: String, error: String },

    #[error("Plugin shutdown failed for '{plugin_name}': {error}")]
    ShutdownFailed { plugin_name: String, error: String },

    #[error("Lifecycle violation: {0}")]
    LifecycleViolation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Core plugin trait that defines the plugin interface
///
/// Plugins are driven through three phases, each invoked at most once by
/// the host's orchestration code: service registration, the ready signal
/// (after every plugin has registered), and the dispose signal during
/// shutdown.
pub trait WharfPlugin: Send + Sync {
    /// Unique identifier for this plugin
    fn name(&self) -> &'static str;

    /// Register services that this plugin provides
    ///
    /// Use `context.require_service::<T>()` to get dependencies.
    /// Use `context.register_service(service)` to provide services for other plugins.
    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>>;

    /// Invoked once after all plugins have registered their services
    ///
    /// This is the place to open connections or start background work that
    /// depends on the full service registry being populated.
    fn on_ready<'a>(
        &'a self,
        _context: &'a PluginContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    /// Invoked once while the host shuts down, in reverse registration order
    fn on_shutdown<'a>(
        &'a self,
        _context: &'a PluginContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

/// Type-safe service registry for dependency injection
pub struct ServiceRegistry {
    services: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    /// Create a new service registry
    pub fn new() -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Register a service for other plugins to use
    pub fn register<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        debug!("Registering service: {}", std::any::type_name::<T>());
        self.services
            .lock()
            .unwrap()
            .insert(TypeId::of::<T>(), Box::new(service));
    }

    /// Get a service if it's registered
    pub fn get<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.services
            .lock()
            .unwrap()
            .get(&TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Require a service - panics with helpful error if not available
    pub fn require<T: Send + Sync + 'static + ?Sized>(&self) -> Arc<T> {
        self.get::<T>().unwrap_or_else(|| {
            panic!(
                "Service '{}' is required but not registered. \
                 Make sure the plugin providing this service is registered before plugins that depend on it.",
                std::any::type_name::<T>()
            )
        })
    }
}

/// Read-only context provided to plugins for service access
pub struct PluginContext {
    service_registry: Arc<ServiceRegistry>,
}

impl PluginContext {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            service_registry: registry,
        }
    }

    /// Get a service if it's available (for optional dependencies)
    pub fn get_service<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.service_registry.get::<T>()
    }

    /// Require a service - panics with clear error if not available
    pub fn require_service<T: Send + Sync + 'static + ?Sized>(&self) -> Arc<T> {
        self.service_registry.require::<T>()
    }
}

/// Special context for service registration that allows mutable access
pub struct ServiceRegistrationContext {
    service_registry: Arc<ServiceRegistry>,
}

impl Default for ServiceRegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistrationContext {
    pub fn new() -> Self {
        Self {
            service_registry: Arc::new(ServiceRegistry::new()),
        }
    }

    /// Register a service for other plugins to use
    pub fn register_service<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        self.service_registry.register(service);
    }

    /// Get a service if it's available (for dependencies)
    pub fn get_service<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.service_registry.get::<T>()
    }

    /// Require a service - panics with clear error if not available
    pub fn require_service<T: Send + Sync + 'static + ?Sized>(&self) -> Arc<T> {
        self.service_registry.require::<T>()
    }

    /// Create a read-only context for plugin operations
    pub fn create_plugin_context(&self) -> PluginContext {
        PluginContext::new(self.service_registry.clone())
    }
}

/// Lifecycle phases a manager moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecyclePhase {
    Created,
    Initialized,
    Started,
    ShutDown,
}

/// Main plugin manager that handles plugin registration and lifecycle
pub struct PluginManager {
    plugins: Vec<Box<dyn WharfPlugin>>,
    context: ServiceRegistrationContext,
    phase: LifecyclePhase,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    /// Create a new plugin manager
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            context: ServiceRegistrationContext::new(),
            phase: LifecyclePhase::Created,
        }
    }

    /// Register a plugin (order matters for dependencies)
    pub fn register_plugin(&mut self, plugin: Box<dyn WharfPlugin>) {
        debug!("Registering plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    /// Initialize all plugins in registration order
    pub async fn initialize_plugins(&mut self) -> Result<(), PluginError> {
        if self.phase != LifecyclePhase::Created {
            return Err(PluginError::LifecycleViolation(format!(
                "initialize_plugins called in phase {:?}",
                self.phase
            )));
        }

        debug!("Initializing {} plugins", self.plugins.len());

        for plugin in &self.plugins {
            debug!("Initializing plugin: {}", plugin.name());

            plugin.register_services(&self.context).await.map_err(|e| {
                PluginError::PluginRegistrationFailed {
                    plugin_name: plugin.name().to_string(),
                    error: e.to_string(),
                }
            })?;

            debug!("Successfully initialized plugin: {}", plugin.name());
        }

        self.phase = LifecyclePhase::Initialized;
        Ok(())
    }

    /// Fire the ready signal: run each plugin's `on_ready` hook exactly once
    ///
    /// Runs in registration order, after every plugin has registered its
    /// services. The first failing hook aborts startup.
    pub async fn start_plugins(&mut self) -> Result<(), PluginError> {
        if self.phase != LifecyclePhase::Initialized {
            return Err(PluginError::LifecycleViolation(format!(
                "start_plugins called in phase {:?}",
                self.phase
            )));
        }

        let plugin_context = self.context.create_plugin_context();

        for plugin in &self.plugins {
            debug!("Starting plugin: {}", plugin.name());

            plugin
                .on_ready(&plugin_context)
                .await
                .map_err(|e| PluginError::StartupFailed {
                    plugin_name: plugin.name().to_string(),
                    error: e.to_string(),
                })?;
        }

        self.phase = LifecyclePhase::Started;
        Ok(())
    }

    /// Fire the dispose signal: run each plugin's `on_shutdown` hook exactly once
    ///
    /// Runs in reverse registration order. Shutdown is best-effort: a
    /// failing hook is logged and does not stop the remaining plugins from
    /// shutting down; the first error is returned afterwards. Calling this
    /// before startup, or a second time, is a no-op.
    pub async fn shutdown_plugins(&mut self) -> Result<(), PluginError> {
        match self.phase {
            LifecyclePhase::Started => {}
            LifecyclePhase::ShutDown => {
                warn!("shutdown_plugins called twice, ignoring");
                return Ok(());
            }
            _ => {
                warn!("shutdown_plugins called before startup, ignoring");
                self.phase = LifecyclePhase::ShutDown;
                return Ok(());
            }
        }

        let plugin_context = self.context.create_plugin_context();
        let mut first_error = None;

        for plugin in self.plugins.iter().rev() {
            debug!("Shutting down plugin: {}", plugin.name());

            if let Err(e) = plugin.on_shutdown(&plugin_context).await {
                error!("Plugin '{}' failed to shut down: {}", plugin.name(), e);
                first_error.get_or_insert(PluginError::ShutdownFailed {
                    plugin_name: plugin.name().to_string(),
                    error: e.to_string(),
                });
            }
        }

        self.phase = LifecyclePhase::ShutDown;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Get access to the service registration context for manual service registration
    /// This is typically used before plugin initialization to register core services
    pub fn service_context(&self) -> &ServiceRegistrationContext {
        &self.context
    }
}
