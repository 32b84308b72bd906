//! wharf-core: plugin runtime for the Wharf platform
//!
//! Provides the plugin trait, the type-safe service registry used for
//! dependency injection, and the manager that drives plugins through the
//! startup and shutdown phases of the host process.

pub mod plugin;

pub use plugin::{
    PluginContext, PluginError, PluginManager, ServiceRegistrationContext, ServiceRegistry,
    WharfPlugin,
};
