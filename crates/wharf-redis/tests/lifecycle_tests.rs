//! Plugin lifecycle behavior that does not need a reachable server

use wharf_core::{PluginError, PluginManager};
use wharf_redis::{
    ConnectionState, RedisInputConfig, RedisManager, RedisMode, RedisPlugin, RedisPluginError,
    StartupFailurePolicy,
};

/// Endpoint nothing listens on; connects fail with a refusal
const UNREACHABLE_URL: &str = "redis://127.0.0.1:1/0";

fn unreachable_input(policy: StartupFailurePolicy) -> RedisInputConfig {
    RedisInputConfig {
        mode: RedisMode::Client,
        url: Some(UNREACHABLE_URL.to_string()),
        disable_offline_queue: true,
        on_startup_failure: policy,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_host_keeps_running_when_startup_connect_fails() {
    let mut manager = PluginManager::new();
    let plugin =
        RedisPlugin::from_input(unreachable_input(StartupFailurePolicy::ContinueUnset)).unwrap();
    manager.register_plugin(Box::new(plugin));

    manager.initialize_plugins().await.unwrap();

    // default policy: the failure is logged and swallowed
    manager.start_plugins().await.unwrap();

    let redis = manager.service_context().require_service::<RedisManager>();
    assert_eq!(redis.state().await, ConnectionState::Uninitialized);
    assert!(redis.handle().await.is_none());
    assert!(matches!(
        redis.require_handle().await,
        Err(RedisPluginError::NotConnected)
    ));

    // shutdown still disposes the manager
    manager.shutdown_plugins().await.unwrap();
    assert_eq!(redis.state().await, ConnectionState::Disposed);
}

#[tokio::test]
async fn test_abort_policy_fails_host_startup() {
    let mut manager = PluginManager::new();
    let plugin = RedisPlugin::from_input(unreachable_input(StartupFailurePolicy::Abort)).unwrap();
    manager.register_plugin(Box::new(plugin));

    manager.initialize_plugins().await.unwrap();

    let result = manager.start_plugins().await;
    assert!(matches!(
        result,
        Err(PluginError::StartupFailed { plugin_name, .. }) if plugin_name == "redis"
    ));
}

#[tokio::test]
async fn test_manager_is_registered_during_initialization() {
    let mut manager = PluginManager::new();
    let plugin =
        RedisPlugin::from_input(unreachable_input(StartupFailurePolicy::ContinueUnset)).unwrap();
    manager.register_plugin(Box::new(plugin));

    manager.initialize_plugins().await.unwrap();

    // dependents can resolve the manager before the ready signal, but the
    // primary handle must not exist yet
    let redis = manager.service_context().require_service::<RedisManager>();
    assert_eq!(redis.state().await, ConnectionState::Uninitialized);
    assert!(redis.handle().await.is_none());
}

#[tokio::test]
async fn test_isolate_fails_independently_of_manager_state() {
    let mut manager = PluginManager::new();
    let plugin =
        RedisPlugin::from_input(unreachable_input(StartupFailurePolicy::ContinueUnset)).unwrap();
    manager.register_plugin(Box::new(plugin));

    manager.initialize_plugins().await.unwrap();
    manager.start_plugins().await.unwrap();

    let redis = manager.service_context().require_service::<RedisManager>();
    let result = redis.isolate().await;
    assert!(matches!(result, Err(RedisPluginError::Connect(_))));
    assert_eq!(redis.state().await, ConnectionState::Uninitialized);
}
