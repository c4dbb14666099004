//! # Host event bus
//!
//! [`HostEventBus`] is everything the registry needs from the host: attach
//! one executor per (event type, priority), detach it again, and hear about
//! the owning plugin being disabled.
//!
//! [`EventSystem`] is a synchronous in-process implementation. Executors run
//! on the firing thread in priority order, and a failing executor is logged
//! and counted without stopping the others.

use crate::error::EventError;
use crate::events::Event;
use crate::types::{EventPriority, EventType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Low-level listener attached to the host bus.
pub trait EventExecutor: Send + Sync {
    fn execute(&self, event: &dyn Event) -> Result<(), EventError>;
}

impl<F> EventExecutor for F
where
    F: Fn(&dyn Event) -> Result<(), EventError> + Send + Sync,
{
    fn execute(&self, event: &dyn Event) -> Result<(), EventError> {
        self(event)
    }
}

/// Receipt for an attached executor, used to detach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    event_type: EventType,
}

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }
}

/// Hook run once when a plugin is disabled.
pub type DisableHook = Box<dyn FnOnce() + Send + Sync>;

/// Contract between the callback registry and the host event bus.
pub trait HostEventBus: Send + Sync {
    /// Attaches `executor` for events of `event_type` on behalf of `plugin`.
    fn register_executor(
        &self,
        plugin: &str,
        event_type: EventType,
        priority: EventPriority,
        executor: Arc<dyn EventExecutor>,
    ) -> Result<ListenerHandle, EventError>;

    /// Detaches a previously attached executor. Returns `false` if it was
    /// already gone.
    fn unregister_executor(&self, handle: ListenerHandle) -> bool;

    /// Schedules `hook` to run exactly once when `plugin` is disabled.
    fn on_plugin_disabled(&self, plugin: &str, hook: DisableHook) -> Result<(), EventError>;
}

// ============================================================================
// In-process event system
// ============================================================================

/// Statistics for event system monitoring.
#[derive(Debug, Default, Clone)]
pub struct EventSystemStats {
    /// Executors currently attached
    pub total_listeners: usize,
    /// Events fired since creation, including ones nobody listened to
    pub events_fired: u64,
    /// Executor invocations
    pub executors_run: u64,
    /// Executor invocations that panicked or returned an error
    pub executor_failures: u64,
}

struct RegisteredExecutor {
    id: u64,
    plugin: String,
    priority: EventPriority,
    executor: Arc<dyn EventExecutor>,
}

/// Synchronous, priority-ordered event bus with a plugin lifecycle.
///
/// # Examples
///
/// ```rust
/// use event_callbacks::{Event, EventError, EventPriority, EventType, EventSystem, HostEventBus};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct ServerStarted;
///
/// impl Event for ServerStarted {
///     fn event_type() -> &'static str { "server_started" }
/// }
///
/// let events = EventSystem::new();
/// events.enable_plugin("greeter");
/// events.register_executor(
///     "greeter",
///     EventType::of::<ServerStarted>(),
///     EventPriority::Normal,
///     Arc::new(|_event: &dyn Event| -> Result<(), EventError> { Ok(()) }),
/// ).unwrap();
///
/// assert_eq!(events.fire(&ServerStarted), 1);
/// ```
pub struct EventSystem {
    /// Executors per event type, kept sorted by priority
    listeners: RwLock<HashMap<EventType, Vec<RegisteredExecutor>>>,
    /// Enabled plugins and their pending disable hooks
    plugins: RwLock<HashMap<String, Vec<DisableHook>>>,
    next_listener_id: AtomicU64,
    stats: RwLock<EventSystemStats>,
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("listeners", &"[listeners]")
            .field("plugins", &self.plugins.read().keys().collect::<Vec<_>>())
            .field("stats", &*self.stats.read())
            .finish()
    }
}

impl EventSystem {
    /// Creates a new event system with no plugins and no listeners.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            plugins: RwLock::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
            stats: RwLock::new(EventSystemStats::default()),
        }
    }

    /// Marks `plugin` as enabled. Returns `false` if it already was.
    pub fn enable_plugin(&self, plugin: &str) -> bool {
        let mut plugins = self.plugins.write();
        if plugins.contains_key(plugin) {
            return false;
        }
        plugins.insert(plugin.to_string(), Vec::new());
        info!("🔌 Plugin {} enabled", plugin);
        true
    }

    pub fn is_plugin_enabled(&self, plugin: &str) -> bool {
        self.plugins.read().contains_key(plugin)
    }

    /// Disables `plugin`: drops all of its executors, then runs each of its
    /// disable hooks once. Disabling a plugin that is not enabled is a no-op
    /// and returns `false`.
    pub fn disable_plugin(&self, plugin: &str) -> bool {
        let (hooks, dropped) = {
            let mut plugins = self.plugins.write();
            let Some(hooks) = plugins.remove(plugin) else {
                return false;
            };

            let mut listeners = self.listeners.write();
            let mut dropped = 0;
            listeners.retain(|_, executors| {
                let before = executors.len();
                executors.retain(|registered| registered.plugin != plugin);
                dropped += before - executors.len();
                !executors.is_empty()
            });
            self.stats.write().total_listeners -= dropped;
            (hooks, dropped)
        };

        info!(
            "🔌 Plugin {} disabled, dropped {} executors, running {} disable hooks",
            plugin,
            dropped,
            hooks.len()
        );

        for hook in hooks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(hook)) {
                error!(
                    "❌ Disable hook for plugin {} panicked: {}",
                    plugin,
                    panic_message(panic.as_ref())
                );
            }
        }
        true
    }

    /// Fires `event` to every executor attached for its type.
    ///
    /// Returns the number of executors run.
    pub fn fire<E: Event>(&self, event: &E) -> usize {
        self.fire_dyn(event)
    }

    /// Fires an already type-erased event.
    pub fn fire_dyn(&self, event: &dyn Event) -> usize {
        let event_type = event.kind();
        let executors: Vec<(u64, Arc<dyn EventExecutor>)> = self
            .listeners
            .read()
            .get(&event_type)
            .map(|executors| {
                executors
                    .iter()
                    .map(|registered| (registered.id, Arc::clone(&registered.executor)))
                    .collect()
            })
            .unwrap_or_default();

        if executors.is_empty() {
            debug!("No listeners for event: {}", event_type);
            self.stats.write().events_fired += 1;
            return 0;
        }

        debug!("📤 Firing {} to {} executors", event_type, executors.len());

        let mut failures = 0u64;
        for (id, executor) in &executors {
            let outcome = match catch_unwind(AssertUnwindSafe(|| executor.execute(event))) {
                Ok(result) => result,
                Err(panic) => Err(EventError::ExecutorFailed(format!(
                    "panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };
            if let Err(e) = outcome {
                failures += 1;
                error!("❌ Executor {} for {} failed: {}", id, event_type, e);
            }
        }

        let mut stats = self.stats.write();
        stats.events_fired += 1;
        stats.executors_run += executors.len() as u64;
        stats.executor_failures += failures;
        executors.len()
    }

    /// Number of executors attached for `event_type`.
    pub fn listener_count(&self, event_type: EventType) -> usize {
        self.listeners
            .read()
            .get(&event_type)
            .map_or(0, |executors| executors.len())
    }

    /// Priorities of the executors for `event_type`, in invocation order.
    pub fn listener_priorities(&self, event_type: EventType) -> Vec<EventPriority> {
        self.listeners
            .read()
            .get(&event_type)
            .map(|executors| executors.iter().map(|r| r.priority).collect())
            .unwrap_or_default()
    }

    /// Gets the current event system statistics.
    pub fn get_stats(&self) -> EventSystemStats {
        self.stats.read().clone()
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEventBus for EventSystem {
    fn register_executor(
        &self,
        plugin: &str,
        event_type: EventType,
        priority: EventPriority,
        executor: Arc<dyn EventExecutor>,
    ) -> Result<ListenerHandle, EventError> {
        // Held across the insert so a concurrent disable cannot miss this executor.
        let plugins = self.plugins.read();
        if !plugins.contains_key(plugin) {
            return Err(EventError::PluginNotEnabled(plugin.to_string()));
        }

        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.write();
        let executors = listeners.entry(event_type).or_default();
        let position = executors
            .iter()
            .position(|registered| registered.priority > priority)
            .unwrap_or(executors.len());
        executors.insert(
            position,
            RegisteredExecutor {
                id,
                plugin: plugin.to_string(),
                priority,
                executor,
            },
        );
        // Counted before the locks go so a concurrent disable never subtracts it first.
        self.stats.write().total_listeners += 1;
        drop(listeners);
        drop(plugins);

        debug!(
            "📝 Attached executor {} for {} at {} ({})",
            id, event_type, priority, plugin
        );
        Ok(ListenerHandle { id, event_type })
    }

    fn unregister_executor(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.write();
        let Some(executors) = listeners.get_mut(&handle.event_type) else {
            return false;
        };
        let before = executors.len();
        executors.retain(|registered| registered.id != handle.id);
        let removed = executors.len() != before;
        if executors.is_empty() {
            listeners.remove(&handle.event_type);
        }
        if removed {
            self.stats.write().total_listeners -= 1;
        }
        drop(listeners);

        if removed {
            debug!("Detached executor {} for {}", handle.id, handle.event_type);
        }
        removed
    }

    fn on_plugin_disabled(&self, plugin: &str, hook: DisableHook) -> Result<(), EventError> {
        let mut plugins = self.plugins.write();
        let hooks = plugins
            .get_mut(plugin)
            .ok_or_else(|| EventError::PluginNotEnabled(plugin.to_string()))?;
        hooks.push(hook);
        Ok(())
    }
}

/// Creates a new shared in-process event system.
pub fn create_event_system() -> Arc<EventSystem> {
    Arc::new(EventSystem::new())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct TestEvent {
        message: String,
    }

    impl Event for TestEvent {
        fn event_type() -> &'static str {
            "test_event"
        }
    }

    fn test_event() -> TestEvent {
        TestEvent {
            message: "test".to_string(),
        }
    }

    fn noop_executor() -> Arc<dyn EventExecutor> {
        Arc::new(|_event: &dyn Event| -> Result<(), EventError> { Ok(()) })
    }

    fn recording_executor(
        log: &Arc<Mutex<Vec<&'static str>>>,
        label: &'static str,
    ) -> Arc<dyn EventExecutor> {
        let log = log.clone();
        Arc::new(move |_event: &dyn Event| -> Result<(), EventError> {
            log.lock().unwrap().push(label);
            Ok(())
        })
    }

    #[test]
    fn test_executors_run_in_priority_order() {
        let events = EventSystem::new();
        events.enable_plugin("test");
        let log = Arc::new(Mutex::new(Vec::new()));
        let event_type = EventType::of::<TestEvent>();

        for (priority, label) in [
            (EventPriority::Monitor, "monitor"),
            (EventPriority::Normal, "normal-1"),
            (EventPriority::Lowest, "lowest"),
            (EventPriority::Normal, "normal-2"),
            (EventPriority::High, "high"),
        ] {
            events
                .register_executor("test", event_type, priority, recording_executor(&log, label))
                .unwrap();
        }

        assert_eq!(events.fire(&test_event()), 5);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["lowest", "normal-1", "normal-2", "high", "monitor"]
        );
        assert_eq!(
            events.listener_priorities(event_type),
            vec![
                EventPriority::Lowest,
                EventPriority::Normal,
                EventPriority::Normal,
                EventPriority::High,
                EventPriority::Monitor
            ]
        );
    }

    #[test]
    fn test_register_requires_enabled_plugin() {
        let events = EventSystem::new();
        let result = events.register_executor(
            "ghost",
            EventType::of::<TestEvent>(),
            EventPriority::Normal,
            noop_executor(),
        );
        assert!(matches!(result, Err(EventError::PluginNotEnabled(name)) if name == "ghost"));

        let hook = events.on_plugin_disabled("ghost", Box::new(|| {}));
        assert!(matches!(hook, Err(EventError::PluginNotEnabled(_))));
    }

    #[test]
    fn test_executor_failure_isolation() {
        let events = EventSystem::new();
        events.enable_plugin("test");
        let event_type = EventType::of::<TestEvent>();
        let ran = Arc::new(AtomicUsize::new(0));

        let first = ran.clone();
        events
            .register_executor(
                "test",
                event_type,
                EventPriority::Low,
                Arc::new(move |_event: &dyn Event| -> Result<(), EventError> {
                    first.fetch_add(1, Ordering::SeqCst);
                    Err(EventError::ExecutorFailed("Intentional test failure".to_string()))
                }),
            )
            .unwrap();
        events
            .register_executor(
                "test",
                event_type,
                EventPriority::Normal,
                Arc::new(|_event: &dyn Event| -> Result<(), EventError> {
                    panic!("Intentional test panic")
                }),
            )
            .unwrap();
        let last = ran.clone();
        events
            .register_executor(
                "test",
                event_type,
                EventPriority::High,
                Arc::new(move |event: &dyn Event| -> Result<(), EventError> {
                    let event = event.as_any().downcast_ref::<TestEvent>().unwrap();
                    assert_eq!(event.message, "test");
                    last.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        assert_eq!(events.fire(&test_event()), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 2);

        let stats = events.get_stats();
        assert_eq!(stats.events_fired, 1);
        assert_eq!(stats.executors_run, 3);
        assert_eq!(stats.executor_failures, 2);
    }

    #[test]
    fn test_unregister_executor() {
        let events = EventSystem::new();
        events.enable_plugin("test");
        let event_type = EventType::of::<TestEvent>();
        let handle = events
            .register_executor(
                "test",
                event_type,
                EventPriority::Normal,
                noop_executor(),
            )
            .unwrap();
        assert_eq!(handle.event_type(), event_type);
        assert_eq!(events.listener_count(event_type), 1);

        assert!(events.unregister_executor(handle));
        assert!(!events.unregister_executor(handle));
        assert_eq!(events.listener_count(event_type), 0);
        assert_eq!(events.fire(&test_event()), 0);
        assert_eq!(events.get_stats().total_listeners, 0);
    }

    #[test]
    fn test_disable_plugin_drops_executors_and_runs_hooks_once() {
        let events = EventSystem::new();
        events.enable_plugin("owner");
        events.enable_plugin("other");
        let event_type = EventType::of::<TestEvent>();
        for plugin in ["owner", "owner", "other"] {
            events
                .register_executor(
                    plugin,
                    event_type,
                    EventPriority::Normal,
                    noop_executor(),
                )
                .unwrap();
        }

        let hook_runs = Arc::new(AtomicUsize::new(0));
        let counter = hook_runs.clone();
        events
            .on_plugin_disabled(
                "owner",
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert!(events.disable_plugin("owner"));
        assert!(!events.disable_plugin("owner"));
        assert_eq!(hook_runs.load(Ordering::SeqCst), 1);
        assert!(!events.is_plugin_enabled("owner"));
        assert_eq!(events.listener_count(event_type), 1);
        assert_eq!(events.get_stats().total_listeners, 1);
    }

    #[test]
    fn test_listener_total_consistent_under_concurrent_disable() {
        let events = EventSystem::new();
        let event_type = EventType::of::<TestEvent>();

        for _ in 0..50 {
            events.enable_plugin("churn");
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        for _ in 0..25 {
                            let _ = events.register_executor(
                                "churn",
                                event_type,
                                EventPriority::Normal,
                                noop_executor(),
                            );
                        }
                    });
                }
                scope.spawn(|| {
                    events.disable_plugin("churn");
                });
            });

            assert_eq!(events.get_stats().total_listeners, events.listener_count(event_type));
            events.disable_plugin("churn");
            assert_eq!(events.get_stats().total_listeners, 0);
        }
    }

    #[test]
    fn test_fire_without_listeners() {
        let events = create_event_system();
        assert_eq!(events.fire(&test_event()), 0);
        assert_eq!(events.get_stats().events_fired, 1);
    }
}
