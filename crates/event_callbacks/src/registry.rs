//! # Callback registry
//!
//! [`EventCallbacks`] maps registration keys to callback sets and bridges
//! them to the host's one-executor-per-attachment model.
//!
//! The first registration for a key attaches exactly one executor upstream.
//! Every firing of that executor snapshots the key's callback set, invokes
//! each callback that is still live and drops the ones that report
//! themselves handled. When the owning plugin is disabled the whole map is
//! cleared.
//!
//! How keys are derived is set by [`KeyPolicy`]:
//!
//! - [`KeyPolicy::PerRegistration`] gives each `register` call its own key
//!   and executor. A key whose set drains is retired and its executor
//!   detached.
//! - [`KeyPolicy::SharedByEventType`] shares one key and executor per event
//!   type. The first registration's priority is the one attached upstream.
//!
//! Firings of one key are serialised by a per-key reentrant lock held from
//! the snapshot to the last removal, so a handled callback is never invoked
//! again even when the host fires from several threads. Cancelled events
//! are skipped unless [`CallbacksConfig::ignore_cancelled`] is turned off.

use crate::bus::{EventExecutor, HostEventBus, ListenerHandle};
use crate::config::CallbacksConfig;
use crate::error::{CallbackError, EventError};
use crate::events::{CallbackRef, Event};
use crate::types::{EventPriority, EventType, KeyPolicy, RegistrationKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

type Invoker = dyn Fn(&dyn Event) -> Result<bool, EventError> + Send + Sync;

/// A callback with its event type erased, tagged with the identity of the
/// handle it was registered from.
#[derive(Clone)]
struct RegisteredCallback {
    id: usize,
    invoke: Arc<Invoker>,
}

impl RegisteredCallback {
    fn erase<E: Event>(callback: CallbackRef<E>) -> Self {
        let id = callback.id();
        let invoke = move |event: &dyn Event| -> Result<bool, EventError> {
            match event.as_any().downcast_ref::<E>() {
                Some(event) => Ok(callback.call(event)),
                None => Err(EventError::TypeMismatch {
                    expected: std::any::type_name::<E>(),
                    actual: event.type_label(),
                }),
            }
        };
        Self {
            id,
            invoke: Arc::new(invoke),
        }
    }
}

struct KeyEntry {
    /// Live callback set, insertion ordered, unique by handle identity
    callbacks: Vec<RegisteredCallback>,
    /// Priority the upstream executor was attached with
    priority: EventPriority,
    handle: ListenerHandle,
    /// Identifies the executor that owns this entry
    attachment: u64,
    dispatch_lock: Arc<ReentrantMutex<()>>,
}

impl KeyEntry {
    fn contains(&self, id: usize) -> bool {
        self.callbacks.iter().any(|c| c.id == id)
    }
}

/// Point-in-time counters for one registry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub active_keys: usize,
    pub active_callbacks: usize,
    /// Upstream firings dispatched to a known key
    pub dispatches: u64,
    pub callbacks_invoked: u64,
    /// Callbacks removed after reporting themselves handled
    pub callbacks_completed: u64,
}

struct RegistryState {
    plugin: String,
    config: CallbacksConfig,
    bus: Arc<dyn HostEventBus>,
    keys: DashMap<RegistrationKey, KeyEntry>,
    sequence: AtomicU64,
    attachments: AtomicU64,
    dispatches: AtomicU64,
    invoked: AtomicU64,
    completed: AtomicU64,
}

impl RegistryState {
    fn dispatch(
        &self,
        key: &RegistrationKey,
        attachment: u64,
        event: &dyn Event,
    ) -> Result<(), EventError> {
        // An executor left attached after its key was cleared must not run
        // the set of a newer entry under the same key.
        let dispatch_lock = match self.keys.get(key) {
            Some(entry) if entry.attachment == attachment => Arc::clone(&entry.dispatch_lock),
            _ => return Ok(()),
        };
        let _serial = dispatch_lock.lock();

        // Copy out and release the shard before running any user code.
        let snapshot = match self.keys.get(key) {
            Some(entry) if entry.attachment == attachment => entry.callbacks.clone(),
            _ => return Ok(()),
        };
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        debug!("Dispatching {} to {} callbacks", key, snapshot.len());

        let mut mismatch = None;
        for registered in snapshot {
            if !self.is_live(key, attachment, registered.id) {
                continue;
            }
            self.invoked.fetch_add(1, Ordering::Relaxed);
            match (registered.invoke)(event) {
                Ok(true) => self.complete(key, attachment, registered.id),
                Ok(false) => {}
                Err(e) => {
                    warn!("⚠️ Skipping callback on {}: {}", key, e);
                    mismatch.get_or_insert(e);
                }
            }
        }

        match mismatch {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn is_live(&self, key: &RegistrationKey, attachment: u64, id: usize) -> bool {
        self.keys
            .get(key)
            .is_some_and(|entry| entry.attachment == attachment && entry.contains(id))
    }

    /// Drops a handled callback from the live set, retiring the key when the
    /// policy allows it.
    fn complete(&self, key: &RegistrationKey, attachment: u64, id: usize) {
        let drained = match self.keys.get_mut(key) {
            Some(mut entry) if entry.attachment == attachment => {
                let before = entry.callbacks.len();
                entry.callbacks.retain(|c| c.id != id);
                if entry.callbacks.len() == before {
                    return;
                }
                entry.callbacks.is_empty()
            }
            _ => return,
        };
        self.completed.fetch_add(1, Ordering::Relaxed);
        debug!("Callback completed on {}", key);

        if drained && self.config.key_policy == KeyPolicy::PerRegistration {
            if let Some((_, entry)) = self.keys.remove_if(key, |_, e| {
                e.attachment == attachment && e.callbacks.is_empty()
            }) {
                self.bus.unregister_executor(entry.handle);
                debug!("Retired {}", key);
            }
        }
    }

    fn clear(&self) -> usize {
        let cleared = self.keys.len();
        self.keys.clear();
        cleared
    }

    /// Clears the map and detaches every executor still recorded in it.
    fn detach_all(&self) -> usize {
        let handles: Vec<ListenerHandle> = self.keys.iter().map(|entry| entry.handle).collect();
        self.keys.clear();
        handles
            .into_iter()
            .filter(|handle| self.bus.unregister_executor(*handle))
            .count()
    }
}

/// Upstream executor for a single registration key.
struct KeyExecutor {
    key: RegistrationKey,
    attachment: u64,
    state: Weak<RegistryState>,
}

impl EventExecutor for KeyExecutor {
    fn execute(&self, event: &dyn Event) -> Result<(), EventError> {
        let Some(state) = self.state.upgrade() else {
            return Ok(());
        };
        if state.config.ignore_cancelled && event.is_cancelled() {
            debug!("Skipping cancelled {} for {}", event.kind(), self.key);
            return Ok(());
        }
        state.dispatch(&self.key, self.attachment, event)
    }
}

/// Per-plugin registry of ad-hoc event callbacks.
///
/// # Examples
///
/// ```rust
/// use event_callbacks::{CallbackRef, Event, EventCallbacks, EventSystem};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct ServerTick { tick: u64 }
///
/// impl Event for ServerTick {
///     fn event_type() -> &'static str { "server_tick" }
/// }
///
/// let events = Arc::new(EventSystem::new());
/// events.enable_plugin("scheduler");
/// let callbacks = EventCallbacks::of("scheduler", events.clone()).unwrap();
///
/// // Waits for the tenth tick, then unregisters itself.
/// callbacks.register(CallbackRef::new(|event: &ServerTick| event.tick >= 10)).unwrap();
///
/// events.fire(&ServerTick { tick: 3 });
/// assert_eq!(callbacks.stats().active_callbacks, 1);
/// events.fire(&ServerTick { tick: 10 });
/// assert_eq!(callbacks.stats().active_callbacks, 0);
/// ```
pub struct EventCallbacks {
    state: Arc<RegistryState>,
}

impl std::fmt::Debug for EventCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCallbacks")
            .field("plugin", &self.state.plugin)
            .field("config", &self.state.config)
            .field("keys", &self.state.keys.len())
            .finish()
    }
}

impl EventCallbacks {
    /// Creates a registry for `plugin` with the default configuration.
    pub fn of(plugin: &str, bus: Arc<dyn HostEventBus>) -> Result<Self, CallbackError> {
        Self::with_config(plugin, bus, CallbacksConfig::default())
    }

    /// Creates a registry for `plugin` and subscribes it to the plugin's
    /// disable notification.
    pub fn with_config(
        plugin: &str,
        bus: Arc<dyn HostEventBus>,
        config: CallbacksConfig,
    ) -> Result<Self, CallbackError> {
        if plugin.trim().is_empty() {
            return Err(CallbackError::InvalidPluginName);
        }

        let state = Arc::new(RegistryState {
            plugin: plugin.to_string(),
            config,
            bus: Arc::clone(&bus),
            keys: DashMap::new(),
            sequence: AtomicU64::new(0),
            attachments: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            invoked: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        });

        let weak = Arc::downgrade(&state);
        bus.on_plugin_disabled(
            plugin,
            Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    let cleared = state.clear();
                    info!(
                        "🧹 Cleared {} callback keys for disabled plugin {}",
                        cleared, state.plugin
                    );
                }
            }),
        )?;

        debug!(
            "Callback registry ready for {} ({:?})",
            plugin, state.config.key_policy
        );
        Ok(Self { state })
    }

    /// Registers `callback` for events of type `E` at the configured default
    /// priority.
    pub fn register<E: Event>(
        &self,
        callback: CallbackRef<E>,
    ) -> Result<RegistrationKey, CallbackError> {
        self.register_with_priority(self.state.config.default_priority, callback)
    }

    /// Registers `callback` for events of type `E` at `priority`.
    ///
    /// The first registration for a key attaches one executor upstream. If
    /// the host refuses it, nothing is recorded and the error is returned.
    /// Registering the same handle twice under one key is a no-op.
    pub fn register_with_priority<E: Event>(
        &self,
        priority: EventPriority,
        callback: CallbackRef<E>,
    ) -> Result<RegistrationKey, CallbackError> {
        let event_type = EventType::of::<E>();
        let key = self.next_key(event_type, priority);
        let registered = RegisteredCallback::erase(callback);

        match self.state.keys.entry(key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.priority != priority {
                    warn!(
                        "⚠️ {} already attached at {}, ignoring requested {}",
                        key, entry.priority, priority
                    );
                }
                if entry.contains(registered.id) {
                    debug!("Callback already registered on {}", key);
                } else {
                    entry.callbacks.push(registered);
                    debug!("📝 Added callback to {}", key);
                }
            }
            Entry::Vacant(vacant) => {
                let attachment = self.state.attachments.fetch_add(1, Ordering::Relaxed);
                let executor = Arc::new(KeyExecutor {
                    key,
                    attachment,
                    state: Arc::downgrade(&self.state),
                });
                let handle = self.state.bus.register_executor(
                    &self.state.plugin,
                    event_type,
                    priority,
                    executor,
                )?;
                vacant.insert(KeyEntry {
                    callbacks: vec![registered],
                    priority,
                    handle,
                    attachment,
                    dispatch_lock: Arc::new(ReentrantMutex::new(())),
                });
                info!("📝 Attached {} for {}", key, self.state.plugin);
            }
        }
        Ok(key)
    }

    fn next_key(&self, event_type: EventType, priority: EventPriority) -> RegistrationKey {
        match self.state.config.key_policy {
            KeyPolicy::SharedByEventType => RegistrationKey::Shared { event_type },
            KeyPolicy::PerRegistration => RegistrationKey::Sequenced {
                event_type,
                priority,
                sequence: self.state.sequence.fetch_add(1, Ordering::Relaxed),
            },
        }
    }

    /// Drops every key and callback. Upstream executors are left to the
    /// host, which discards them with the owner; until then they find no
    /// entry of their own and do nothing. Safe to call repeatedly.
    pub fn on_owner_disabled(&self) {
        let cleared = self.state.clear();
        info!(
            "🧹 Cleared {} callback keys for {}",
            cleared, self.state.plugin
        );
    }

    pub fn is_registered(&self, key: &RegistrationKey) -> bool {
        self.state.keys.contains_key(key)
    }

    /// Number of live callbacks under `key`.
    pub fn callback_count(&self, key: &RegistrationKey) -> usize {
        self.state
            .keys
            .get(key)
            .map_or(0, |entry| entry.callbacks.len())
    }

    pub fn active_keys(&self) -> Vec<RegistrationKey> {
        self.state.keys.iter().map(|entry| *entry.key()).collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut active_callbacks = 0;
        let mut active_keys = 0;
        for entry in self.state.keys.iter() {
            active_keys += 1;
            active_callbacks += entry.callbacks.len();
        }
        RegistryStats {
            active_keys,
            active_callbacks,
            dispatches: self.state.dispatches.load(Ordering::Relaxed),
            callbacks_invoked: self.state.invoked.load(Ordering::Relaxed),
            callbacks_completed: self.state.completed.load(Ordering::Relaxed),
        }
    }

    pub fn plugin(&self) -> &str {
        &self.state.plugin
    }

    pub fn policy(&self) -> KeyPolicy {
        self.state.config.key_policy
    }
}

impl Drop for EventCallbacks {
    fn drop(&mut self) {
        let detached = self.state.detach_all();
        if detached > 0 {
            debug!(
                "Detached {} executors for dropped registry of {}",
                detached, self.state.plugin
            );
        }
    }
}
