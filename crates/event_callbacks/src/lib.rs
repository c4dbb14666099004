//! # Event Callbacks
//!
//! Ad-hoc one-shot and persistent callbacks on top of a plugin event bus.
//!
//! A plugin creates one [`EventCallbacks`] registry and registers callbacks
//! for the event types it cares about. A callback returns `true` once it is
//! done and is then dropped; returning `false` keeps it around for the next
//! event of that type. [`PlayerEventCallback`] narrows a callback down to a
//! single player and finishes on the first event involving them.
//!
//! ## Architecture Overview
//!
//! - [`HostEventBus`] is the contract with the host: attach an executor per
//!   (event type, priority) and report when a plugin is disabled.
//! - [`EventSystem`] is a synchronous in-process host implementing it.
//! - [`EventCallbacks`] attaches exactly one executor per registration key
//!   and runs the snapshot-invoke-remove dispatch for that key.
//!
//! ## Quick Start Example
//!
//! ```rust
//! use event_callbacks::*;
//!
//! #[derive(Debug)]
//! struct PlayerJoined { player_id: PlayerId }
//!
//! impl Event for PlayerJoined {
//!     fn event_type() -> &'static str { "player_joined" }
//! }
//!
//! impl PlayerEvent for PlayerJoined {
//!     fn player(&self) -> Option<PlayerId> { Some(self.player_id) }
//! }
//!
//! # fn main() -> Result<(), CallbackError> {
//! let events = create_event_system();
//! events.enable_plugin("welcome");
//! let callbacks = EventCallbacks::of("welcome", events.clone())?;
//!
//! let friend = PlayerId::new();
//! callbacks.register(
//!     PlayerEventCallback::new(friend, |event: &PlayerJoined| {
//!         println!("Welcome back {}", event.player_id);
//!     })
//!     .into_ref(),
//! )?;
//!
//! events.fire(&PlayerJoined { player_id: PlayerId::new() }); // someone else, still waiting
//! events.fire(&PlayerJoined { player_id: friend });          // runs once, then removed
//! assert_eq!(callbacks.stats().active_callbacks, 0);
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod player;
pub mod registry;
pub mod types;


pub use bus::{
    create_event_system, DisableHook, EventExecutor, EventSystem, EventSystemStats, HostEventBus,
    ListenerHandle,
};
pub use config::CallbacksConfig;
pub use error::{CallbackError, EventError};
pub use events::{Callback, CallbackRef, Event, EventObject, PlayerEvent};
pub use player::PlayerEventCallback;
pub use registry::{EventCallbacks, RegistryStats};
pub use types::{EventPriority, EventType, HasPlayerId, KeyPolicy, PlayerId, RegistrationKey};
