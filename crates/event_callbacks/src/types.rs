//! # Core Type Definitions
//!
//! Identifiers and enums shared by the registry, the filtered callbacks and
//! the host bus.
//!
//! ## Key Types
//!
//! - [`PlayerId`] - Stable unique identifier for a player
//! - [`EventType`] - Tagged identifier for an event category
//! - [`EventPriority`] - Relative ordering of executors for the same event type
//! - [`RegistrationKey`] - Key the registry files callback sets under
//! - [`KeyPolicy`] - How registration keys are derived

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Player identity
// ============================================================================

/// Unique identifier for a player in the game world.
///
/// This is a wrapper around UUID that provides type safety and ensures
/// player IDs cannot be confused with other types of IDs in the system.
///
/// # Examples
///
/// ```rust
/// use event_callbacks::PlayerId;
///
/// let player_id = PlayerId::new();
/// let parsed = PlayerId::from_str(&player_id.to_string()).unwrap();
/// assert_eq!(player_id, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a player ID from a string representation.
    ///
    /// Returns `Err(uuid::Error)` with details about the parsing failure
    /// when the string is not a valid UUID.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything that can yield the stable identity of a player, such as a
/// connected player handle or session record.
pub trait HasPlayerId {
    fn player_id(&self) -> PlayerId;
}

impl HasPlayerId for PlayerId {
    fn player_id(&self) -> PlayerId {
        *self
    }
}

// ============================================================================
// Event categories and priorities
// ============================================================================

/// Tagged identifier for a category of event.
///
/// Event types are named by the event itself through
/// [`Event::event_type`](crate::Event::event_type), so the registry keys on
/// this value instead of on runtime type information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(&'static str);

impl EventType {
    /// Creates an event type from its stable name.
    pub const fn named(name: &'static str) -> Self {
        Self(name)
    }

    /// The event type of `E`.
    pub fn of<E: crate::Event>() -> Self {
        Self(E::event_type())
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Relative ordering of executors attached for the same event type.
///
/// Executors run in ascending order: `Lowest` first, `Monitor` last.
/// `Monitor` is meant for observers that only look at the final outcome.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
    Monitor,
}

impl EventPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventPriority::Lowest => "LOWEST",
            EventPriority::Low => "LOW",
            EventPriority::Normal => "NORMAL",
            EventPriority::High => "HIGH",
            EventPriority::Highest => "HIGHEST",
            EventPriority::Monitor => "MONITOR",
        }
    }
}

impl fmt::Display for EventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Registration keys
// ============================================================================

/// How the registry turns a `register` call into a [`RegistrationKey`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Every `register` call gets its own key and its own upstream executor,
    /// so each call's priority is honoured independently.
    #[default]
    PerRegistration,
    /// One key and one upstream executor per event type. The priority of the
    /// first registration for a type wins; later priorities are ignored.
    SharedByEventType,
}

/// Key under which the registry files a callback set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationKey {
    Shared {
        event_type: EventType,
    },
    Sequenced {
        event_type: EventType,
        priority: EventPriority,
        sequence: u64,
    },
}

impl RegistrationKey {
    pub fn event_type(&self) -> EventType {
        match self {
            RegistrationKey::Shared { event_type } => *event_type,
            RegistrationKey::Sequenced { event_type, .. } => *event_type,
        }
    }

    /// The priority baked into the key, if the policy records one.
    pub fn priority(&self) -> Option<EventPriority> {
        match self {
            RegistrationKey::Shared { .. } => None,
            RegistrationKey::Sequenced { priority, .. } => Some(*priority),
        }
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationKey::Shared { event_type } => write!(f, "{}", event_type),
            RegistrationKey::Sequenced {
                event_type,
                priority,
                sequence,
            } => write!(f, "{}_{}_{}", event_type, priority, sequence),
        }
    }
}
