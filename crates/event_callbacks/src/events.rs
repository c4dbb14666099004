//! # Events and callbacks
//!
//! The event shape the host bus delivers and the callback capability the
//! registry drives.
//!
//! Events name their own category through [`Event::event_type`]. They are
//! handed to executors as `&dyn Event` and downcast back to their concrete
//! type before reaching a [`Callback`].

use crate::types::{EventType, PlayerId};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Object-safe view of an event, implemented for every [`Event`].
pub trait EventObject: Any {
    /// Returns a reference to this event as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Category of this event instance.
    fn kind(&self) -> EventType;

    /// Rust type name, used in mismatch diagnostics.
    fn type_label(&self) -> &'static str;
}

impl<T: Event> EventObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> EventType {
        EventType::of::<T>()
    }

    fn type_label(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Trait that all events must implement.
///
/// Events must be `Send + Sync` as the host may fire them from any thread.
///
/// ```rust
/// use event_callbacks::Event;
///
/// #[derive(Debug)]
/// struct ServerTick { tick: u64 }
///
/// impl Event for ServerTick {
///     fn event_type() -> &'static str { "server_tick" }
/// }
/// ```
pub trait Event: EventObject + Send + Sync + fmt::Debug {
    /// Stable name of this event category.
    fn event_type() -> &'static str
    where
        Self: Sized;

    /// Whether an earlier listener cancelled this event. Registries skip
    /// cancelled events by default, so they neither run nor consume
    /// callbacks.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// An event that may be associated with a player.
pub trait PlayerEvent: Event {
    /// The player involved in the event, if any.
    fn player(&self) -> Option<PlayerId>;
}

// ============================================================================
// Callbacks
// ============================================================================

/// A unit of user logic run for events of type `E`.
///
/// Returning `true` reports the callback as handled; the registry then drops
/// it. Returning `false` keeps it registered for the next matching event.
///
/// Any `Fn(&E) -> bool + Send + Sync` closure is a callback.
pub trait Callback<E: Event>: Send + Sync {
    fn call(&self, event: &E) -> bool;
}

impl<E, F> Callback<E> for F
where
    E: Event,
    F: Fn(&E) -> bool + Send + Sync,
{
    fn call(&self, event: &E) -> bool {
        self(event)
    }
}

/// Shared handle to a callback.
///
/// Equality and hashing follow the underlying allocation, so two handles are
/// equal only when one was cloned from the other. Registering the same
/// handle twice on one key is therefore de-duplicated, while two handles
/// wrapping identical closures are not.
pub struct CallbackRef<E: Event> {
    inner: Arc<dyn Callback<E>>,
}

impl<E: Event> CallbackRef<E> {
    /// Wraps a callback in a fresh handle with its own identity.
    pub fn new<C>(callback: C) -> Self
    where
        C: Callback<E> + 'static,
    {
        Self {
            inner: Arc::new(callback),
        }
    }

    pub fn call(&self, event: &E) -> bool {
        self.inner.call(event)
    }

    /// Address of the shared allocation, the identity used for de-duplication.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<E: Event> Clone for CallbackRef<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Event> From<Arc<dyn Callback<E>>> for CallbackRef<E> {
    fn from(inner: Arc<dyn Callback<E>>) -> Self {
        Self { inner }
    }
}

impl<E: Event> PartialEq for CallbackRef<E> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<E: Event> Eq for CallbackRef<E> {}

impl<E: Event> Hash for CallbackRef<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<E: Event> fmt::Debug for CallbackRef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRef")
            .field("event_type", &E::event_type())
            .field("id", &format_args!("{:#x}", self.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug)]
    struct TestEvent {
        value: u32,
    }

    impl Event for TestEvent {
        fn event_type() -> &'static str {
            "test_event"
        }
    }

    #[test]
    fn test_closure_is_callback() {
        let callback = CallbackRef::new(|event: &TestEvent| event.value > 10);
        assert!(callback.call(&TestEvent { value: 11 }));
        assert!(!callback.call(&TestEvent { value: 3 }));
    }

    #[test]
    fn test_callback_identity_follows_allocation() {
        let first = CallbackRef::new(|_: &TestEvent| true);
        let second = CallbackRef::new(|_: &TestEvent| true);
        let first_again = first.clone();

        assert_eq!(first, first_again);
        assert_ne!(first, second);

        let mut set = HashSet::new();
        set.insert(first.clone());
        set.insert(first_again);
        set.insert(second);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_event_object_downcast() {
        let event = TestEvent { value: 5 };
        let object: &dyn Event = &event;

        assert_eq!(object.kind(), EventType::named("test_event"));
        assert!(object.type_label().ends_with("TestEvent"));
        assert!(!object.is_cancelled());
        let back = object
            .as_any()
            .downcast_ref::<TestEvent>()
            .expect("downcast to concrete event");
        assert_eq!(back.value, 5);
    }
}
