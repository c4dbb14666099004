//! # Player-specific callbacks
//!
//! [`PlayerEventCallback`] only accepts events involving one target player.
//! Events for anybody else are reported as not handled, which keeps the
//! callback registered until the target shows up. On the first match the
//! hook runs and the callback reports itself handled, so the registry
//! drops it.

use crate::events::{Callback, CallbackRef, PlayerEvent};
use crate::types::{HasPlayerId, PlayerId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot callback filtered to a single player.
///
/// # Examples
///
/// ```rust
/// use event_callbacks::{Event, PlayerEvent, PlayerEventCallback, PlayerId};
///
/// #[derive(Debug)]
/// struct PlayerRespawned { player_id: PlayerId }
///
/// impl Event for PlayerRespawned {
///     fn event_type() -> &'static str { "player_respawned" }
/// }
///
/// impl PlayerEvent for PlayerRespawned {
///     fn player(&self) -> Option<PlayerId> { Some(self.player_id) }
/// }
///
/// let target = PlayerId::new();
/// let callback = PlayerEventCallback::new(target, |event: &PlayerRespawned| {
///     println!("{} is back", event.player_id);
/// });
/// assert_eq!(callback.target(), target);
/// let callback = callback.into_ref();
/// ```
pub struct PlayerEventCallback<E, F> {
    player_id: PlayerId,
    on_match: F,
    matched: AtomicBool,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> PlayerEventCallback<E, F>
where
    E: PlayerEvent,
    F: Fn(&E) + Send + Sync,
{
    /// Waits for an event involving the player with `player_id`.
    pub fn new(player_id: PlayerId, on_match: F) -> Self {
        Self {
            player_id,
            on_match,
            matched: AtomicBool::new(false),
            _event: PhantomData,
        }
    }

    /// Waits for an event involving `player`.
    pub fn for_player(player: &impl HasPlayerId, on_match: F) -> Self {
        Self::new(player.player_id(), on_match)
    }

    pub fn target(&self) -> PlayerId {
        self.player_id
    }

    /// Whether the hook has already run.
    pub fn has_matched(&self) -> bool {
        self.matched.load(Ordering::Acquire)
    }

    /// Wraps this callback in a handle ready for registration.
    pub fn into_ref(self) -> CallbackRef<E>
    where
        F: 'static,
    {
        CallbackRef::new(self)
    }
}

impl<E, F> Callback<E> for PlayerEventCallback<E, F>
where
    E: PlayerEvent,
    F: Fn(&E) + Send + Sync,
{
    fn call(&self, event: &E) -> bool {
        if self.has_matched() {
            return true;
        }
        match event.player() {
            Some(player) if player == self.player_id => {
                // Two dispatches can race on the same snapshot; only one runs the hook.
                if !self.matched.swap(true, Ordering::AcqRel) {
                    (self.on_match)(event);
                }
                true
            }
            _ => false,
        }
    }
}

impl<E, F> fmt::Debug for PlayerEventCallback<E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerEventCallback")
            .field("player_id", &self.player_id)
            .field("matched", &self.matched.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Debug)]
    struct PlayerChatEvent {
        player_id: Option<PlayerId>,
        message: String,
    }

    impl Event for PlayerChatEvent {
        fn event_type() -> &'static str {
            "player_chat"
        }
    }

    impl PlayerEvent for PlayerChatEvent {
        fn player(&self) -> Option<PlayerId> {
            self.player_id
        }
    }

    struct Session {
        id: PlayerId,
    }

    impl HasPlayerId for Session {
        fn player_id(&self) -> PlayerId {
            self.id
        }
    }

    fn chat(player_id: Option<PlayerId>) -> PlayerChatEvent {
        PlayerChatEvent {
            player_id,
            message: "hello".to_string(),
        }
    }

    #[test]
    fn test_other_player_is_not_handled() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let callback = PlayerEventCallback::new(PlayerId::new(), move |_: &PlayerChatEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!callback.call(&chat(Some(PlayerId::new()))));
        assert!(!callback.call(&chat(None)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!callback.has_matched());
    }

    #[test]
    fn test_target_player_runs_hook_once() {
        let target = PlayerId::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let callback = PlayerEventCallback::new(target, move |event: &PlayerChatEvent| {
            assert_eq!(event.message, "hello");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(callback.call(&chat(Some(target))));
        assert!(callback.call(&chat(Some(target))));
        assert!(callback.call(&chat(Some(PlayerId::new()))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(callback.has_matched());
    }

    #[test]
    fn test_for_player_uses_identity_source() {
        let session = Session { id: PlayerId::new() };
        let callback = PlayerEventCallback::for_player(&session, |_: &PlayerChatEvent| {});
        assert_eq!(callback.target(), session.id);
        assert!(callback.call(&chat(Some(session.id))));
    }
}
