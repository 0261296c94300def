/*
[INPUT]:  Stage outcomes from connector, resolver, loader and session
[OUTPUT]: Broadcast notifications for outside observers
[POS]:    Notification layer - engine-agnostic replacement for UI events
[UPDATE]: When adding new notification kinds or changing payloads
*/

use tokio::sync::broadcast;
use tracing::trace;

use crate::types::AvatarSource;

/// Buffered events per subscriber. Auth flows emit a handful of events per
/// attempt, so a small buffer is plenty; slow subscribers observe Lagged.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications fired by pipeline stages, each at most once per
/// triggering call, in the order the corresponding stage completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    WalletConnected(String),
    WalletDisconnected,
    WalletError(String),
    NameResolved { address: String, name: String },
    ResolutionError(String),
    AvatarLoaded(AvatarSource),
    AvatarError(String),
    SessionError(String),
}

/// Shared fan-out channel for [`AuthEvent`] values.
///
/// Cloning shares the underlying channel. Emission never blocks and a lack
/// of subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AuthEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        trace!(?event, "emitting auth event");
        // send only fails when no receiver exists, which is fine
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(AuthEvent::WalletConnected("0xabc".to_string()));
        bus.emit(AuthEvent::WalletDisconnected);

        assert_eq!(
            rx.recv().await.unwrap(),
            AuthEvent::WalletConnected("0xabc".to_string())
        );
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::WalletDisconnected);
    }

    #[test]
    fn test_emit_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.emit(AuthEvent::WalletError("rejected".to_string()));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_see_the_same_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(AuthEvent::ResolutionError("rpc down".to_string()));

        let expected = AuthEvent::ResolutionError("rpc down".to_string());
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }
}
