//! Push subscription handle

use std::fmt;

use tokio::sync::mpsc;

use crate::protocol::{PushEvent, SubscriptionId};

/// Callback that tells the backend a subscription is no longer wanted
pub type ReleaseFn = Box<dyn FnOnce(&SubscriptionId) + Send>;

/// Live handle to one server-push channel
///
/// The event channel is unbounded: the transport's reader must never block
/// on a slow turn.
///
/// Released exactly once: either explicitly through [`release`](Self::release)
/// or when dropped. Events still buffered at release time are discarded.
pub struct Subscription {
    /// Subscription ID (equal to the command that opened it)
    id: SubscriptionId,
    /// Events in arrival order
    events: mpsc::UnboundedReceiver<PushEvent>,
    /// Taken on first release
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Wrap an event channel and its release callback
    #[must_use]
    pub fn new(
        id: SubscriptionId,
        events: mpsc::UnboundedReceiver<PushEvent>,
        release: ReleaseFn,
    ) -> Self {
        Self {
            id,
            events,
            release: Some(release),
        }
    }

    /// Subscription ID
    #[must_use]
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the subscription is released or the backend
    /// closed the channel.
    pub async fn next_event(&mut self) -> Option<PushEvent> {
        if self.release.is_none() {
            return None;
        }
        self.events.recv().await
    }

    /// Release the subscription
    ///
    /// Returns `true` on the call that actually released it; later calls
    /// (and the drop) do nothing.
    pub fn release(&mut self) -> bool {
        let Some(release) = self.release.take() else {
            return false;
        };
        self.events.close();
        tracing::debug!(subscription = %self.id, "Subscription released");
        release(&self.id);
        true
    }

    /// Whether the subscription has been released
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counted(releases: &Arc<AtomicUsize>) -> (mpsc::UnboundedSender<PushEvent>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let releases = Arc::clone(releases);
        let sub = Subscription::new(
            SubscriptionId("req_1".to_string()),
            rx,
            Box::new(move |_: &SubscriptionId| {
                releases.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (tx, sub)
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let releases = Arc::new(AtomicUsize::new(0));
        let (tx, mut sub) = counted(&releases);
        tx.send(PushEvent::StreamChunk { chunk: "a".into() }).unwrap();
        tx.send(PushEvent::StreamChunk { chunk: "b".into() }).unwrap();
        drop(tx);

        assert_eq!(sub.next_event().await, Some(PushEvent::StreamChunk { chunk: "a".into() }));
        assert_eq!(sub.next_event().await, Some(PushEvent::StreamChunk { chunk: "b".into() }));
        assert_eq!(sub.next_event().await, None);
    }

    #[test]
    fn test_release_is_idempotent() {
        let releases = Arc::new(AtomicUsize::new(0));
        let (_tx, mut sub) = counted(&releases);

        assert!(sub.release());
        assert!(!sub.release());
        assert!(sub.is_released());
        drop(sub);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let releases = Arc::new(AtomicUsize::new(0));
        let (_tx, sub) = counted(&releases);
        drop(sub);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_events_after_release() {
        let releases = Arc::new(AtomicUsize::new(0));
        let (tx, mut sub) = counted(&releases);
        tx.send(PushEvent::StreamChunk { chunk: "late".into() }).unwrap();

        sub.release();
        assert_eq!(sub.next_event().await, None);
        assert!(tx.is_closed());
    }
}
