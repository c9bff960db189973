/// Resolve-once reply channel for cross-context messages.
///
/// A `PendingResponse` is the receiving context's half of one message round-trip.
/// It stays open while the handler's future runs and is closed by exactly one
/// `resolve`. A second `resolve` is rejected. Dropping it unresolved closes the
/// channel and the sender observes `ChannelError::Dropped`.
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::error;

use crate::message::TabId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("response already sent on this channel")]
    AlreadyResolved,

    #[error("channel closed before a response was sent")]
    Dropped,

    #[error("the sending side stopped waiting for the response")]
    ReceiverGone,

    #[error("no receiving context for tab {0}")]
    NoReceiver(TabId),

    #[error("receiving context has shut down")]
    Disconnected,
}

pub struct PendingResponse<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

pub struct ResponseReceiver<T> {
    rx: oneshot::Receiver<T>,
}

/// Create the two halves of a single message round-trip.
pub fn pending_response<T>() -> (PendingResponse<T>, ResponseReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    (
        PendingResponse {
            slot: Mutex::new(Some(tx)),
        },
        ResponseReceiver { rx },
    )
}

impl<T> PendingResponse<T> {
    /// Deliver the response. Only the first call has any effect.
    pub fn resolve(&self, value: T) -> Result<(), ChannelError> {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ChannelError::AlreadyResolved)?;
        sender.send(value).map_err(|_| ChannelError::ReceiverGone)
    }

    pub fn is_resolved(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<T> Drop for PendingResponse<T> {
    fn drop(&mut self) {
        let unresolved = self
            .slot
            .get_mut()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        if unresolved {
            error!("response channel dropped without a response");
        }
    }
}

impl<T> ResponseReceiver<T> {
    /// Wait for the other context's response.
    pub async fn recv(self) -> Result<T, ChannelError> {
        self.rx.await.map_err(|_| ChannelError::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_resolve_is_delivered() {
        let (pending, rx) = pending_response::<u32>();
        assert!(!pending.is_resolved());
        pending.resolve(7).unwrap();
        assert!(pending.is_resolved());
        assert_eq!(rx.recv().await, Ok(7));
    }

    #[tokio::test]
    async fn second_resolve_is_rejected() {
        let (pending, rx) = pending_response::<u32>();
        pending.resolve(1).unwrap();
        assert_eq!(pending.resolve(2), Err(ChannelError::AlreadyResolved));
        assert_eq!(rx.recv().await, Ok(1));
    }

    #[tokio::test]
    async fn dropping_unresolved_closes_channel() {
        let (pending, rx) = pending_response::<u32>();
        drop(pending);
        assert_eq!(rx.recv().await, Err(ChannelError::Dropped));
    }

    #[test]
    fn resolving_after_sender_left_reports_receiver_gone() {
        let (pending, rx) = pending_response::<u32>();
        drop(rx);
        assert_eq!(pending.resolve(3), Err(ChannelError::ReceiverGone));
        assert!(pending.is_resolved());
    }
}
