//! Transition notifications to external collaborators.
//!
//! Each session owns a dispatcher task fed by a bounded queue. The session
//! actor enqueues events without waiting, so a slow or hung collaborator
//! never delays a transition, and a session's dispatcher only ever blocks
//! its own notifications.
//!
//! # Panic-Free Guarantees
//!
//! Delivery failures, timeouts and queue overflow are logged, never
//! propagated: a notification is not a veto over the state change.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use pacer_core::{SessionId, TransitionEvent};

/// Failure reported by a notifier.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("notification failed: {0}")]
    Failed(String),

    #[error("notification timed out after {0:?}")]
    TimedOut(Duration),
}

impl NotifyError {
    pub fn failed<E: std::fmt::Display>(err: E) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Receiver of a session's transition events.
#[async_trait]
pub trait TransitionNotifier: Send + Sync {
    async fn notify(
        &self,
        session_id: &SessionId,
        event: &TransitionEvent,
    ) -> Result<(), NotifyError>;
}

/// Notifier that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl TransitionNotifier for NoopNotifier {
    async fn notify(&self, _: &SessionId, _: &TransitionEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Adapts a synchronous closure into a notifier.
pub struct FnNotifier<F> {
    callback: F,
}

impl<F> FnNotifier<F>
where
    F: Fn(&SessionId, &TransitionEvent) -> Result<(), NotifyError> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> TransitionNotifier for FnNotifier<F>
where
    F: Fn(&SessionId, &TransitionEvent) -> Result<(), NotifyError> + Send + Sync,
{
    async fn notify(
        &self,
        session_id: &SessionId,
        event: &TransitionEvent,
    ) -> Result<(), NotifyError> {
        (self.callback)(session_id, event)
    }
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<(SessionId, TransitionEvent)>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::UnboundedSender<(SessionId, TransitionEvent)>) -> Self {
        Self { sender }
    }

    /// Creates a notifier together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<(SessionId, TransitionEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl TransitionNotifier for ChannelNotifier {
    async fn notify(
        &self,
        session_id: &SessionId,
        event: &TransitionEvent,
    ) -> Result<(), NotifyError> {
        self.sender
            .send((session_id.clone(), event.clone()))
            .map_err(|_| NotifyError::Failed("receiver dropped".to_string()))
    }
}

/// Spawns the dispatcher for one session.
///
/// Returns the queue sender and the task handle. The task delivers queued
/// events in order, each bounded by `callback_timeout`, and exits once every
/// sender is dropped and the queue is drained.
pub fn spawn_notifier(
    session_id: SessionId,
    notifier: Arc<dyn TransitionNotifier>,
    capacity: usize,
    callback_timeout: Duration,
) -> (mpsc::Sender<TransitionEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<TransitionEvent>(capacity.max(1));

    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            deliver(&session_id, notifier.as_ref(), &event, callback_timeout).await;
        }
        debug!(session_id = %session_id, "Notifier task stopped");
    });

    (tx, task)
}

/// Delivers one event, logging failure instead of returning it.
async fn deliver(
    session_id: &SessionId,
    notifier: &dyn TransitionNotifier,
    event: &TransitionEvent,
    callback_timeout: Duration,
) {
    let result = match timeout(callback_timeout, notifier.notify(session_id, event)).await {
        Ok(result) => result,
        Err(_) => Err(NotifyError::TimedOut(callback_timeout)),
    };

    match result {
        Ok(()) => debug!(
            session_id = %session_id,
            phase = %event.phase(),
            "Transition notification delivered"
        ),
        Err(e) => warn!(
            session_id = %session_id,
            phase = %event.phase(),
            error = %e,
            "Transition notification failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacer_core::{PhaseName, TimeImpact};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_event() -> TransitionEvent {
        TransitionEvent::Transitioned {
            from_phase: PhaseName::introduction(),
            to_phase: PhaseName::behavioral(),
            was_forced: false,
            time_impact: TimeImpact::new(5.0, 6.0),
        }
    }

    struct HangingNotifier;

    #[async_trait]
    impl TransitionNotifier for HangingNotifier {
        async fn notify(&self, _: &SessionId, _: &TransitionEvent) -> Result<(), NotifyError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[test]
    fn test_notify_error_display() {
        assert_eq!(
            NotifyError::failed("boom").to_string(),
            "notification failed: boom"
        );
        assert_eq!(
            NotifyError::TimedOut(Duration::from_millis(5)).to_string(),
            "notification timed out after 5ms"
        );
    }

    #[tokio::test]
    async fn test_channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier
            .notify(&SessionId::new("s1"), &sample_event())
            .await
            .unwrap();

        let (id, event) = rx.recv().await.unwrap();
        assert_eq!(id.as_str(), "s1");
        assert_eq!(event, sample_event());
    }

    #[tokio::test]
    async fn test_channel_notifier_reports_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        let result = notifier.notify(&SessionId::new("s1"), &sample_event()).await;
        assert!(matches!(result, Err(NotifyError::Failed(_))));
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_in_order_and_stops() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let notifier = FnNotifier::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let (tx, task) = spawn_notifier(
            SessionId::new("s1"),
            Arc::new(notifier),
            4,
            Duration::from_secs(1),
        );
        for _ in 0..3 {
            tx.send(sample_event()).await.unwrap();
        }
        drop(tx);

        task.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dispatcher_survives_failures() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let notifier = FnNotifier::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError::failed("collaborator down"))
        });

        let (tx, task) = spawn_notifier(
            SessionId::new("s1"),
            Arc::new(notifier),
            4,
            Duration::from_secs(1),
        );
        tx.send(sample_event()).await.unwrap();
        tx.send(sample_event()).await.unwrap();
        drop(tx);

        task.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dispatcher_times_out_hung_callback() {
        let (tx, task) = spawn_notifier(
            SessionId::new("s1"),
            Arc::new(HangingNotifier),
            4,
            Duration::from_millis(20),
        );
        tx.send(sample_event()).await.unwrap();
        tx.send(sample_event()).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("dispatcher should finish after timeouts")
            .unwrap();
    }

    #[tokio::test]
    async fn test_noop_notifier() {
        assert!(NoopNotifier
            .notify(&SessionId::new("s1"), &sample_event())
            .await
            .is_ok());
    }
}
