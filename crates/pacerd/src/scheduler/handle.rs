//! Client interface for interacting with one `SessionActor`.
//!
//! The `SessionHandle` is a cheap-to-clone sender shared by the scheduler
//! facade and the session's phase monitor.
//!
//! # Panic-Free Guarantees
//!
//! Channel errors are mapped to `SchedulerError::ChannelClosed`.

use tokio::sync::{mpsc, oneshot};

use pacer_core::{PhaseProgress, PhaseRuntime, SessionSnapshot, TimeWarnings, TransitionOutcome};

use super::commands::{PollOutcome, SchedulerError, SessionCommand};

/// Handle for interacting with a session actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn new(sender: mpsc::Sender<SessionCommand>) -> Self {
        Self { sender }
    }

    /// Sends a command built around a fresh oneshot and awaits the reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SchedulerError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(build(tx))
            .await
            .map_err(|_| SchedulerError::ChannelClosed)?;

        rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Pauses the session. Returns `false` if it was already paused.
    pub async fn pause(&self) -> Result<bool, SchedulerError> {
        self.request(|respond_to| SessionCommand::Pause { respond_to })
            .await
    }

    /// Resumes the session. Returns `false` if it was not paused.
    pub async fn resume(&self) -> Result<bool, SchedulerError> {
        self.request(|respond_to| SessionCommand::Resume { respond_to })
            .await
    }

    pub async fn transition(&self, forced: bool) -> Result<TransitionOutcome, SchedulerError> {
        self.request(|respond_to| SessionCommand::Transition { forced, respond_to })
            .await?
    }

    pub async fn skip(&self) -> Result<TransitionOutcome, SchedulerError> {
        self.request(|respond_to| SessionCommand::Skip { respond_to })
            .await?
    }

    pub async fn current_phase(&self) -> Result<Option<PhaseRuntime>, SchedulerError> {
        self.request(|respond_to| SessionCommand::GetCurrentPhase { respond_to })
            .await
    }

    pub async fn progress(&self) -> Result<Option<PhaseProgress>, SchedulerError> {
        self.request(|respond_to| SessionCommand::GetProgress { respond_to })
            .await
    }

    pub async fn warnings(&self) -> Result<Option<TimeWarnings>, SchedulerError> {
        self.request(|respond_to| SessionCommand::GetWarnings { respond_to })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SchedulerError> {
        self.request(|respond_to| SessionCommand::GetSnapshot { respond_to })
            .await
    }

    /// Runs one deadline check. Used by the phase monitor.
    pub async fn poll(&self) -> Result<PollOutcome, SchedulerError> {
        self.request(|respond_to| SessionCommand::Poll { respond_to })
            .await
    }

    /// Returns `true` while the actor is accepting commands.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handle() -> (SessionHandle, mpsc::Receiver<SessionCommand>) {
        let (tx, rx) = mpsc::channel(16);
        (SessionHandle::new(tx), rx)
    }

    #[tokio::test]
    async fn test_pause_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(SessionCommand::Pause { respond_to }) = rx.recv().await {
                let _ = respond_to.send(true);
                return true;
            }
            false
        });

        assert!(handle.pause().await.unwrap());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_transition_passes_forced_flag() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(SessionCommand::Transition { forced, respond_to }) = rx.recv().await {
                let _ = respond_to.send(Err(SchedulerError::ChannelClosed));
                return forced;
            }
            false
        });

        let result = handle.transition(true).await;
        assert!(matches!(result, Err(SchedulerError::ChannelClosed)));
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(matches!(
            handle.poll().await,
            Err(SchedulerError::ChannelClosed)
        ));
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_dropped_responder_is_channel_closed() {
        let (handle, mut rx) = create_test_handle();

        tokio::spawn(async move {
            // Receive and drop the responder without answering
            let _ = rx.recv().await;
        });

        assert!(matches!(
            handle.progress().await,
            Err(SchedulerError::ChannelClosed)
        ));
    }
}
