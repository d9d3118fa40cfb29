//! Session actor - owns one session's state and processes its commands.
//!
//! Every read and write for a session goes through its actor, so concurrent
//! callers of the same session are serialized while different sessions
//! never contend.
//!
//! # Panic-Free Guarantees
//!
//! - Response send failures are ignored (the caller may have given up)
//! - Notification queue overflow is logged, never awaited
//! - Broadcast send failures (no subscribers) are ignored

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pacer_core::{SessionId, SessionState, TransitionEvent, TransitionOutcome};

use super::commands::{PollOutcome, SchedulerError, SchedulerEvent, SessionCommand};
use crate::clock::Clock;

/// The session actor - single owner of a `SessionState`.
pub struct SessionActor {
    session_id: SessionId,

    state: SessionState,

    /// Command receiver
    receiver: mpsc::Receiver<SessionCommand>,

    clock: Arc<dyn Clock>,

    /// Queue feeding this session's notifier task
    notifications: mpsc::Sender<TransitionEvent>,

    /// Event publisher shared by all sessions of a scheduler
    event_publisher: broadcast::Sender<SchedulerEvent>,

    /// Cancelled when the session is ended
    cancel: CancellationToken,

    /// Whether the final phase's completion has been published
    completion_reported: bool,
}

impl SessionActor {
    pub fn new(
        session_id: SessionId,
        state: SessionState,
        receiver: mpsc::Receiver<SessionCommand>,
        clock: Arc<dyn Clock>,
        notifications: mpsc::Sender<TransitionEvent>,
        event_publisher: broadcast::Sender<SchedulerEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            state,
            receiver,
            clock,
            notifications,
            event_publisher,
            cancel,
            completion_reported: false,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the session is cancelled or every handle is
    /// dropped. Dropping the actor closes the notification queue, which lets
    /// the notifier drain and exit.
    pub async fn run(mut self) {
        debug!(session_id = %self.session_id, "Session actor starting");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
            }
        }

        debug!(
            session_id = %self.session_id,
            phase_index = self.state.current_phase_index(),
            finished = self.state.is_finished(),
            "Session actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Pause { respond_to } => {
                let _ = respond_to.send(self.handle_pause());
            }
            SessionCommand::Resume { respond_to } => {
                let _ = respond_to.send(self.handle_resume());
            }
            SessionCommand::Transition { forced, respond_to } => {
                let result = self.handle_transition(forced);
                let _ = respond_to.send(result);
            }
            SessionCommand::Skip { respond_to } => {
                let result = self.handle_skip();
                let _ = respond_to.send(result);
            }
            SessionCommand::GetCurrentPhase { respond_to } => {
                let _ = respond_to.send(self.state.current_phase().cloned());
            }
            SessionCommand::GetProgress { respond_to } => {
                let _ = respond_to.send(self.state.progress(self.clock.now()));
            }
            SessionCommand::GetWarnings { respond_to } => {
                let _ = respond_to.send(self.state.warnings(self.clock.now()));
            }
            SessionCommand::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.state.snapshot(self.clock.now()));
            }
            SessionCommand::Poll { respond_to } => {
                let _ = respond_to.send(self.handle_poll());
            }
        }
    }

    fn handle_pause(&mut self) -> bool {
        let changed = self.state.pause(self.clock.now());
        if changed {
            info!(session_id = %self.session_id, "Session paused");
            self.publish(SchedulerEvent::Paused {
                session_id: self.session_id.clone(),
            });
        }
        changed
    }

    fn handle_resume(&mut self) -> bool {
        let changed = self.state.resume(self.clock.now());
        if changed {
            info!(
                session_id = %self.session_id,
                total_pause_secs = self.state.total_pause_duration().num_seconds(),
                "Session resumed"
            );
            self.publish(SchedulerEvent::Resumed {
                session_id: self.session_id.clone(),
            });
        }
        changed
    }

    fn handle_transition(&mut self, forced: bool) -> Result<TransitionOutcome, SchedulerError> {
        let outcome = self.state.transition(self.clock.now(), forced)?;
        self.report(&outcome, false);
        Ok(outcome)
    }

    fn handle_skip(&mut self) -> Result<TransitionOutcome, SchedulerError> {
        let outcome = self.state.skip(self.clock.now())?;
        info!(
            session_id = %self.session_id,
            message = %outcome.message(),
            "Phase skipped"
        );
        self.report(&outcome, false);
        Ok(outcome)
    }

    /// One monitor tick: transitions the session if its deadline passed.
    fn handle_poll(&mut self) -> PollOutcome {
        if self.state.is_finished() {
            return PollOutcome::Finished;
        }
        if self.state.is_paused() {
            return PollOutcome::Paused;
        }

        let now = self.clock.now();
        if !self.state.is_due(now) {
            return PollOutcome::Running;
        }

        match self.state.transition(now, false) {
            Ok(outcome) => {
                self.report(&outcome, true);
                if outcome.is_completed() {
                    PollOutcome::Finished
                } else {
                    PollOutcome::Advanced(outcome)
                }
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Deadline transition failed");
                PollOutcome::Finished
            }
        }
    }

    /// Logs a transition outcome and fans it out to the notifier and to
    /// subscribers.
    ///
    /// Advancing always notifies. Completing the final phase notifies a
    /// `TimeExceeded` only when the deadline fired it, and publishes
    /// `Completed` at most once per session.
    fn report(&mut self, outcome: &TransitionOutcome, from_deadline: bool) {
        match outcome {
            TransitionOutcome::Advanced { .. } => {
                info!(
                    session_id = %self.session_id,
                    message = %outcome.message(),
                    difference_minutes = outcome.time_impact().difference_minutes,
                    "Phase transition"
                );
                if let Some(event) = outcome.to_event() {
                    self.dispatch(event);
                }
            }
            TransitionOutcome::Completed {
                phase, time_impact, ..
            } => {
                if self.completion_reported {
                    return;
                }
                self.completion_reported = true;

                info!(
                    session_id = %self.session_id,
                    phase = %phase,
                    actual_minutes = time_impact.actual_minutes,
                    "Session completed"
                );
                if from_deadline {
                    self.dispatch(TransitionEvent::TimeExceeded {
                        phase: phase.clone(),
                        time_impact: *time_impact,
                    });
                }
                self.publish(SchedulerEvent::Completed {
                    session_id: self.session_id.clone(),
                    time_impact: *time_impact,
                });
            }
        }
    }

    /// Queues a notification without waiting and mirrors it to subscribers.
    fn dispatch(&self, event: TransitionEvent) {
        match self.notifications.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    session_id = %self.session_id,
                    phase = %dropped.phase(),
                    "Notification queue full, dropping event"
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!(session_id = %self.session_id, "Notifier stopped, event not queued");
            }
        }

        self.publish(SchedulerEvent::Transition {
            session_id: self.session_id.clone(),
            event,
        });
    }

    fn publish(&self, event: SchedulerEvent) {
        // Ignore send errors - no subscribers is fine
        let _ = self.event_publisher.send(event);
    }
}
