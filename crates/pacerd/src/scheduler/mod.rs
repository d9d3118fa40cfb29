//! Session store and lifecycle using the Actor pattern.
//!
//! The `Scheduler` maps session ids to live sessions. Each session is an
//! actor task that owns its `SessionState`, a monitor task that drives its
//! deadlines, and a notifier task that delivers its transition events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  SessionCommand  ┌──────────────┐  TransitionEvent  ┌──────────────┐
//! │  Scheduler  │─────────────────▶│ SessionActor │──────────────────▶│   Notifier   │
//! │ (DashMap)   │   (mpsc)         │ SessionState │   (bounded mpsc)  │   callback   │
//! └─────────────┘                  └──────────────┘                   └──────────────┘
//!                                     ▲       │
//!                              Poll   │       │  SchedulerEvent (broadcast)
//!                          ┌──────────┴──┐    ▼
//!                          │PhaseMonitor │  subscribers
//!                          └─────────────┘
//! ```
//!
//! Calls for the same session are serialized by its actor. The map is only
//! touched to look up or remove a handle, so different sessions never wait
//! on each other.
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - Map guards are never held across an `.await`
//! - A session whose actor has gone away reports `SessionNotFound`

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use pacer_core::{
    PhaseProgress, PhaseRuntime, Schedule, SessionId, SessionSnapshot, SessionState,
    TimeWarnings, TransitionOutcome,
};

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, SchedulerConfig};
use crate::monitor::{spawn_phase_monitor, supervise};
use crate::notify::{spawn_notifier, TransitionNotifier};

mod actor;
mod commands;
mod handle;

pub use actor::SessionActor;
pub use commands::{EndReason, PollOutcome, SchedulerError, SchedulerEvent, SessionCommand};
pub use handle::SessionHandle;

/// Broadcast buffer for scheduler events
const EVENT_BUFFER: usize = 256;

/// A live session's entry in the store.
#[derive(Debug)]
struct SessionEntry {
    handle: SessionHandle,
    /// Stops the session's actor and monitor
    cancel: CancellationToken,
}

/// The session store.
///
/// Cheap to clone; clones share the same sessions. Must be used from
/// within a tokio runtime since starting a session spawns tasks.
#[derive(Debug, Clone)]
pub struct Scheduler {
    sessions: Arc<DashMap<SessionId, SessionEntry>>,
    config: Arc<SchedulerConfig>,
    clock: Arc<dyn Clock>,
    event_publisher: broadcast::Sender<SchedulerEvent>,
    /// Parent of every session's token
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Creates a scheduler driven by the system clock.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the configuration fails validation.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a scheduler that reads time from `clock`.
    pub fn with_clock(
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (event_publisher, _) = broadcast::channel(EVENT_BUFFER);

        Ok(Self {
            sessions: Arc::new(DashMap::new()),
            config: Arc::new(config),
            clock,
            event_publisher,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Starts a session and its monitor.
    ///
    /// Phases are laid out back to back from the clock's current instant.
    /// `notifier` receives every transition event of this session.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::ShutDown` after [`Scheduler::shutdown`]
    /// - `SchedulerError::SchedulerFull` if `max_sessions` are already active
    /// - `SchedulerError::DuplicateSession` if `session_id` is already active
    /// - `SchedulerError::Domain` if the schedule has no phases
    pub fn start_session(
        &self,
        session_id: impl Into<SessionId>,
        schedule: Schedule,
        notifier: Arc<dyn TransitionNotifier>,
    ) -> Result<(), SchedulerError> {
        let session_id = session_id.into();

        // A cancelled parent token would hand the session dead tasks
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }

        // Checked before taking the entry: len() locks every shard
        let max = self.config.max_sessions;
        if self.sessions.len() >= max {
            return Err(SchedulerError::SchedulerFull { max });
        }

        let total_duration_minutes = schedule.total_duration_minutes();
        let phase_count = schedule.len();

        match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(_) => return Err(SchedulerError::DuplicateSession(session_id)),
            Entry::Vacant(vacant) => {
                let state = SessionState::start(schedule, self.clock.now())?;
                vacant.insert(self.spawn_session(session_id.clone(), state, notifier));
            }
        }

        info!(
            session_id = %session_id,
            phases = phase_count,
            total_minutes = total_duration_minutes,
            "Session started"
        );
        let _ = self.event_publisher.send(SchedulerEvent::Started {
            session_id,
            total_duration_minutes,
        });

        Ok(())
    }

    /// Spawns the notifier, actor and monitor tasks for a new session.
    fn spawn_session(
        &self,
        session_id: SessionId,
        state: SessionState,
        notifier: Arc<dyn TransitionNotifier>,
    ) -> SessionEntry {
        let cancel = self.shutdown.child_token();
        let (cmd_tx, cmd_rx) = mpsc::channel(self.config.command_buffer);
        let handle = SessionHandle::new(cmd_tx);

        let (notify_tx, notify_task) = spawn_notifier(
            session_id.clone(),
            notifier,
            self.config.notify_queue_capacity,
            self.config.callback_timeout(),
        );
        supervise(session_id.clone(), "notifier", notify_task);

        let actor = SessionActor::new(
            session_id.clone(),
            state,
            cmd_rx,
            Arc::clone(&self.clock),
            notify_tx,
            self.event_publisher.clone(),
            cancel.clone(),
        );
        supervise(session_id.clone(), "actor", tokio::spawn(actor.run()));

        let monitor = spawn_phase_monitor(
            session_id.clone(),
            handle.clone(),
            self.config.poll_interval(),
            cancel.clone(),
        );
        supervise(session_id, "monitor", monitor);

        SessionEntry { handle, cancel }
    }

    /// Looks up a session's handle. The map guard is released on return.
    fn handle(&self, session_id: &SessionId) -> Result<SessionHandle, SchedulerError> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| SchedulerError::SessionNotFound(session_id.clone()))
    }

    /// Maps a closed actor channel to `SessionNotFound`: the session ended
    /// while the call was in flight.
    fn closed_as_not_found(session_id: &SessionId, err: SchedulerError) -> SchedulerError {
        match err {
            SchedulerError::ChannelClosed => SchedulerError::SessionNotFound(session_id.clone()),
            other => other,
        }
    }

    /// Pauses a session. Returns `false` if it was already paused.
    pub async fn pause_session(&self, session_id: &SessionId) -> Result<bool, SchedulerError> {
        self.handle(session_id)?
            .pause()
            .await
            .map_err(|e| Self::closed_as_not_found(session_id, e))
    }

    /// Resumes a session. Returns `false` if it was not paused.
    pub async fn resume_session(&self, session_id: &SessionId) -> Result<bool, SchedulerError> {
        self.handle(session_id)?
            .resume()
            .await
            .map_err(|e| Self::closed_as_not_found(session_id, e))
    }

    /// Closes the current phase and advances to the next.
    ///
    /// On the final phase this reports completion and leaves the session in
    /// the store; call [`end_session`](Self::end_session) to remove it.
    pub async fn transition(
        &self,
        session_id: &SessionId,
        forced: bool,
    ) -> Result<TransitionOutcome, SchedulerError> {
        self.handle(session_id)?
            .transition(forced)
            .await
            .map_err(|e| Self::closed_as_not_found(session_id, e))
    }

    /// Marks the current phase skipped and forces a transition.
    pub async fn skip_phase(
        &self,
        session_id: &SessionId,
    ) -> Result<TransitionOutcome, SchedulerError> {
        self.handle(session_id)?
            .skip()
            .await
            .map_err(|e| Self::closed_as_not_found(session_id, e))
    }

    pub async fn get_current_phase(
        &self,
        session_id: &SessionId,
    ) -> Result<PhaseRuntime, SchedulerError> {
        self.handle(session_id)?
            .current_phase()
            .await
            .map_err(|e| Self::closed_as_not_found(session_id, e))?
            .ok_or_else(|| SchedulerError::NoActivePhase(session_id.clone()))
    }

    pub async fn get_phase_progress(
        &self,
        session_id: &SessionId,
    ) -> Result<PhaseProgress, SchedulerError> {
        self.handle(session_id)?
            .progress()
            .await
            .map_err(|e| Self::closed_as_not_found(session_id, e))?
            .ok_or_else(|| SchedulerError::NoActivePhase(session_id.clone()))
    }

    pub async fn get_time_warnings(
        &self,
        session_id: &SessionId,
    ) -> Result<TimeWarnings, SchedulerError> {
        self.handle(session_id)?
            .warnings()
            .await
            .map_err(|e| Self::closed_as_not_found(session_id, e))?
            .ok_or_else(|| SchedulerError::NoActivePhase(session_id.clone()))
    }

    pub async fn snapshot(&self, session_id: &SessionId) -> Result<SessionSnapshot, SchedulerError> {
        self.handle(session_id)?
            .snapshot()
            .await
            .map_err(|e| Self::closed_as_not_found(session_id, e))
    }

    /// Removes a session and stops its monitor.
    ///
    /// Notifications already queued for the session are still delivered.
    pub fn end_session(&self, session_id: &SessionId) -> Result<(), SchedulerError> {
        let (session_id, entry) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| SchedulerError::SessionNotFound(session_id.clone()))?;

        entry.cancel.cancel();
        info!(session_id = %session_id, "Session ended");
        let _ = self.event_publisher.send(SchedulerEvent::Ended {
            session_id,
            reason: EndReason::Explicit,
        });
        Ok(())
    }

    /// Ends every session.
    pub fn shutdown(&self) {
        self.shutdown.cancel();

        let ids: Vec<SessionId> = self.session_ids();
        for id in ids {
            if let Some((session_id, _)) = self.sessions.remove(&id) {
                debug!(session_id = %session_id, "Session ended by shutdown");
                let _ = self.event_publisher.send(SchedulerEvent::Ended {
                    session_id,
                    reason: EndReason::Shutdown,
                });
            }
        }
        info!("Scheduler shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true while the session is stored and its actor is running.
    pub fn has_session(&self, session_id: &SessionId) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|entry| entry.handle.is_connected())
    }

    /// Subscribes to lifecycle events of every session.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_publisher.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopNotifier;
    use pacer_core::build_schedule;

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SchedulerConfig {
            max_sessions: 0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            Scheduler::new(config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let scheduler = scheduler();
        let id = SessionId::new("missing");

        let err = scheduler.pause_session(&id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(scheduler.get_phase_progress(&id).await.unwrap_err().is_not_found());
        assert!(scheduler.end_session(&id).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_start_and_end() {
        let scheduler = scheduler();
        let id = SessionId::new("s1");
        scheduler
            .start_session(id.clone(), build_schedule(None).unwrap(), Arc::new(NoopNotifier))
            .unwrap();

        assert!(scheduler.has_session(&id));
        assert_eq!(scheduler.session_ids(), vec![id.clone()]);

        scheduler.end_session(&id).unwrap();
        assert!(!scheduler.has_session(&id));
        assert_eq!(scheduler.session_count(), 0);
    }

    #[tokio::test]
    async fn test_has_session_ignores_stopped_actor() {
        let scheduler = scheduler();
        let id = SessionId::new("stopped");
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        drop(cmd_rx);
        scheduler.sessions.insert(
            id.clone(),
            SessionEntry {
                handle: SessionHandle::new(cmd_tx),
                cancel: CancellationToken::new(),
            },
        );

        assert_eq!(scheduler.session_count(), 1);
        assert!(!scheduler.has_session(&id));
    }

    #[tokio::test]
    async fn test_shutdown_ends_all() {
        let scheduler = scheduler();
        let mut events = scheduler.subscribe();
        for id in ["a", "b"] {
            scheduler
                .start_session(id, build_schedule(None).unwrap(), Arc::new(NoopNotifier))
                .unwrap();
        }

        scheduler.shutdown();
        assert!(scheduler.is_shut_down());
        assert_eq!(scheduler.session_count(), 0);

        let mut ended = 0;
        while let Ok(event) = events.try_recv() {
            if let SchedulerEvent::Ended { reason, .. } = event {
                assert_eq!(reason, EndReason::Shutdown);
                ended += 1;
            }
        }
        assert_eq!(ended, 2);
    }
}
