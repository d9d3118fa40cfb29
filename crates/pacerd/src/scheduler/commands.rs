//! Session actor commands, errors, and events.
//!
//! This module defines the message types for communicating with a `SessionActor`:
//! - `SessionCommand`: Commands sent to one session's actor
//! - `SchedulerError`: Errors that can occur during scheduler operations
//! - `SchedulerEvent`: Events published by the scheduler for subscribers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use pacer_core::{
    DomainError, PhaseProgress, PhaseRuntime, SessionId, SessionSnapshot, TimeImpact,
    TimeWarnings, TransitionEvent, TransitionOutcome,
};
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Session Commands
// ============================================================================

/// Commands sent to a session actor.
///
/// Each command carries a oneshot channel for the response, so every read
/// and write of a session is serialized through its actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// Pause the session clock. Responds `false` if already paused.
    Pause {
        respond_to: oneshot::Sender<bool>,
    },

    /// Resume the session clock. Responds `false` if not paused.
    Resume {
        respond_to: oneshot::Sender<bool>,
    },

    /// Close the current phase and advance.
    Transition {
        /// Whether the caller forced the transition before the deadline
        forced: bool,
        respond_to: oneshot::Sender<Result<TransitionOutcome, SchedulerError>>,
    },

    /// Mark the current phase skipped and force a transition.
    ///
    /// # Errors
    /// - `SchedulerError::Domain(PhaseNotSkippable)` if the phase disallows skipping
    Skip {
        respond_to: oneshot::Sender<Result<TransitionOutcome, SchedulerError>>,
    },

    GetCurrentPhase {
        respond_to: oneshot::Sender<Option<PhaseRuntime>>,
    },

    GetProgress {
        respond_to: oneshot::Sender<Option<PhaseProgress>>,
    },

    GetWarnings {
        respond_to: oneshot::Sender<Option<TimeWarnings>>,
    },

    GetSnapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },

    /// Deadline check issued by the phase monitor on every tick.
    Poll {
        respond_to: oneshot::Sender<PollOutcome>,
    },
}

/// What a monitor tick found.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The current phase is still within its deadline.
    Running,

    /// The session is paused; the tick was skipped.
    Paused,

    /// The deadline passed and the session moved to the next phase.
    Advanced(TransitionOutcome),

    /// The final phase is complete; the monitor should stop.
    Finished,
}

// ============================================================================
// Scheduler Errors
// ============================================================================

/// Errors that can occur during scheduler operations.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// A session with this ID is already active.
    #[error("session already exists: {0}")]
    DuplicateSession(SessionId),

    /// The session is unknown or has already ended.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The scheduler has reached its maximum session capacity.
    #[error("scheduler is full (max: {max} sessions)")]
    SchedulerFull {
        /// Maximum number of sessions allowed
        max: usize,
    },

    /// The session holds no current phase.
    ///
    /// Sessions start with at least one phase and the index never moves
    /// past the last one, so this only surfaces if that invariant breaks.
    #[error("session {0} has no active phase")]
    NoActivePhase(SessionId),

    /// The scheduler has been shut down and accepts no new sessions.
    #[error("scheduler is shut down")]
    ShutDown,

    /// Invalid schedule input or a rejected phase operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the session actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

impl SchedulerError {
    /// Returns true for errors a transport should surface as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::NoActivePhase(_))
    }

    /// Returns true for errors caused by invalid caller input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::DuplicateSession(_) | Self::Domain(_))
    }
}

// ============================================================================
// Scheduler Events
// ============================================================================

/// Events published by the scheduler to subscribers.
///
/// Independent of per-session callbacks: every subscriber sees every
/// session's lifecycle.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A session was started.
    Started {
        session_id: SessionId,
        total_duration_minutes: u32,
    },

    Paused {
        session_id: SessionId,
    },

    Resumed {
        session_id: SessionId,
    },

    /// A transition notification, mirrored from the session callback.
    Transition {
        session_id: SessionId,
        event: TransitionEvent,
    },

    /// The final phase of a session was completed.
    Completed {
        session_id: SessionId,
        time_impact: TimeImpact,
    },

    /// A session was removed from the scheduler.
    Ended {
        session_id: SessionId,
        reason: EndReason,
    },
}

impl SchedulerEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Started { session_id, .. }
            | Self::Paused { session_id }
            | Self::Resumed { session_id }
            | Self::Transition { session_id, .. }
            | Self::Completed { session_id, .. }
            | Self::Ended { session_id, .. } => session_id,
        }
    }
}

/// Reason why a session was removed from the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Caller explicitly ended the session.
    Explicit,

    /// The scheduler was shut down.
    Shutdown,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicitly ended"),
            Self::Shutdown => write!(f, "scheduler shut down"),
        }
    }
}
