//! Session entities: identifiers, per-phase runtime records and session state.
//!
//! `SessionState` is a plain value. Every operation that depends on time takes
//! an explicit `now`, so the runtime decides which clock drives it and tests
//! can simulate arbitrary elapsed time.

mod progress;
mod transition;

pub use progress::{PhaseProgress, TimeWarning, TimeWarnings, WarningLevel};
pub use transition::{TimeImpact, TransitionOutcome};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DomainError, DomainResult, PhaseName, Schedule};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Caller-supplied identifier of a session.
///
/// This core does not generate ids; uniqueness is only enforced against
/// the set of currently active sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Converts a duration to fractional minutes at millisecond precision.
pub fn to_minutes(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 60_000.0
}

// ============================================================================
// Phase Runtime
// ============================================================================

/// Mutable timing record for one phase of a running session.
///
/// `start_time` and `end_time` are laid out once when the session starts
/// and never shifted afterwards, not even by pauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRuntime {
    pub phase: PhaseName,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_completed: bool,
    pub is_skipped: bool,
    /// Wall-clock minutes from `start_time` to completion; set once.
    pub actual_duration_minutes: Option<f64>,
}

impl PhaseRuntime {
    /// Planned length of the phase.
    pub fn planned_duration(&self) -> Duration {
        self.end_time.signed_duration_since(self.start_time)
    }

    pub fn planned_minutes(&self) -> f64 {
        to_minutes(self.planned_duration())
    }

    /// Actual vs planned duration, available once the phase is completed.
    pub fn time_impact(&self) -> Option<TimeImpact> {
        self.actual_duration_minutes
            .map(|actual| TimeImpact::new(self.planned_minutes(), actual))
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Live state of one session.
///
/// Owned by exactly one runtime task; mutated only through
/// [`pause`](Self::pause), [`resume`](Self::resume),
/// [`transition`](Self::transition) and [`skip`](Self::skip).
#[derive(Debug, Clone)]
pub struct SessionState {
    schedule: Schedule,
    phase_runtimes: Vec<PhaseRuntime>,
    current_phase_index: usize,
    is_paused: bool,
    pause_start_time: Option<DateTime<Utc>>,
    total_pause_duration: Duration,
    /// Pause time accrued while the current phase was current
    phase_pause_duration: Duration,
}

impl SessionState {
    /// Lays out the schedule's phases back to back starting at `now`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptySchedule` if the schedule has no phases.
    pub fn start(schedule: Schedule, now: DateTime<Utc>) -> DomainResult<Self> {
        if schedule.is_empty() {
            return Err(DomainError::EmptySchedule);
        }

        let mut cursor = now;
        let phase_runtimes = schedule
            .phases()
            .iter()
            .map(|spec| {
                let start_time = cursor;
                let end_time = start_time + spec.duration();
                cursor = end_time;
                PhaseRuntime {
                    phase: spec.name.clone(),
                    start_time,
                    end_time,
                    is_completed: false,
                    is_skipped: false,
                    actual_duration_minutes: None,
                }
            })
            .collect();

        Ok(Self {
            schedule,
            phase_runtimes,
            current_phase_index: 0,
            is_paused: false,
            pause_start_time: None,
            total_pause_duration: Duration::zero(),
            phase_pause_duration: Duration::zero(),
        })
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn phase_runtimes(&self) -> &[PhaseRuntime] {
        &self.phase_runtimes
    }

    pub fn current_phase_index(&self) -> usize {
        self.current_phase_index
    }

    pub fn current_phase(&self) -> Option<&PhaseRuntime> {
        self.phase_runtimes.get(self.current_phase_index)
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn pause_start_time(&self) -> Option<DateTime<Utc>> {
        self.pause_start_time
    }

    /// Cumulative duration of all finished pauses.
    pub fn total_pause_duration(&self) -> Duration {
        self.total_pause_duration
    }

    pub fn is_last_phase(&self) -> bool {
        self.current_phase_index + 1 >= self.phase_runtimes.len()
    }

    /// Returns true once the final phase has been marked complete.
    pub fn is_finished(&self) -> bool {
        self.is_last_phase() && self.current_phase().is_some_and(|p| p.is_completed)
    }

    /// The instant elapsed-time calculations use: the pause start while
    /// paused, `now` otherwise.
    pub fn effective_now(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match (self.is_paused, self.pause_start_time) {
            (true, Some(paused_at)) => paused_at,
            _ => now,
        }
    }

    /// Returns true when the monitor should fire a transition: the session
    /// is running, the current phase is open and its deadline has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.is_paused {
            return false;
        }
        self.current_phase()
            .is_some_and(|p| !p.is_completed && now >= p.end_time)
    }

    /// Pauses the session. Returns false if it was already paused.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_paused {
            return false;
        }
        self.is_paused = true;
        self.pause_start_time = Some(now);
        true
    }

    /// Resumes the session. Returns false if it was not paused.
    ///
    /// The pause length is added to the session total and to the current
    /// phase's pause allowance. Phase deadlines are left untouched.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_paused {
            return false;
        }
        if let Some(paused_at) = self.pause_start_time.take() {
            let paused_for = now.signed_duration_since(paused_at);
            self.total_pause_duration = self.total_pause_duration + paused_for;
            self.phase_pause_duration = self.phase_pause_duration + paused_for;
        }
        self.is_paused = false;
        true
    }

    /// Serializable view of the whole session.
    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            schedule: self.schedule.clone(),
            phase_runtimes: self.phase_runtimes.clone(),
            current_phase_index: self.current_phase_index,
            is_paused: self.is_paused,
            pause_start_time: self.pause_start_time,
            total_pause_minutes: to_minutes(self.total_pause_duration),
            is_finished: self.is_finished(),
            taken_at: now,
        }
    }
}

/// Point-in-time copy of a session, for queries and display.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub schedule: Schedule,
    pub phase_runtimes: Vec<PhaseRuntime>,
    pub current_phase_index: usize,
    pub is_paused: bool,
    pub pause_start_time: Option<DateTime<Utc>>,
    pub total_pause_minutes: f64,
    pub is_finished: bool,
    pub taken_at: DateTime<Utc>,
}
