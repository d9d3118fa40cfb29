//! Notification payloads delivered to transition collaborators.

use serde::{Deserialize, Serialize};

use crate::{PhaseName, TimeImpact};

/// Event sent to the transition callback of a session.
///
/// Ephemeral: events are delivered fire-and-forget and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransitionEvent {
    /// The session moved from one phase to the next.
    Transitioned {
        from_phase: PhaseName,
        to_phase: PhaseName,
        was_forced: bool,
        time_impact: TimeImpact,
    },

    /// The final phase ran past its deadline; the schedule is exhausted.
    TimeExceeded {
        phase: PhaseName,
        time_impact: TimeImpact,
    },
}

impl TransitionEvent {
    pub fn time_impact(&self) -> TimeImpact {
        match self {
            Self::Transitioned { time_impact, .. } | Self::TimeExceeded { time_impact, .. } => {
                *time_impact
            }
        }
    }

    /// The phase that was closed.
    pub fn phase(&self) -> &PhaseName {
        match self {
            Self::Transitioned { from_phase, .. } => from_phase,
            Self::TimeExceeded { phase, .. } => phase,
        }
    }
}
