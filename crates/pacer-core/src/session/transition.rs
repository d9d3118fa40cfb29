//! Phase transitions: closing the current phase and advancing the schedule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{to_minutes, SessionState};
use crate::{DomainError, DomainResult, PhaseName, TransitionEvent};

/// Signed difference between a phase's actual and planned duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeImpact {
    pub expected_minutes: f64,
    pub actual_minutes: f64,
    /// `actual_minutes - expected_minutes`; positive means over time
    pub difference_minutes: f64,
    pub is_over_time: bool,
}

impl TimeImpact {
    pub fn new(expected_minutes: f64, actual_minutes: f64) -> Self {
        let difference_minutes = actual_minutes - expected_minutes;
        Self {
            expected_minutes,
            actual_minutes,
            difference_minutes,
            is_over_time: difference_minutes > 0.0,
        }
    }
}

/// Result of a transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The current phase closed and the next phase became current.
    Advanced {
        from_phase: PhaseName,
        to_phase: PhaseName,
        was_forced: bool,
        time_impact: TimeImpact,
    },

    /// The final phase closed; the session has no further phases.
    Completed {
        phase: PhaseName,
        was_forced: bool,
        time_impact: TimeImpact,
    },
}

impl TransitionOutcome {
    pub fn time_impact(&self) -> TimeImpact {
        match self {
            Self::Advanced { time_impact, .. } | Self::Completed { time_impact, .. } => {
                *time_impact
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Human-readable summary of the transition.
    pub fn message(&self) -> String {
        match self {
            Self::Advanced {
                from_phase,
                to_phase,
                ..
            } => format!("Transitioned from {from_phase} to {to_phase}"),
            Self::Completed { .. } => "Interview completed".to_string(),
        }
    }

    /// Notification for collaborators, if this outcome moved to a new phase.
    ///
    /// A manual completion of the final phase produces no notification.
    pub fn to_event(&self) -> Option<TransitionEvent> {
        match self {
            Self::Advanced {
                from_phase,
                to_phase,
                was_forced,
                time_impact,
            } => Some(TransitionEvent::Transitioned {
                from_phase: from_phase.clone(),
                to_phase: to_phase.clone(),
                was_forced: *was_forced,
                time_impact: *time_impact,
            }),
            Self::Completed { .. } => None,
        }
    }
}

impl SessionState {
    /// Closes the current phase and advances to the next one.
    ///
    /// The current phase is marked completed and its actual duration is
    /// recorded as wall-clock minutes from its `start_time` to `now`; a phase
    /// that is already completed keeps its first recorded duration. On the
    /// final phase the index stays put and the outcome is `Completed`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptySchedule` if the session holds no phases.
    pub fn transition(
        &mut self,
        now: DateTime<Utc>,
        forced: bool,
    ) -> DomainResult<TransitionOutcome> {
        let index = self.current_phase_index;
        let has_next = index + 1 < self.phase_runtimes.len();

        let current = self
            .phase_runtimes
            .get_mut(index)
            .ok_or(DomainError::EmptySchedule)?;

        if !current.is_completed {
            current.is_completed = true;
            current.actual_duration_minutes =
                Some(to_minutes(now.signed_duration_since(current.start_time)));
            debug!(
                phase = %current.phase,
                actual_minutes = ?current.actual_duration_minutes,
                forced,
                "Phase completed"
            );
        }
        let from_phase = current.phase.clone();
        let time_impact = current
            .time_impact()
            .unwrap_or_else(|| TimeImpact::new(current.planned_minutes(), 0.0));

        // A pause spanning the transition is charged to the phase it started
        // in; the next phase starts a fresh pause slice.
        if self.is_paused {
            if let Some(paused_at) = self.pause_start_time {
                self.total_pause_duration =
                    self.total_pause_duration + now.signed_duration_since(paused_at);
                self.pause_start_time = Some(now);
            }
        }
        self.phase_pause_duration = Duration::zero();

        if !has_next {
            return Ok(TransitionOutcome::Completed {
                phase: from_phase,
                was_forced: forced,
                time_impact,
            });
        }

        self.current_phase_index = index + 1;
        let to_phase = self
            .phase_runtimes
            .get(self.current_phase_index)
            .map(|p| p.phase.clone())
            .ok_or(DomainError::EmptySchedule)?;

        Ok(TransitionOutcome::Advanced {
            from_phase,
            to_phase,
            was_forced: forced,
            time_impact,
        })
    }

    /// Skips the current phase: marks it skipped, then forces a transition.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseNotSkippable` if the current phase's spec
    /// does not allow skipping.
    pub fn skip(&mut self, now: DateTime<Utc>) -> DomainResult<TransitionOutcome> {
        let index = self.current_phase_index;
        let spec = self
            .schedule
            .phase(index)
            .ok_or(DomainError::EmptySchedule)?;

        if !spec.is_skippable {
            return Err(DomainError::PhaseNotSkippable {
                phase: spec.name.to_string(),
            });
        }

        if let Some(current) = self.phase_runtimes.get_mut(index) {
            current.is_skipped = true;
        }
        self.transition(now, true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{default_state, minutes, t0};
    use super::*;
    use crate::{build_schedule, PhaseInput};

    #[test]
    fn test_time_impact() {
        let impact = TimeImpact::new(5.0, 6.5);
        assert_eq!(impact.difference_minutes, 1.5);
        assert!(impact.is_over_time);

        let impact = TimeImpact::new(5.0, 3.0);
        assert_eq!(impact.difference_minutes, -2.0);
        assert!(!impact.is_over_time);

        assert!(!TimeImpact::new(5.0, 5.0).is_over_time);
    }

    #[test]
    fn test_transition_advances() {
        let mut state = default_state();
        let outcome = state.transition(t0() + minutes(6), false).unwrap();

        assert_eq!(state.current_phase_index(), 1);
        let first = &state.phase_runtimes()[0];
        assert!(first.is_completed);
        assert_eq!(first.actual_duration_minutes, Some(6.0));

        match &outcome {
            TransitionOutcome::Advanced {
                from_phase,
                to_phase,
                was_forced,
                time_impact,
            } => {
                assert_eq!(*from_phase, PhaseName::introduction());
                assert_eq!(*to_phase, PhaseName::behavioral());
                assert!(!was_forced);
                assert_eq!(time_impact.expected_minutes, 5.0);
                assert_eq!(time_impact.actual_minutes, 6.0);
                assert!(time_impact.is_over_time);
            }
            other => panic!("expected Advanced, got {other:?}"),
        }
        assert_eq!(outcome.message(), "Transitioned from introduction to behavioral");
    }

    #[test]
    fn test_forced_early_transition_is_under_time() {
        let mut state = default_state();
        let outcome = state.transition(t0() + minutes(2), true).unwrap();
        let impact = outcome.time_impact();
        assert_eq!(impact.difference_minutes, -3.0);
        assert!(!impact.is_over_time);

        match outcome.to_event() {
            Some(TransitionEvent::Transitioned { was_forced, .. }) => assert!(was_forced),
            other => panic!("expected Transitioned event, got {other:?}"),
        }
    }

    #[test]
    fn test_transition_on_last_phase_completes() {
        let inputs = vec![PhaseInput::new("solo", 10)];
        let mut state = SessionState::start(build_schedule(Some(&inputs)).unwrap(), t0()).unwrap();

        let outcome = state.transition(t0() + minutes(8), false).unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.message(), "Interview completed");
        assert_eq!(outcome.to_event(), None);
        assert_eq!(state.current_phase_index(), 0);
        assert!(state.is_finished());

        // Repeated calls keep reporting completion and keep the first duration
        let again = state.transition(t0() + minutes(20), true).unwrap();
        assert!(again.is_completed());
        assert_eq!(state.current_phase_index(), 0);
        assert_eq!(again.time_impact().actual_minutes, 8.0);
    }

    #[test]
    fn test_walk_full_schedule() {
        let mut state = default_state();
        let mut now = t0();
        for _ in 0..4 {
            now = now + minutes(1);
            assert!(!state.transition(now, true).unwrap().is_completed());
        }
        assert_eq!(state.current_phase_index(), 4);
        assert!(state.transition(now, true).unwrap().is_completed());
        assert_eq!(state.current_phase_index(), 4);
        assert!(state.phase_runtimes().iter().all(|p| p.is_completed));
    }

    #[test]
    fn test_phase_closed_before_its_slot_records_negative_duration() {
        let mut state = default_state();
        state.transition(t0() + minutes(1), true).unwrap();
        // Behavioral is scheduled from minute 5 and closed at minute 2
        state.transition(t0() + minutes(2), true).unwrap();

        let behavioral = &state.phase_runtimes()[1];
        assert_eq!(behavioral.actual_duration_minutes, Some(-3.0));
    }

    #[test]
    fn test_transition_while_paused_splits_pause() {
        let mut state = default_state();
        state.pause(t0() + minutes(2));
        state.transition(t0() + minutes(4), true).unwrap();

        assert!(state.is_paused());
        assert_eq!(state.total_pause_duration(), minutes(2));
        assert_eq!(state.pause_start_time(), Some(t0() + minutes(4)));

        state.resume(t0() + minutes(7));
        assert_eq!(state.total_pause_duration(), minutes(5));
    }

    #[test]
    fn test_skip_requires_skippable() {
        let mut state = default_state();
        let err = state.skip(t0() + minutes(1)).unwrap_err();
        assert_eq!(
            err,
            DomainError::PhaseNotSkippable {
                phase: "introduction".to_string()
            }
        );
        assert_eq!(state.current_phase_index(), 0);
        assert!(!state.phase_runtimes()[0].is_completed);
    }

    #[test]
    fn test_skip_marks_and_forces() {
        let inputs = vec![
            PhaseInput::new("warmup", 5).skippable(true),
            PhaseInput::new("coding", 30),
        ];
        let mut state = SessionState::start(build_schedule(Some(&inputs)).unwrap(), t0()).unwrap();

        let outcome = state.skip(t0() + minutes(1)).unwrap();
        let warmup = &state.phase_runtimes()[0];
        assert!(warmup.is_skipped);
        assert!(warmup.is_completed);
        assert_eq!(state.current_phase_index(), 1);
        assert!(matches!(
            outcome,
            TransitionOutcome::Advanced {
                was_forced: true,
                ..
            }
        ));
    }
}
