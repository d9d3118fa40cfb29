//! Read-side progress and time-warning calculations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{to_minutes, SessionState};
use crate::PhaseName;

/// Remaining minutes below which an `Info` warning is raised.
pub const INFO_THRESHOLD_MINUTES: f64 = 5.0;

/// Remaining minutes below which a `Warning` is raised.
pub const WARNING_THRESHOLD_MINUTES: f64 = 1.0;

/// Progress of the current phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase: PhaseName,
    pub elapsed_minutes: f64,
    pub total_minutes: f64,
    pub progress_percentage: f64,
    pub is_completed: bool,
    pub is_skipped: bool,
}

/// Severity of a time warning, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Info,
    Warning,
    Critical,
}

impl WarningLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWarning {
    pub level: WarningLevel,
    pub message: String,
}

impl TimeWarning {
    /// The single most severe warning applicable to `remaining_minutes`.
    ///
    /// Negative remaining time is `Critical`, under one minute is `Warning`,
    /// under five minutes is `Info`; anything else raises nothing.
    pub fn for_remaining(remaining_minutes: f64) -> Option<Self> {
        if remaining_minutes < 0.0 {
            Some(Self {
                level: WarningLevel::Critical,
                message: format!(
                    "Phase is {:.1} minutes over time",
                    remaining_minutes.abs()
                ),
            })
        } else if remaining_minutes < WARNING_THRESHOLD_MINUTES {
            Some(Self {
                level: WarningLevel::Warning,
                message: "Less than 1 minute remaining in current phase".to_string(),
            })
        } else if remaining_minutes < INFO_THRESHOLD_MINUTES {
            Some(Self {
                level: WarningLevel::Info,
                message: format!("{remaining_minutes:.1} minutes remaining in current phase"),
            })
        } else {
            None
        }
    }
}

/// Time warnings for the current phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWarnings {
    pub phase: PhaseName,
    pub elapsed_minutes: f64,
    pub remaining_minutes: f64,
    /// At most one entry: the most severe applicable warning
    pub warnings: Vec<TimeWarning>,
}

impl TimeWarnings {
    pub fn highest_level(&self) -> Option<WarningLevel> {
        self.warnings.iter().map(|w| w.level).max()
    }
}

impl SessionState {
    /// Active time spent in the current phase as of `now`.
    ///
    /// Measured from the phase's `start_time` to the effective now, minus
    /// pauses taken during this phase. Never negative: a phase reached early
    /// through a forced transition reports zero until its slot begins.
    fn phase_elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        let current = self.current_phase()?;
        let raw = self
            .effective_now(now)
            .signed_duration_since(current.start_time)
            - self.phase_pause_duration;
        Some(raw.max(Duration::zero()))
    }

    /// Progress of the current phase, computed at the effective now.
    pub fn progress(&self, now: DateTime<Utc>) -> Option<PhaseProgress> {
        let current = self.current_phase()?;
        let elapsed_minutes = to_minutes(self.phase_elapsed(now)?);
        let total_minutes = current.planned_minutes();
        let progress_percentage = if total_minutes > 0.0 {
            elapsed_minutes / total_minutes * 100.0
        } else {
            100.0
        };

        Some(PhaseProgress {
            phase: current.phase.clone(),
            elapsed_minutes,
            total_minutes,
            progress_percentage,
            is_completed: current.is_completed,
            is_skipped: current.is_skipped,
        })
    }

    /// Threshold-based warnings for the current phase.
    pub fn warnings(&self, now: DateTime<Utc>) -> Option<TimeWarnings> {
        let current = self.current_phase()?;
        let elapsed_minutes = to_minutes(self.phase_elapsed(now)?);
        let remaining_minutes = current.planned_minutes() - elapsed_minutes;

        Some(TimeWarnings {
            phase: current.phase.clone(),
            elapsed_minutes,
            remaining_minutes,
            warnings: TimeWarning::for_remaining(remaining_minutes)
                .into_iter()
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{default_state, minutes, t0};
    use super::*;

    fn seconds(s: i64) -> Duration {
        Duration::seconds(s)
    }

    #[test]
    fn test_progress_at_start() {
        let state = default_state();
        let progress = state.progress(t0()).unwrap();
        assert_eq!(progress.phase, PhaseName::introduction());
        assert_eq!(progress.elapsed_minutes, 0.0);
        assert_eq!(progress.total_minutes, 5.0);
        assert_eq!(progress.progress_percentage, 0.0);
        assert!(!progress.is_completed);
        assert!(!progress.is_skipped);
    }

    #[test]
    fn test_progress_midway() {
        let state = default_state();
        let progress = state.progress(t0() + seconds(150)).unwrap();
        assert_eq!(progress.elapsed_minutes, 2.5);
        assert_eq!(progress.progress_percentage, 50.0);
    }

    #[test]
    fn test_pause_freezes_progress() {
        let mut state = default_state();
        state.pause(t0() + minutes(2));

        let first = state.progress(t0() + minutes(3)).unwrap();
        let second = state.progress(t0() + minutes(9)).unwrap();
        assert_eq!(first.elapsed_minutes, 2.0);
        assert_eq!(second.elapsed_minutes, 2.0);
    }

    #[test]
    fn test_resume_excludes_pause_from_elapsed() {
        let mut state = default_state();
        state.pause(t0() + minutes(2));
        state.resume(t0() + minutes(12));

        let progress = state.progress(t0() + minutes(12)).unwrap();
        assert_eq!(progress.elapsed_minutes, 2.0);

        let progress = state.progress(t0() + minutes(13)).unwrap();
        assert_eq!(progress.elapsed_minutes, 3.0);
    }

    #[test]
    fn test_pause_in_previous_phase_not_charged_to_next() {
        let mut state = default_state();
        state.pause(t0() + minutes(1));
        state.resume(t0() + minutes(3));
        state.transition(t0() + minutes(5), false).unwrap();

        let progress = state.progress(t0() + minutes(6)).unwrap();
        assert_eq!(progress.phase, PhaseName::behavioral());
        assert_eq!(progress.elapsed_minutes, 1.0);
    }

    #[test]
    fn test_early_phase_elapsed_clamped() {
        let mut state = default_state();
        state.transition(t0() + minutes(1), true).unwrap();
        let progress = state.progress(t0() + minutes(2)).unwrap();
        assert_eq!(progress.elapsed_minutes, 0.0);
    }

    #[test]
    fn test_warning_thresholds() {
        assert_eq!(TimeWarning::for_remaining(10.0), None);
        assert_eq!(TimeWarning::for_remaining(5.0), None);

        let info = TimeWarning::for_remaining(3.5).unwrap();
        assert_eq!(info.level, WarningLevel::Info);
        assert_eq!(info.message, "3.5 minutes remaining in current phase");

        let warning = TimeWarning::for_remaining(0.5).unwrap();
        assert_eq!(warning.level, WarningLevel::Warning);

        let at_deadline = TimeWarning::for_remaining(0.0).unwrap();
        assert_eq!(at_deadline.level, WarningLevel::Warning);

        let critical = TimeWarning::for_remaining(-2.0).unwrap();
        assert_eq!(critical.level, WarningLevel::Critical);
        assert_eq!(critical.message, "Phase is 2.0 minutes over time");
    }

    #[test]
    fn test_warnings_half_minute_left() {
        let state = default_state();
        let warnings = state.warnings(t0() + seconds(270)).unwrap();
        assert_eq!(warnings.remaining_minutes, 0.5);
        assert_eq!(warnings.warnings.len(), 1);
        assert_eq!(warnings.highest_level(), Some(WarningLevel::Warning));
    }

    #[test]
    fn test_warnings_two_minutes_over() {
        let state = default_state();
        let warnings = state.warnings(t0() + minutes(7)).unwrap();
        assert_eq!(warnings.phase, PhaseName::introduction());
        assert_eq!(warnings.elapsed_minutes, 7.0);
        assert_eq!(warnings.remaining_minutes, -2.0);
        assert_eq!(warnings.warnings.len(), 1);
        assert_eq!(warnings.warnings[0].level, WarningLevel::Critical);
        assert!(warnings.warnings[0].message.contains("2.0 minutes over"));
    }

    #[test]
    fn test_no_warning_early() {
        let state = default_state();
        let warnings = state.warnings(t0()).unwrap();
        assert!(warnings.warnings.is_empty());
        assert_eq!(warnings.highest_level(), None);
    }

    #[test]
    fn test_warning_level_order_and_serde() {
        assert!(WarningLevel::Critical > WarningLevel::Warning);
        assert!(WarningLevel::Warning > WarningLevel::Info);
        assert_eq!(
            serde_json::to_string(&WarningLevel::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(WarningLevel::Info.to_string(), "info");
    }
}
