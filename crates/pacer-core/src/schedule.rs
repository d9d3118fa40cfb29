//! Schedule construction.
//!
//! A [`Schedule`] is the immutable, ordered plan of phases for one session.
//! It is built once, before a session starts, and never reordered afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::phase::{PhaseInput, PhaseName, PhaseSpec};
use crate::{DomainError, DomainResult};

/// Total length of the built-in schedule, in minutes.
pub const DEFAULT_TOTAL_MINUTES: u32 = 75;

/// Ordered, immutable plan of phases for one session.
///
/// Only constructible through the builders, so a schedule always holds at
/// least one validated phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    phases: Vec<PhaseSpec>,
    total_duration_minutes: u32,
    is_custom: bool,
    created_at: DateTime<Utc>,
}

impl Schedule {
    /// The built-in five-phase interview schedule.
    ///
    /// Introduction(5) → Behavioral(15) → Technical(20) → Coding(30) → Closing(5).
    pub fn default_schedule() -> Self {
        let phases = vec![
            PhaseSpec::new(
                PhaseName::introduction(),
                5,
                "Introduction and rapport building",
            ),
            PhaseSpec::new(
                PhaseName::behavioral(),
                15,
                "Behavioral questions and past experience",
            ),
            PhaseSpec::new(PhaseName::technical(), 20, "Technical knowledge assessment"),
            PhaseSpec::new(PhaseName::coding(), 30, "Coding problem solving"),
            PhaseSpec::new(PhaseName::closing(), 5, "Closing remarks and questions"),
        ];

        Self {
            phases,
            total_duration_minutes: DEFAULT_TOTAL_MINUTES,
            is_custom: false,
            created_at: Utc::now(),
        }
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> Option<&PhaseSpec> {
        self.phases.get(index)
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn total_duration_minutes(&self) -> u32 {
        self.total_duration_minutes
    }

    /// Returns true if built from caller-supplied phases.
    pub fn is_custom(&self) -> bool {
        self.is_custom
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::default_schedule()
    }
}

/// Builds a schedule, falling back to the default when no phases are given.
///
/// `None` and an empty slice both yield [`Schedule::default_schedule`].
///
/// # Errors
///
/// Returns `DomainError::InvalidSchedule` if any entry has an empty name
/// or a non-positive duration. No partial schedule is produced.
pub fn build_schedule(custom_phases: Option<&[PhaseInput]>) -> DomainResult<Schedule> {
    match custom_phases {
        Some(phases) if !phases.is_empty() => build_custom_schedule(phases),
        _ => Ok(Schedule::default_schedule()),
    }
}

/// Builds a schedule from explicitly requested custom phases.
///
/// Unlike [`build_schedule`], an empty list is an error: a caller that asked
/// for a custom schedule and supplied nothing has sent invalid input.
///
/// # Errors
///
/// - `DomainError::EmptySchedule` if `phases` is empty
/// - `DomainError::InvalidSchedule` if an entry is invalid or the total overflows
pub fn build_custom_schedule(phases: &[PhaseInput]) -> DomainResult<Schedule> {
    if phases.is_empty() {
        return Err(DomainError::EmptySchedule);
    }

    let specs = phases
        .iter()
        .map(PhaseInput::to_spec)
        .collect::<DomainResult<Vec<_>>>()?;

    let total_duration_minutes = specs
        .iter()
        .try_fold(0u32, |total, spec| total.checked_add(spec.duration_minutes))
        .ok_or_else(|| DomainError::invalid_schedule("total duration overflows"))?;

    Ok(Schedule {
        phases: specs,
        total_duration_minutes,
        is_custom: true,
        created_at: Utc::now(),
    })
}
