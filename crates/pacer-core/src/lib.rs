//! pacer core - domain types for timed multi-phase sessions
//!
//! This crate holds the pure domain model shared by the runtime (`pacerd`)
//! and the CLI: phase names and specs, the schedule builder, per-session
//! state with its transition engine, and progress/warning calculations.
//!
//! Nothing here reads a clock or spawns tasks. Every time-dependent
//! operation takes `now` as an argument.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`
//! outside of tests.

pub mod error;
pub mod event;
pub mod phase;
pub mod schedule;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use event::TransitionEvent;
pub use phase::{PhaseInput, PhaseName, PhaseSpec};
pub use schedule::{build_custom_schedule, build_schedule, Schedule, DEFAULT_TOTAL_MINUTES};
pub use session::{
    to_minutes, PhaseProgress, PhaseRuntime, SessionId, SessionSnapshot, SessionState,
    TimeImpact, TimeWarning, TimeWarnings, TransitionOutcome, WarningLevel,
};
