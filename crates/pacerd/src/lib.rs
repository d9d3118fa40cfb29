//! pacerd - runtime for timed multi-phase sessions
//!
//! This crate runs the schedules modelled in `pacer-core`: it keeps live
//! sessions in a store, watches each session's phase deadlines, applies
//! transitions, and notifies an external collaborator of every transition.
//!
//! Each session gets three tasks:
//! - a `SessionActor` that owns its state and serializes all calls
//! - a phase monitor that polls the deadline at the configured interval
//! - a notifier that delivers transition events with a timeout
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`
//! outside of tests.

pub mod clock;
pub mod config;
pub mod monitor;
pub mod notify;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, PacerConfig, SchedulerConfig};
pub use notify::{ChannelNotifier, FnNotifier, NoopNotifier, NotifyError, TransitionNotifier};
pub use scheduler::{EndReason, PollOutcome, Scheduler, SchedulerError, SchedulerEvent};
