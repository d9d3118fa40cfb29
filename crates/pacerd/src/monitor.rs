//! Phase monitoring for running sessions.
//!
//! Each session gets one monitor task that ticks at the configured poll
//! interval and asks the session actor whether the current phase's
//! deadline has passed. The actor performs the transition; the monitor
//! only drives the clock checks and decides when to stop.
//!
//! A monitor stops when:
//! - the session's cancellation token fires (session ended or scheduler shut down)
//! - the actor reports the final phase complete
//! - the actor is gone (its channel closed)
//!
//! # Panic-Free Guarantees
//!
//! Poll failures end this session's loop only. Panics inside session tasks
//! are caught by [`supervise`] and logged.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use pacer_core::SessionId;

use crate::scheduler::{PollOutcome, SchedulerError, SessionHandle};

/// Spawns the deadline monitor for one session.
///
/// The first tick fires immediately, so a phase that is already past its
/// deadline is handled without waiting a full interval.
pub fn spawn_phase_monitor(
    session_id: SessionId,
    handle: SessionHandle,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            session_id = %session_id,
            poll_interval_ms = poll_interval.as_millis() as u64,
            "Phase monitor started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(session_id = %session_id, "Phase monitor cancelled");
                    break;
                }

                _ = tick.tick() => {
                    if !check_deadline(&session_id, &handle).await {
                        break;
                    }
                }
            }
        }

        debug!(session_id = %session_id, "Phase monitor task completed");
    })
}

/// Runs one poll. Returns `false` when the monitor should stop.
async fn check_deadline(session_id: &SessionId, handle: &SessionHandle) -> bool {
    match handle.poll().await {
        Ok(PollOutcome::Running) => true,
        Ok(PollOutcome::Paused) => {
            debug!(session_id = %session_id, "Session paused, skipping tick");
            true
        }
        Ok(PollOutcome::Advanced(outcome)) => {
            debug!(
                session_id = %session_id,
                message = %outcome.message(),
                "Deadline transition applied"
            );
            true
        }
        Ok(PollOutcome::Finished) => {
            info!(session_id = %session_id, "Schedule finished, phase monitor exiting");
            false
        }
        Err(SchedulerError::ChannelClosed) => {
            debug!(session_id = %session_id, "Session actor gone, phase monitor exiting");
            false
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Phase monitor fault");
            false
        }
    }
}

/// Watches a session task and logs it if it panicked.
///
/// Tokio already confines a panic to the task it happened in; this makes
/// the fault visible and attributes it to the session.
pub fn supervise(
    session_id: SessionId,
    task: &'static str,
    handle: JoinHandle<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                error!(session_id = %session_id, task, "Session task panicked");
            }
            Err(_) => {
                debug!(session_id = %session_id, task, "Session task aborted");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SessionCommand;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    /// Answers polls with `Running` until `finish_after` polls, then `Finished`.
    fn fake_actor(finish_after: usize) -> (SessionHandle, Arc<AtomicUsize>) {
        let (tx, mut rx) = mpsc::channel(8);
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                if let SessionCommand::Poll { respond_to } = cmd {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    let outcome = if n >= finish_after {
                        PollOutcome::Finished
                    } else {
                        PollOutcome::Running
                    };
                    let _ = respond_to.send(outcome);
                }
            }
        });

        (SessionHandle::new(tx), polls)
    }

    #[tokio::test]
    async fn test_monitor_exits_when_finished() {
        let (handle, polls) = fake_actor(3);
        let task = spawn_phase_monitor(
            SessionId::new("s1"),
            handle,
            Duration::from_millis(5),
            CancellationToken::new(),
        );

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("monitor should exit after Finished")
            .unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_monitor_stops_on_cancel() {
        let (handle, _polls) = fake_actor(usize::MAX);
        let cancel = CancellationToken::new();
        let task = spawn_phase_monitor(
            SessionId::new("s1"),
            handle,
            Duration::from_millis(5),
            cancel.clone(),
        );

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("monitor should stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn test_monitor_exits_when_actor_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let task = spawn_phase_monitor(
            SessionId::new("s1"),
            SessionHandle::new(tx),
            Duration::from_millis(5),
            CancellationToken::new(),
        );

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("monitor should exit when the actor is gone")
            .unwrap();
    }

    #[tokio::test]
    async fn test_supervise_contains_panic() {
        let inner = tokio::spawn(async {
            if true {
                panic!("monitor blew up");
            }
        });
        let watcher = supervise(SessionId::new("s1"), "monitor", inner);
        assert!(watcher.await.is_ok());
    }
}
