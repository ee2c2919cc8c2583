//! Drives a [`Session`] from a live [`SampleSource`].
//!
//! The source runs on tokio and pushes into a crossbeam channel; a single
//! consumer thread owns delivery into the session, so sample handling and
//! auto-stop ticks never interleave.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::RecvTimeoutError;
use dart_ingest_core::{channel, SampleRx, SampleSource};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::session::Session;

pub type SharedSession = Arc<Mutex<Session>>;

/// Longest the pump waits between timer checks when nothing is scheduled.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Seconds since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Spawns `src` on the current tokio runtime and pumps its samples into
/// `session` from a dedicated thread. The thread exits once the source is
/// done and no throw is left waiting for its auto-stop.
pub fn run_source<S: SampleSource + 'static>(
    src: S,
    session: SharedSession,
    clock: Clock,
) -> anyhow::Result<JoinHandle<()>> {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        if let Err(e) = src.run(tx).await {
            warn!(error = %e, "sample source stopped");
        }
    });
    thread::Builder::new()
        .name("sample-pump".into())
        .spawn(move || pump(rx, session, clock))
        .context("spawn sample pump")
}

/// Delivers samples and timer ticks into the session until the feed closes
/// and the last throw has ended.
pub fn pump(rx: SampleRx, session: SharedSession, clock: Clock) {
    loop {
        let wait = {
            let s = session.lock();
            s.next_deadline()
                .map_or(IDLE_POLL, |at| until(at, clock.now()))
        };
        match rx.recv_timeout(wait) {
            Ok(raw) => {
                let now = clock.now();
                if let Err(e) = session.lock().add_sample(&raw, now) {
                    warn!(error = %e, "sample not scored");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                session.lock().tick(clock.now());
            }
            Err(RecvTimeoutError::Disconnected) => {
                let mut s = session.lock();
                s.tick(clock.now());
                if !s.is_throw_active() {
                    debug!("feed closed, pump exiting");
                    return;
                }
                let wait = s
                    .next_deadline()
                    .map_or(Duration::ZERO, |at| until(at, clock.now()));
                drop(s);
                thread::sleep(wait);
            }
        }
    }
}

/// Time left until `deadline`, capped at [`IDLE_POLL`].
fn until(deadline: f64, now: f64) -> Duration {
    Duration::try_from_secs_f64((deadline - now).max(0.0))
        .map_or(IDLE_POLL, |d| d.min(IDLE_POLL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_is_capped_and_never_negative() {
        assert_eq!(until(1.0, 5.0), Duration::ZERO);
        assert_eq!(until(10.0, 0.0), IDLE_POLL);
        assert_eq!(until(f64::INFINITY, 0.0), IDLE_POLL);
        assert_eq!(until(0.02, 0.0), Duration::from_millis(20));
    }
}
