//! Host-side wait for the page completion flag
//!
//! The page has no callback channel back to the host, so completion is a
//! poll with a fixed interval and an overall deadline.

use crate::{Error, Result};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag that aborts an in-flight wait
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Poll loop bounded by an interval and a deadline
#[derive(Debug, Clone)]
pub struct CompletionWatch {
    pub interval: Duration,
    pub timeout: Duration,
    pub cancel: CancelToken,
}

impl CompletionWatch {
    pub fn new(interval: Duration, timeout: Duration, cancel: CancelToken) -> Self {
        Self { interval, timeout, cancel }
    }

    /// Run `probe` until it reports `true`, returning the time waited.
    ///
    /// The probe runs at least once even with a zero timeout. A probe error
    /// aborts the wait immediately.
    pub fn wait<F>(&self, mut probe: F) -> Result<Duration>
    where
        F: FnMut() -> Result<bool>,
    {
        let start = Instant::now();
        let mut polls = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            polls += 1;
            if probe()? {
                debug!("completion observed after {} polls", polls);
                return Ok(start.elapsed());
            }
            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(Error::RenderTimeout(self.timeout.as_millis() as u64));
            }
            std::thread::sleep(self.interval.min(self.timeout - elapsed));
        }
    }

    /// Sleep for `duration` in interval-sized slices, stopping early if the
    /// token is cancelled.
    pub fn settle(&self, duration: Duration) -> Result<()> {
        let slice = if self.interval.is_zero() {
            duration
        } else {
            self.interval
        };
        let deadline = Instant::now() + duration;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(slice.min(deadline - now));
        }
    }
}
