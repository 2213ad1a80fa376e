//! ListLocator: waits for the comment list container to exist
//!
//! The container has no stable id, so the probe finds a marker control by its
//! accessible label and climbs a fixed number of parents. The probe runs on a
//! retry schedule until it hits, the attempt budget runs out, or the cycle that
//! asked for it is superseded.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use crate::config::RetryPolicy;

// =============================================================================
// Clock seam
// =============================================================================

/// Something that can wait. Injected so tests need no real timers.
pub trait Sleeper {
    type Sleep: Future<Output = ()>;

    fn sleep(&self, ms: u32) -> Self::Sleep;
}

/// Browser timer backed sleeper
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerSleeper;

impl Sleeper for TimerSleeper {
    type Sleep = gloo_timers::future::TimeoutFuture;

    fn sleep(&self, ms: u32) -> Self::Sleep {
        gloo_timers::future::TimeoutFuture::new(ms)
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Shared flag a newer cycle flips to stop an older cycle's poll
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<T> {
    pub container: T,
    /// Probes it took, including the successful one
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateError {
    /// A newer cycle took over
    Cancelled { attempts: u32 },
    /// `max_attempts` probes all missed
    Exhausted { attempts: u32 },
}

impl fmt::Display for LocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled { attempts } => {
                write!(f, "comment list lookup cancelled after {} probes", attempts)
            }
            Self::Exhausted { attempts } => {
                write!(f, "comment list not found after {} probes", attempts)
            }
        }
    }
}

// =============================================================================
// Locate
// =============================================================================

/// Poll `probe` until it yields a container.
///
/// Each probe is preceded by a sleep, matching an interval timer: the first
/// look happens one interval after the call.
pub async fn locate<T, P, S>(
    probe: P,
    sleeper: &S,
    policy: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<Located<T>, LocateError>
where
    P: Fn() -> Option<T>,
    S: Sleeper + ?Sized,
{
    let mut attempts: u32 = 0;
    loop {
        if let Some(limit) = policy.max_attempts {
            if attempts >= limit {
                return Err(LocateError::Exhausted { attempts });
            }
        }

        sleeper.sleep(policy.delay_for(attempts)).await;

        if cancel.is_cancelled() {
            return Err(LocateError::Cancelled { attempts });
        }

        attempts = attempts.saturating_add(1);
        if let Some(container) = probe() {
            return Ok(Located { container, attempts });
        }
    }
}
