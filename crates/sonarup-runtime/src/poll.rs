use crate::cancel::CancellationToken;
use crate::{Error, Result};
use std::time::{Duration, Instant};

/// Longest single sleep between cancellation checks.
const SLICE: Duration = Duration::from_millis(100);

/// Bounded poll schedule for eventual-consistency waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Probe until `ready` returns true, the policy's timeout elapses, or the run
/// is cancelled. The probe runs at least once. Errors from the probe abort the
/// wait; callers that expect transient failures map them to `Ok(false)`.
pub fn wait_until<F>(
    cancel: &CancellationToken,
    policy: PollPolicy,
    what: &str,
    mut ready: F,
) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        attempts += 1;
        if ready()? {
            tracing::debug!(what, attempts, elapsed_ms = start.elapsed().as_millis() as u64, "ready");
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(Error::Timeout {
                what: what.to_string(),
                waited: elapsed,
            });
        }

        let mut remaining = policy.interval.min(policy.timeout - elapsed);
        while !remaining.is_zero() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let nap = remaining.min(SLICE);
            std::thread::sleep(nap);
            remaining -= nap;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(200), Duration::from_millis(1))
    }

    #[test]
    fn test_returns_once_ready() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        wait_until(&cancel, quick(), "resource", || {
            calls += 1;
            Ok(calls >= 3)
        })
        .unwrap();
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_times_out() {
        let cancel = CancellationToken::new();
        let err = wait_until(&cancel, quick(), "server", || Ok(false)).unwrap_err();
        assert!(matches!(err, Error::Timeout { ref what, .. } if what == "server"));
    }

    #[test]
    fn test_zero_timeout_probes_once() {
        let cancel = CancellationToken::new();
        let policy = PollPolicy::new(Duration::ZERO, Duration::ZERO);
        let mut calls = 0;
        let result = wait_until(&cancel, policy, "gate", || {
            calls += 1;
            Ok(false)
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_cancellation_stops_waiting() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let policy = PollPolicy::new(Duration::from_secs(30), Duration::from_secs(10));
        let err = wait_until(&cancel, policy, "server", || {
            trigger.cancel();
            Ok(false)
        })
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_probe_error_aborts() {
        let cancel = CancellationToken::new();
        let err = wait_until(&cancel, quick(), "profile", || {
            Err(Error::remote("Failed to search profiles", Some(500), ""))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }
}
