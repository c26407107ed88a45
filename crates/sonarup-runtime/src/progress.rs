use crate::cancel::CancellationToken;
use is_terminal::IsTerminal;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TICK: Duration = Duration::from_millis(100);
/// An indicator never outlives this many ticks (30 minutes), even if nobody
/// stops it.
const MAX_TICKS: u32 = 18_000;

struct Indicator {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Cosmetic spinners for long-running steps.
///
/// At most one indicator runs per step id. Indicators share nothing with the
/// controller except their own stop flag and the run's cancellation token, so
/// the workflow never depends on them.
pub struct ProgressReporter {
    cancel: CancellationToken,
    visible: bool,
    active: Mutex<HashMap<String, Indicator>>,
}

impl ProgressReporter {
    /// Draw on stderr when it is a terminal.
    pub fn new(cancel: CancellationToken) -> Self {
        let visible = std::io::stderr().is_terminal();
        Self::with_visibility(cancel, visible)
    }

    /// Run indicator threads without drawing anything.
    pub fn hidden(cancel: CancellationToken) -> Self {
        Self::with_visibility(cancel, false)
    }

    fn with_visibility(cancel: CancellationToken, visible: bool) -> Self {
        Self {
            cancel,
            visible,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Start the indicator for `step`, replacing one that is already running.
    pub fn start(&self, step: &str, label: &str) {
        self.stop(step);

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let cancel = self.cancel.clone();
        let visible = self.visible;
        let label = label.to_string();

        let spawned = std::thread::Builder::new()
            .name(format!("progress-{}", step))
            .spawn(move || spin(&label, visible, &thread_stop, &cancel));

        match spawned {
            Ok(handle) => {
                self.lock().insert(step.to_string(), Indicator { stop, handle });
            }
            Err(err) => {
                tracing::warn!(step, error = %err, "could not start progress indicator");
            }
        }
    }

    /// Stop the indicator for `step`. No-op when none is running.
    pub fn stop(&self, step: &str) {
        let indicator = self.lock().remove(step);
        if let Some(indicator) = indicator {
            finish(indicator);
        }
    }

    /// Stop every running indicator.
    pub fn stop_all(&self) {
        let drained: Vec<Indicator> = self.lock().drain().map(|(_, v)| v).collect();
        for indicator in drained {
            finish(indicator);
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_active(&self, step: &str) -> bool {
        self.lock().contains_key(step)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Indicator>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn finish(indicator: Indicator) {
    indicator.stop.store(true, Ordering::SeqCst);
    let _ = indicator.handle.join();
}

fn spin(label: &str, visible: bool, stop: &AtomicBool, cancel: &CancellationToken) {
    let mut stderr = std::io::stderr();
    let mut ticks = 0u32;

    while ticks < MAX_TICKS && !stop.load(Ordering::SeqCst) && !cancel.is_cancelled() {
        if visible {
            let frame = FRAMES[(ticks as usize) % FRAMES.len()];
            let _ = write!(stderr, "\r{} {}", frame, label);
            let _ = stderr.flush();
        }
        std::thread::sleep(TICK);
        ticks += 1;
    }

    if visible {
        let _ = write!(stderr, "\r\x1b[2K");
        let _ = stderr.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_start_and_stop() {
        let progress = ProgressReporter::hidden(CancellationToken::new());
        progress.start("gate", "Configuring quality gate");
        assert!(progress.is_active("gate"));

        progress.stop("gate");
        assert!(!progress.is_active("gate"));
        assert_eq!(progress.active_count(), 0);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let progress = ProgressReporter::hidden(CancellationToken::new());
        progress.stop("never-started");
        progress.stop("never-started");
        assert_eq!(progress.active_count(), 0);
    }

    #[test]
    fn test_restart_keeps_single_handle() {
        let progress = ProgressReporter::hidden(CancellationToken::new());
        progress.start("profile", "one");
        progress.start("profile", "two");
        assert_eq!(progress.active_count(), 1);
        progress.stop_all();
        assert_eq!(progress.active_count(), 0);
    }

    #[test]
    fn test_cancellation_ends_indicator_threads() {
        let cancel = CancellationToken::new();
        let progress = ProgressReporter::hidden(cancel.clone());
        progress.start("a", "a");
        progress.start("b", "b");

        cancel.cancel();
        let started = Instant::now();
        progress.stop_all();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(progress.active_count(), 0);
    }
}
