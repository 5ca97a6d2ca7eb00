use crate::error::ScanError;
use crate::resolve::ScanResult;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// One message on the scan channel. A scan sends any number of
/// `Progress` values followed by exactly one `Done` or `Failed`.
#[derive(Debug)]
pub enum ScanEvent {
    Progress(f64),
    Done(ScanResult),
    Failed(ScanError),
}

impl ScanEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanEvent::Progress(_))
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    hash_total: usize,
    hashed: usize,
    bucket_total: usize,
    clustered: usize,
    clustering: bool,
    last: f64,
    finished: bool,
}

impl ProgressState {
    /// Hashing covers [0, 0.5), clustering [0.5, 1.0].
    fn fraction(&self) -> f64 {
        if self.clustering {
            if self.bucket_total == 0 {
                1.0
            } else {
                0.5 + 0.5 * self.clustered as f64 / self.bucket_total as f64
            }
        } else if self.hash_total == 0 {
            0.0
        } else {
            0.5 * self.hashed as f64 / self.hash_total as f64
        }
    }
}

/// Turns phase counters into a non-decreasing fraction and forwards it,
/// plus the terminal event, to the single consumer. Safe to call from
/// the hashing pool.
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<ScanEvent>>,
    state: Mutex<ProgressState>,
}

impl ProgressReporter {
    pub fn new(sender: mpsc::UnboundedSender<ScanEvent>) -> Self {
        Self {
            sender: Some(sender),
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// A reporter with no consumer; counters are still tracked.
    pub fn detached() -> Self {
        Self {
            sender: None,
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn start_hashing(&self, total: usize) {
        self.update(|s| {
            s.hash_total = total;
            s.hashed = 0;
        });
    }

    pub fn hashed_one(&self) {
        self.update(|s| s.hashed += 1);
    }

    pub fn start_clustering(&self, buckets: usize) {
        self.update(|s| {
            s.clustering = true;
            s.bucket_total = buckets;
            s.clustered = 0;
        });
    }

    pub fn clustered_one(&self) {
        self.update(|s| s.clustered += 1);
    }

    /// Last fraction handed to the consumer.
    pub fn last_fraction(&self) -> f64 {
        self.lock().last
    }

    /// Send the final `1.0` and the result. Later terminal calls are ignored.
    pub fn done(&self, result: ScanResult) {
        let mut state = self.lock();
        if state.finished {
            return;
        }
        state.finished = true;
        if state.last < 1.0 {
            state.last = 1.0;
            self.send(ScanEvent::Progress(1.0));
        }
        self.send(ScanEvent::Done(result));
    }

    pub fn failed(&self, error: ScanError) {
        let mut state = self.lock();
        if state.finished {
            return;
        }
        state.finished = true;
        self.send(ScanEvent::Failed(error));
    }

    fn update(&self, change: impl FnOnce(&mut ProgressState)) {
        let mut state = self.lock();
        if state.finished {
            return;
        }
        change(&mut state);
        let fraction = state.fraction().clamp(0.0, 1.0);
        if fraction > state.last {
            state.last = fraction;
            self.send(ScanEvent::Progress(fraction));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressState> {
        // A poisoned lock only means a hashing thread panicked mid-update;
        // the counters are still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, event: ScanEvent) {
        if let Some(sender) = &self.sender {
            // Consumer gone means nobody is listening; keep scanning.
            let _ = sender.send(event);
        }
    }
}
