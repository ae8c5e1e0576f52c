//! Shared byte counter with rate-limited reporting.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::stats::{ProgressPhase, ProgressStats};

/// Minimum spacing between two emitted snapshots.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(400);

#[derive(Debug)]
struct ProgressState {
    bytes_done: u64,
    start: Instant,
    last_report: Option<Instant>,
    final_sent: bool,
}

/// Thread-safe progress counter for one transfer phase.
///
/// `update` may be called concurrently from every worker. The count is an
/// exact sum of reported bytes, clamped to `total`, and never decreases.
/// Emission happens outside the lock with a non-blocking `try_send`.
#[derive(Debug)]
pub struct ProgressAggregator {
    phase: ProgressPhase,
    total: u64,
    interval: Duration,
    state: Mutex<ProgressState>,
    sink: Option<tokio::sync::mpsc::Sender<ProgressStats>>,
}

impl ProgressAggregator {
    pub fn new(
        phase: ProgressPhase,
        total: u64,
        interval: Duration,
        sink: Option<tokio::sync::mpsc::Sender<ProgressStats>>,
    ) -> Self {
        Self {
            phase,
            total,
            interval,
            state: Mutex::new(ProgressState {
                bytes_done: 0,
                start: Instant::now(),
                last_report: None,
                final_sent: false,
            }),
            sink,
        }
    }

    pub fn bytes_done(&self) -> u64 {
        self.lock().bytes_done
    }

    /// Add `delta` delivered bytes. Returns the snapshot if one was emitted.
    pub fn update(&self, delta: u64) -> Option<ProgressStats> {
        let snapshot = {
            let mut st = self.lock();
            st.bytes_done = st.bytes_done.saturating_add(delta).min(self.total);
            self.take_snapshot(&mut st)
        };
        self.emit(snapshot)
    }

    /// Move the counter to an absolute position (e.g. an upload ack). Values
    /// below the current count are ignored so the counter stays monotonic.
    pub fn advance_to(&self, bytes: u64) -> Option<ProgressStats> {
        let snapshot = {
            let mut st = self.lock();
            st.bytes_done = st.bytes_done.max(bytes.min(self.total));
            self.take_snapshot(&mut st)
        };
        self.emit(snapshot)
    }

    fn take_snapshot(&self, st: &mut ProgressState) -> Option<ProgressStats> {
        let now = Instant::now();
        let reached_total = st.bytes_done >= self.total;
        let due = st
            .last_report
            .map(|t| now.duration_since(t) >= self.interval)
            .unwrap_or(true);
        if reached_total {
            if st.final_sent {
                return None;
            }
            st.final_sent = true;
        } else if !due {
            return None;
        }
        st.last_report = Some(now);
        Some(self.stats(st))
    }

    fn stats(&self, st: &ProgressState) -> ProgressStats {
        ProgressStats {
            phase: self.phase,
            bytes_done: st.bytes_done,
            total_bytes: self.total,
            elapsed_secs: st.start.elapsed().as_secs_f64(),
        }
    }

    fn emit(&self, snapshot: Option<ProgressStats>) -> Option<ProgressStats> {
        let snapshot = snapshot?;
        if let Some(tx) = &self.sink {
            let _ = tx.try_send(snapshot.clone());
        }
        Some(snapshot)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
