//! Shared FIFO of segment indices consumed by the worker pool.
//!
//! Tracks how many pulled segments are still in flight so a worker with an
//! empty queue waits for possible requeues instead of exiting early. The pool
//! is drained once the queue is empty and nothing is in flight, or closed.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<usize>,
    in_flight: usize,
    closed: bool,
}

#[derive(Debug, Default)]
pub(super) struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub(super) fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: indices.into_iter().collect(),
                in_flight: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Next index to work on, or `None` once drained or closed.
    pub(super) async fn pull(&self) -> Option<usize> {
        loop {
            // Register before checking so a wakeup between check and await is not lost.
            let notified = self.notify.notified();
            {
                let mut st = self.lock();
                if st.closed {
                    return None;
                }
                if let Some(index) = st.pending.pop_front() {
                    st.in_flight += 1;
                    return Some(index);
                }
                if st.in_flight == 0 {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// A pulled segment reached a terminal state.
    pub(super) fn complete(&self) {
        let drained = {
            let mut st = self.lock();
            st.in_flight = st.in_flight.saturating_sub(1);
            st.in_flight == 0 && st.pending.is_empty()
        };
        if drained {
            self.notify.notify_waiters();
        }
    }

    /// Put a pulled segment back at the tail for another attempt.
    pub(super) fn requeue(&self, index: usize) {
        {
            let mut st = self.lock();
            st.in_flight = st.in_flight.saturating_sub(1);
            if !st.closed {
                st.pending.push_back(index);
            }
        }
        self.notify.notify_waiters();
    }

    /// Stop dispatching: pending indices are dropped, waiting workers exit.
    pub(super) fn close(&self) {
        {
            let mut st = self.lock();
            st.closed = true;
            st.pending.clear();
        }
        self.notify.notify_waiters();
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
