//! Per-segment status and attempt bookkeeping for one transfer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentStatus {
    Pending,
    Inflight,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    status: SegmentStatus,
    attempts: u32,
    /// Bytes of this segment already counted by the progress aggregator.
    reported: u64,
}

/// Status table indexed by segment index. Not synchronized itself; the worker
/// pool keeps it behind one mutex and only touches it on state transitions.
#[derive(Debug, Clone)]
pub struct SegmentTable {
    slots: Vec<Slot>,
}

impl SegmentTable {
    pub fn new(segment_count: usize) -> Self {
        Self {
            slots: vec![
                Slot {
                    status: SegmentStatus::Pending,
                    attempts: 0,
                    reported: 0,
                };
                segment_count
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn reported(&self, index: usize) -> u64 {
        self.slots[index].reported
    }

    pub fn set_reported(&mut self, index: usize, bytes: u64) {
        let slot = &mut self.slots[index];
        slot.reported = slot.reported.max(bytes);
    }

    pub fn mark_inflight(&mut self, index: usize) {
        self.slots[index].status = SegmentStatus::Inflight;
    }

    pub fn mark_pending(&mut self, index: usize) {
        self.slots[index].status = SegmentStatus::Pending;
    }

    pub fn mark_done(&mut self, index: usize) {
        self.slots[index].status = SegmentStatus::Done;
    }

    pub fn mark_failed(&mut self, index: usize) {
        self.slots[index].status = SegmentStatus::Failed;
    }

    /// Count a failed attempt; returns the attempt number that just failed (1-based).
    pub fn record_failure(&mut self, index: usize) -> u32 {
        let slot = &mut self.slots[index];
        slot.attempts += 1;
        slot.attempts
    }

    /// Segments that exhausted their retry budget (the dead-letter list).
    pub fn failed(&self) -> Vec<usize> {
        self.indices_with(SegmentStatus::Failed)
    }

    pub fn done_count(&self) -> usize {
        self.indices_with(SegmentStatus::Done).len()
    }

    pub fn all_done(&self) -> bool {
        self.slots.iter().all(|s| s.status == SegmentStatus::Done)
    }

    /// Total failed attempts across all segments.
    pub fn total_retries(&self) -> u32 {
        self.slots.iter().map(|s| s.attempts).sum()
    }

    fn indices_with(&self, status: SegmentStatus) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status == status)
            .map(|(i, _)| i)
            .collect()
    }
}
