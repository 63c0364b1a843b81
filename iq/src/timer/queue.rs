//! Binary-heap timer queue

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use tracing::debug;

use super::{Fired, Pacing, Timer, TimerDriver, TimerEvent, TimerHandle};

/// Default frame period (~60Hz)
pub const DEFAULT_FRAME_PERIOD_MS: u64 = 16;

/// An armed timer
#[derive(Debug)]
struct Entry {
    deadline: u64,
    handle: TimerHandle,
    event: TimerEvent,
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest deadline first, then earliest armed (handles are sequential)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.handle.cmp(&self.handle))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Timer primitive backed by a min-heap of deadlines
///
/// Cancellation is lazy: cancelled entries stay in the heap until they reach
/// the top, but the top of the heap is always a live timer.
#[derive(Debug)]
pub struct TimerQueue {
    heap: BinaryHeap<Entry>,
    live: HashSet<TimerHandle>,
    next_id: u64,
    frame_period_ms: Option<u64>,
}

impl TimerQueue {
    /// Queue that honours frame pacing with the default frame period
    pub fn new() -> Self {
        Self::with_frame_period(Some(DEFAULT_FRAME_PERIOD_MS))
    }

    /// Queue with an explicit frame period; `None` (or zero) disables frame pacing
    pub fn with_frame_period(frame_period_ms: Option<u64>) -> Self {
        debug!(?frame_period_ms, "TimerQueue::with_frame_period: called");
        Self {
            heap: BinaryHeap::new(),
            live: HashSet::new(),
            next_id: 0,
            frame_period_ms: frame_period_ms.filter(|p| *p > 0),
        }
    }

    /// Queue without frame pacing
    pub fn fixed_only() -> Self {
        Self::with_frame_period(None)
    }

    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.live.contains(&handle)
    }

    fn deadline_for(&self, now_ms: u64, delay_ms: u64, pacing: Pacing) -> u64 {
        let target = now_ms.saturating_add(delay_ms);
        match (pacing, self.frame_period_ms) {
            (Pacing::Frame, Some(period)) => target.div_ceil(period).saturating_mul(period),
            _ => target,
        }
    }

    /// Drop cancelled entries sitting on top of the heap
    fn purge(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.live.contains(&top.handle) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for TimerQueue {
    fn schedule(&mut self, now_ms: u64, delay_ms: u64, pacing: Pacing, event: TimerEvent) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        let deadline = self.deadline_for(now_ms, delay_ms, pacing);
        debug!(%handle, now_ms, delay_ms, ?pacing, deadline, ?event, "TimerQueue::schedule: called");
        self.live.insert(handle);
        self.heap.push(Entry {
            deadline,
            handle,
            event,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let removed = self.live.remove(&handle);
        debug!(%handle, removed, "TimerQueue::cancel: called");
        self.purge();
        removed
    }

    fn supports_frame_pacing(&self) -> bool {
        self.frame_period_ms.is_some()
    }
}

impl TimerDriver for TimerQueue {
    fn pop_due(&mut self, now_ms: u64) -> Option<Fired> {
        self.purge();
        if self.heap.peek().is_none_or(|top| top.deadline > now_ms) {
            return None;
        }
        let entry = self.heap.pop()?;
        self.live.remove(&entry.handle);
        self.purge();
        debug!(handle = %entry.handle, deadline = entry.deadline, now_ms, "TimerQueue::pop_due: fired");
        Some(Fired {
            handle: entry.handle,
            deadline: entry.deadline,
            event: entry.event,
        })
    }

    fn next_deadline(&self) -> Option<u64> {
        self.heap.peek().map(|top| top.deadline)
    }

    fn armed(&self) -> usize {
        self.live.len()
    }
}
