//! Scheduled events and their ordering.
//!
//! The engine keeps a `BinaryHeap` of [`ScheduledEvent`]s. Ordering is by
//! execution time, then priority (lower runs first), then insertion
//! sequence, so ties resolve deterministically. Completions carry a lower
//! priority number than timeouts: a service completion and a cancellation
//! timeout landing on the same instant resolve in the request's favor.

use crate::error::SimError;
use crate::request::Request;

/// Priority for service-completion events.
pub const PRIORITY_COMPLETION: u8 = 2;
/// Priority for everything else.
pub const PRIORITY_DEFAULT: u8 = 9;

/// Actions the engine dispatches when an event fires.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// A request enters the system.
    Arrival(Request),
    /// A request's tolerance window expires.
    CancelTimeout { request_id: u64 },
    /// A server finishes its in-service request.
    ServiceComplete { request_id: u64 },
    /// The arrival source wakes up to emit arrivals and re-arm itself.
    SourceTick,
    /// A control period ends: run the controller, apply the rate schedule.
    PeriodEnd,
}

/// A timestamped event in the simulation's priority queue.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    pub time: f64,
    pub priority: u8,
    sequence: u64,
    /// Short name for diagnostics and error messages.
    pub label: &'static str,
    action: SimEvent,
    triggered: bool,
}

impl ScheduledEvent {
    pub(crate) fn new(
        time: f64,
        priority: u8,
        sequence: u64,
        label: &'static str,
        action: SimEvent,
    ) -> Self {
        Self {
            time,
            priority,
            sequence,
            label,
            action,
            triggered: false,
        }
    }

    /// Consume the event's action. An event fires at most once; a second
    /// fire is an engine bug and surfaces as an error rather than re-running
    /// the action.
    pub fn fire(&mut self) -> Result<SimEvent, SimError> {
        if self.triggered {
            return Err(SimError::AlreadyTriggered {
                label: self.label,
                time: self.time,
            });
        }
        self.triggered = true;
        Ok(self.action.clone())
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want min-heap
        other
            .time
            .total_cmp(&self.time)
            .then(other.priority.cmp(&self.priority))
            .then(other.sequence.cmp(&self.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn event(time: f64, priority: u8, sequence: u64) -> ScheduledEvent {
        ScheduledEvent::new(time, priority, sequence, "test", SimEvent::PeriodEnd)
    }

    #[test]
    fn test_heap_orders_by_time() {
        let mut heap = BinaryHeap::new();
        heap.push(event(3.0, PRIORITY_DEFAULT, 0));
        heap.push(event(1.0, PRIORITY_DEFAULT, 1));
        heap.push(event(2.0, PRIORITY_DEFAULT, 2));

        let times: Vec<f64> = std::iter::from_fn(|| heap.pop().map(|e| e.time)).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_same_time_lower_priority_number_first() {
        let mut heap = BinaryHeap::new();
        heap.push(event(5.0, PRIORITY_DEFAULT, 0));
        heap.push(event(5.0, PRIORITY_COMPLETION, 1));

        assert_eq!(heap.pop().map(|e| e.priority), Some(PRIORITY_COMPLETION));
        assert_eq!(heap.pop().map(|e| e.priority), Some(PRIORITY_DEFAULT));
    }

    #[test]
    fn test_equal_keys_fall_back_to_insertion_order() {
        let mut heap = BinaryHeap::new();
        for seq in 0..5 {
            heap.push(event(1.0, PRIORITY_DEFAULT, seq));
        }
        let seqs: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.sequence)).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_fire_consumes_exactly_once() {
        let mut e = event(1.0, PRIORITY_DEFAULT, 0);
        assert!(e.fire().is_ok());
        assert!(matches!(
            e.fire(),
            Err(SimError::AlreadyTriggered { label: "test", .. })
        ));
    }
}
