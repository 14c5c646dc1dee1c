//! Request model and lifecycle.
//!
//! Each [`Request`] moves through `Waiting -> InService -> Processed`, with
//! `Cancelled` reachable from either non-terminal state when the client's
//! tolerance window expires (or the system rejects the request outright).
//! Both terminal states are final: lifecycle methods on a terminal request
//! do nothing, which is what makes always-firing timeout events safe.

use crate::error::SimError;
use fleetsim_policies::RequestInfo;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Waiting,
    InService,
    Processed,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Cancelled)
    }
}

/// A single request flowing through the simulated fleet.
#[derive(Debug, Clone)]
pub struct Request {
    /// Unique request identifier.
    pub id: u64,
    /// Index of the request type that generated this request.
    pub type_index: usize,
    /// Service time once a server slot is obtained, in seconds.
    pub service_duration: f64,
    /// How long the client will wait before giving up, in seconds.
    pub tolerance_window: f64,
    pub state: RequestState,
    /// Server holding this request, by id. Requests rejected at admission
    /// never get one.
    pub assigned_server: Option<u32>,
    /// When this request entered the system and started waiting.
    waiting_since: Option<f64>,
    /// Time spent waiting before service started.
    pub total_wait_time: f64,
    /// Arrival-to-completion time, set when processed.
    pub total_sojourn_time: f64,
}

impl Request {
    pub fn new(
        id: u64,
        type_index: usize,
        service_duration: f64,
        tolerance_window: f64,
    ) -> Result<Self, SimError> {
        if service_duration < 0.0 {
            return Err(SimError::NegativeServiceDuration {
                id,
                duration: service_duration,
            });
        }
        Ok(Self {
            id,
            type_index,
            service_duration,
            tolerance_window,
            state: RequestState::Waiting,
            assigned_server: None,
            waiting_since: None,
            total_wait_time: 0.0,
            total_sojourn_time: 0.0,
        })
    }

    /// Mark the start of the waiting interval (arrival time).
    pub fn begin_waiting(&mut self, now: f64) {
        self.waiting_since = Some(now);
    }

    /// Transition to `InService`, returning the wait duration.
    ///
    /// No-op (returning `None`) unless the request is still waiting.
    pub fn begin_service(&mut self, now: f64) -> Option<f64> {
        if self.state != RequestState::Waiting {
            return None;
        }
        let wait = now - self.waiting_since.unwrap_or(now);
        self.total_wait_time = wait;
        self.state = RequestState::InService;
        Some(wait)
    }

    /// Transition to `Processed`, returning the arrival-to-completion time.
    ///
    /// No-op unless the request is in service.
    pub fn complete(&mut self, now: f64) -> Option<f64> {
        if self.state != RequestState::InService {
            return None;
        }
        let sojourn = now - self.waiting_since.unwrap_or(now);
        self.total_sojourn_time = sojourn;
        self.state = RequestState::Processed;
        Some(sojourn)
    }

    /// Transition to `Cancelled`. No-op once terminal.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = RequestState::Cancelled;
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The routing-policy view of this request.
    pub fn to_info(&self) -> RequestInfo {
        RequestInfo {
            id: self.id,
            type_index: self.type_index,
            service_duration: self.service_duration,
            tolerance_window: self.tolerance_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_service_duration_rejected() {
        let err = Request::new(1, 0, -0.5, 10.0);
        assert!(matches!(
            err,
            Err(SimError::NegativeServiceDuration { id: 1, .. })
        ));
    }

    #[test]
    fn test_processed_lifecycle_times() {
        let mut req = Request::new(1, 0, 2.0, 10.0).unwrap();
        req.begin_waiting(5.0);
        assert_eq!(req.begin_service(6.5), Some(1.5));
        assert_eq!(req.state, RequestState::InService);
        assert_eq!(req.complete(8.5), Some(3.5));
        assert_eq!(req.state, RequestState::Processed);
        assert_eq!(req.total_wait_time, 1.5);
        assert_eq!(req.total_sojourn_time, 3.5);
    }

    #[test]
    fn test_wait_plus_service_equals_sojourn() {
        let mut req = Request::new(2, 0, 4.0, 100.0).unwrap();
        req.begin_waiting(0.0);
        let wait = req.begin_service(3.0).unwrap();
        let sojourn = req.complete(3.0 + req.service_duration).unwrap();
        assert!((wait + req.service_duration - sojourn).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_from_waiting() {
        let mut req = Request::new(3, 0, 1.0, 0.5).unwrap();
        req.begin_waiting(0.0);
        assert!(req.cancel());
        assert_eq!(req.state, RequestState::Cancelled);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut req = Request::new(4, 0, 1.0, 10.0).unwrap();
        req.begin_waiting(0.0);
        req.begin_service(0.0);
        req.complete(1.0);

        // Late timeout: no state change, no time rewritten.
        assert!(!req.cancel());
        assert_eq!(req.state, RequestState::Processed);
        assert_eq!(req.begin_service(2.0), None);
        assert_eq!(req.complete(2.0), None);

        let mut cancelled = Request::new(5, 0, 1.0, 0.0).unwrap();
        cancelled.begin_waiting(0.0);
        cancelled.cancel();
        assert_eq!(cancelled.begin_service(1.0), None);
        assert!(!cancelled.cancel());
    }
}
