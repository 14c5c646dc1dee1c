//! Policy trait definitions.
//!
//! Routing policies implement [`RoutingPolicy`] and receive request
//! information plus server snapshots to pick a server for each arrival.
//! Scaling controllers implement [`ScalingController`] and are consulted
//! once per period with the aggregated statistics of the period that just
//! ended.

use crate::error::ControlError;
use serde::{Deserialize, Serialize};

/// Read-only snapshot of a server's state, provided to routing policies.
///
/// This is the policies crate's view of a server — only what a routing
/// decision needs, not the full simulation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub id: u32,
    /// Requests currently waiting in this server's queue.
    pub queue_len: usize,
    /// Whether the single service slot is occupied.
    pub busy: bool,
}

/// Information about an arriving request, provided to routing policies.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub id: u64,
    pub type_index: usize,
    pub service_duration: f64,
    pub tolerance_window: f64,
}

/// The routing policy capability.
///
/// The simulator calls [`route`](RoutingPolicy::route) once per arrival with
/// snapshots of every server currently accepting work, in pool order.
/// Returning `None` means no server is available and the arrival is
/// rejected (cancelled by the system).
pub trait RoutingPolicy: Send {
    fn route(&mut self, request: &RequestInfo, servers: &[ServerSnapshot]) -> Option<u32>;

    /// Human-readable name for reports.
    fn name(&self) -> &'static str;
}

/// Aggregated statistics for one reporting period.
///
/// Count series are summed over the period, duration and queue-length
/// series are averaged; an aggregate over an empty series is 0, never NaN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodContext {
    pub mean_queue_len: f64,
    pub started_waiting: f64,
    pub arrivals: f64,
    pub mean_wait_time: f64,
    pub processed: f64,
    pub mean_sojourn_time: f64,
    pub cancelled: f64,
}

impl PeriodContext {
    /// Feature row for the reward model: the seven period aggregates with
    /// the candidate server count appended last.
    pub fn to_features(&self, server_count: u32) -> Vec<f64> {
        vec![
            self.mean_queue_len,
            self.started_waiting,
            self.arrivals,
            self.mean_wait_time,
            self.processed,
            self.mean_sojourn_time,
            self.cancelled,
            server_count as f64,
        ]
    }
}

/// Outcome of one controller decision, logged by the engine.
#[derive(Debug, Clone, Copy)]
pub struct ControlDecision {
    /// Server count to apply for the next period.
    pub target_servers: u32,
    /// Reward observed for the period that just ended.
    pub reward: f64,
    /// Exploration rate in effect for this decision.
    pub exploration_rate: f64,
    /// Whether the decision was a random draw (true) or the model argmax.
    pub explored: bool,
}

/// The autoscaling controller capability.
pub trait ScalingController: Send {
    /// Called at each period boundary with the aggregates of the period
    /// that just ended and the server count that produced them. Returns the
    /// server count for the next period; errors must prevent any resize.
    fn decide(
        &mut self,
        ctx: &PeriodContext,
        current_servers: u32,
    ) -> Result<ControlDecision, ControlError>;

    fn name(&self) -> &'static str;
}
