//! Shortest-queue routing policy.
//!
//! Routes each arrival to the server with the fewest queued requests. Ties
//! break in pool order: the first minimum wins, so the outcome is
//! deterministic.

use crate::traits::*;

/// Shortest-queue router.
pub struct ShortestQueue;

impl ShortestQueue {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShortestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingPolicy for ShortestQueue {
    fn route(&mut self, _request: &RequestInfo, servers: &[ServerSnapshot]) -> Option<u32> {
        servers.iter().min_by_key(|s| s.queue_len).map(|s| s.id)
    }

    fn name(&self) -> &'static str {
        "shortest_queue"
    }
}
