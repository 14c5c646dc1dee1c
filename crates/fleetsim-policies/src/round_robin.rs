//! Round-robin routing policy.
//!
//! The simplest strategy: distributes arrivals evenly across the pool in a
//! circular fashion. Good fairness, ignores queue state.

use crate::traits::*;

/// Round-robin router.
///
/// Keeps a positional cursor into the pool. A pool resize can leave the
/// cursor out of range; it is reset to 0 before use, so the rotation
/// restarts cleanly instead of indexing past the pool.
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingPolicy for RoundRobin {
    fn route(&mut self, _request: &RequestInfo, servers: &[ServerSnapshot]) -> Option<u32> {
        if servers.is_empty() {
            return None;
        }
        if self.cursor >= servers.len() {
            self.cursor = 0;
        }
        let chosen = servers[self.cursor].id;
        self.cursor += 1;
        Some(chosen)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{dummy_request, make_servers};

    #[test]
    fn test_distributes_evenly() {
        let mut rr = RoundRobin::new();
        let servers = make_servers(4);

        let mut counts = [0u32; 4];
        for _ in 0..100 {
            let id = rr.route(&dummy_request(), &servers).expect("route");
            counts[id as usize] += 1;
        }
        assert_eq!(counts, [25, 25, 25, 25]);
    }

    #[test]
    fn test_rejects_empty_pool() {
        let mut rr = RoundRobin::new();
        assert!(rr.route(&dummy_request(), &[]).is_none());
    }

    #[test]
    fn test_cursor_resets_after_shrink() {
        let mut rr = RoundRobin::new();
        let four = make_servers(4);
        for _ in 0..3 {
            rr.route(&dummy_request(), &four);
        }
        // Pool shrinks to 2; cursor is at 3 and must reset to 0.
        let two = make_servers(2);
        assert_eq!(rr.route(&dummy_request(), &two), Some(0));
        assert_eq!(rr.route(&dummy_request(), &two), Some(1));
        assert_eq!(rr.route(&dummy_request(), &two), Some(0));
    }
}
