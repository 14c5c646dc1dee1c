//! The load balancer: server pool plus pluggable routing and scaling.
//!
//! Routing and autoscaling are capabilities composed in, not subclasses:
//! the balancer owns a boxed [`RoutingPolicy`] and, optionally, a boxed
//! [`ScalingController`]. Policies only ever see snapshots of the servers
//! that currently accept work.
//!
//! A shrink never discards in-flight work. Surplus servers are marked
//! `Draining`: they take no new arrivals, finish their backlog, and are
//! reaped from the pool once empty. A later grow reactivates draining
//! servers before constructing new ones.

use crate::error::SimError;
use crate::request::Request;
use crate::server::{Server, ServerState};
use fleetsim_policies::{
    ControlDecision, PeriodContext, RoutingPolicy, ScalingController, ServerSnapshot,
};

pub struct LoadBalancer {
    servers: Vec<Server>,
    policy: Box<dyn RoutingPolicy>,
    controller: Option<Box<dyn ScalingController>>,
    queue_capacity: Option<usize>,
    next_server_id: u32,
}

impl LoadBalancer {
    pub fn new(
        num_servers: u32,
        queue_capacity: Option<usize>,
        policy: Box<dyn RoutingPolicy>,
        controller: Option<Box<dyn ScalingController>>,
    ) -> Self {
        let servers = (0..num_servers)
            .map(|id| Server::new(id, queue_capacity))
            .collect();
        Self {
            servers,
            policy,
            controller,
            queue_capacity,
            next_server_id: num_servers,
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn has_controller(&self) -> bool {
        self.controller.is_some()
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// Servers currently accepting arrivals.
    pub fn active_count(&self) -> u32 {
        self.servers
            .iter()
            .filter(|s| s.state == ServerState::Active)
            .count() as u32
    }

    /// Total pool size, draining servers included.
    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Fleet-wide number of requests waiting in queues.
    pub fn total_queued(&self) -> usize {
        self.servers.iter().map(|s| s.queue.len()).sum()
    }

    /// Ask the routing policy for a server. Only active servers are
    /// offered; `None` means the arrival has nowhere to go.
    pub fn route(&mut self, request: &Request) -> Option<u32> {
        let snapshots: Vec<ServerSnapshot> = self
            .servers
            .iter()
            .filter(|s| s.state == ServerState::Active)
            .map(|s| s.snapshot())
            .collect();
        self.policy.route(&request.to_info(), &snapshots)
    }

    pub fn server_mut(&mut self, id: u32) -> Option<&mut Server> {
        self.servers.iter_mut().find(|s| s.id == id)
    }

    /// Grow or shrink the active pool to `target` servers.
    pub fn resize(&mut self, target: u32) {
        let active = self.active_count();
        if target > active {
            let mut needed = target - active;
            for server in self.servers.iter_mut() {
                if needed == 0 {
                    break;
                }
                if server.state == ServerState::Draining {
                    server.state = ServerState::Active;
                    needed -= 1;
                }
            }
            for _ in 0..needed {
                let id = self.next_server_id;
                self.next_server_id += 1;
                self.servers.push(Server::new(id, self.queue_capacity));
            }
        } else if target < active {
            let mut surplus = active - target;
            for server in self.servers.iter_mut().rev() {
                if surplus == 0 {
                    break;
                }
                if server.state == ServerState::Active {
                    server.state = ServerState::Draining;
                    surplus -= 1;
                }
            }
        }
    }

    /// Drop draining servers whose backlog is gone.
    pub fn reap_drained(&mut self) {
        self.servers
            .retain(|s| s.state == ServerState::Active || !s.drained());
    }

    /// Run the scaling controller (if any) against the finished period and
    /// apply its verdict. A controller error leaves the pool untouched.
    pub fn rescale(&mut self, ctx: &PeriodContext) -> Result<Option<ControlDecision>, SimError> {
        let active = self.active_count();
        let Some(controller) = self.controller.as_mut() else {
            return Ok(None);
        };
        let decision = controller.decide(ctx, active)?;
        self.resize(decision.target_servers);
        self.reap_drained();
        Ok(Some(decision))
    }
}
