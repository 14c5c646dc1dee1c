//! Servers and their request queues.
//!
//! A [`Server`] has a single service slot plus a FIFO queue. The queue is
//! identity-indexed: cancellation timeouts must remove a specific request
//! from the middle of the line, so a plain ring buffer is not enough. Order
//! comes from a monotone admission sequence in a `BTreeMap`, identity from a
//! companion `HashMap`.
//!
//! Servers hold request *ids* only. The engine owns the request table and
//! resolves ids when lifecycle transitions happen.

use crate::error::SimError;
use fleetsim_policies::ServerSnapshot;
use std::collections::{BTreeMap, HashMap};

pub type RequestId = u64;

/// Insertion-ordered, identity-indexed request queue with an optional
/// capacity bound.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    /// Owning server, for error reporting.
    server: u32,
    capacity: Option<usize>,
    next_seq: u64,
    order: BTreeMap<u64, RequestId>,
    index: HashMap<RequestId, u64>,
}

impl RequestQueue {
    pub fn new(server: u32, capacity: Option<usize>) -> Self {
        Self {
            server,
            capacity,
            next_seq: 0,
            order: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.index.contains_key(&id)
    }

    /// Admit a request at the back. Returns `false` when the queue is at
    /// capacity; the caller cancels the request in that case.
    pub fn push(&mut self, id: RequestId) -> bool {
        if let Some(cap) = self.capacity {
            if self.order.len() >= cap {
                return false;
            }
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, id);
        self.index.insert(id, seq);
        true
    }

    /// Take the oldest request. An empty pull is an engine bug.
    pub fn pull(&mut self) -> Result<RequestId, SimError> {
        let (&seq, &id) = self
            .order
            .iter()
            .next()
            .ok_or(SimError::EmptyQueue {
                server: self.server,
            })?;
        self.order.remove(&seq);
        self.index.remove(&id);
        Ok(id)
    }

    /// Remove a specific request, wherever it sits in line. Returns `false`
    /// when the id is not queued here.
    pub fn remove(&mut self, id: RequestId) -> bool {
        match self.index.remove(&id) {
            Some(seq) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }
}

/// Whether a server accepts new arrivals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Active,
    /// Marked for removal by a pool shrink: finishes its backlog, takes no
    /// new arrivals, and is reaped once empty.
    Draining,
}

/// Where `assign` put a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The service slot was free; service starts now.
    Started,
    /// Admitted to the queue.
    Queued,
    /// The queue is full; the request is cancelled by the system.
    QueueFull,
}

/// Where `cancel` found a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelLocation {
    /// It occupied the service slot; `next` is the request promoted from
    /// the queue, if any.
    InService { next: Option<RequestId> },
    /// It was waiting in the queue.
    Dequeued,
    NotFound,
}

/// A single-slot server with a bounded FIFO queue.
#[derive(Debug, Clone)]
pub struct Server {
    pub id: u32,
    pub queue: RequestQueue,
    pub in_service: Option<RequestId>,
    pub state: ServerState,
}

impl Server {
    pub fn new(id: u32, queue_capacity: Option<usize>) -> Self {
        Self {
            id,
            queue: RequestQueue::new(id, queue_capacity),
            in_service: None,
            state: ServerState::Active,
        }
    }

    pub fn busy(&self) -> bool {
        self.in_service.is_some()
    }

    /// No in-service request and nothing queued.
    pub fn drained(&self) -> bool {
        self.in_service.is_none() && self.queue.is_empty()
    }

    /// Accept a request: straight into the free slot, else into the queue.
    pub fn assign(&mut self, id: RequestId) -> AssignOutcome {
        if self.in_service.is_none() {
            self.in_service = Some(id);
            AssignOutcome::Started
        } else if self.queue.push(id) {
            AssignOutcome::Queued
        } else {
            AssignOutcome::QueueFull
        }
    }

    /// Clear the service slot and promote the next queued request, if any.
    /// This is the only path that drains the queue.
    pub fn finish_current(&mut self) -> Result<Option<RequestId>, SimError> {
        self.in_service = if self.queue.is_empty() {
            None
        } else {
            Some(self.queue.pull()?)
        };
        Ok(self.in_service)
    }

    /// Remove a request from this server, wherever it is.
    ///
    /// An in-service occupant is treated like a completion for slot
    /// purposes: the slot frees up and the next queued request is promoted.
    pub fn cancel(&mut self, id: RequestId) -> Result<CancelLocation, SimError> {
        if self.in_service == Some(id) {
            let next = self.finish_current()?;
            Ok(CancelLocation::InService { next })
        } else if self.queue.remove(id) {
            Ok(CancelLocation::Dequeued)
        } else {
            Ok(CancelLocation::NotFound)
        }
    }

    /// The routing-policy view of this server.
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            id: self.id,
            queue_len: self.queue.len(),
            busy: self.busy(),
        }
    }
}
