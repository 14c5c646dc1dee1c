//! Discrete-event simulation engine.
//!
//! The engine maintains a priority queue of [`ScheduledEvent`]s sorted by
//! (time, priority, insertion order). Each iteration pops the next event,
//! advances the virtual clock, and dispatches the event's action, which may
//! schedule further events. Handlers run to completion before the next pop;
//! there is no concurrency inside a run.

use crate::balancer::LoadBalancer;
use crate::clock::SimClock;
use crate::error::SimError;
use crate::event::{ScheduledEvent, SimEvent, PRIORITY_COMPLETION, PRIORITY_DEFAULT};
use crate::metrics::{MetricsSink, SimulationReport, Stat};
use crate::request::Request;
use crate::server::{AssignOutcome, CancelLocation};
use crate::source::{ArrivalProcess, RateSchedule};
use std::collections::{BinaryHeap, HashMap};
use tracing::warn;

/// The main simulation engine.
pub struct SimulationEngine {
    /// Virtual clock, in seconds.
    pub clock: SimClock,
    /// Event queue (min-heap by time, then priority).
    event_queue: BinaryHeap<ScheduledEvent>,
    /// Sequence counter for deterministic tie-breaking.
    sequence: u64,
    /// All requests seen this run, by id.
    requests: HashMap<u64, Request>,
    /// Server pool with routing and scaling plugged in.
    pub balancer: LoadBalancer,
    /// Metrics sink scoped to this engine.
    pub metrics: MetricsSink,
    source: Option<Box<dyn ArrivalProcess>>,
    schedule: Option<RateSchedule>,
    period_length: Option<f64>,
    stop_time: f64,
    primed: bool,
    /// Total events executed.
    pub events_processed: u64,
}

impl SimulationEngine {
    pub fn new(stop_time: f64, balancer: LoadBalancer) -> Self {
        Self {
            clock: SimClock::new(),
            event_queue: BinaryHeap::new(),
            sequence: 0,
            requests: HashMap::new(),
            balancer,
            metrics: MetricsSink::new(),
            source: None,
            schedule: None,
            period_length: None,
            stop_time,
            primed: false,
            events_processed: 0,
        }
    }

    /// Attach an arrival process; its first tick is scheduled when the run
    /// starts.
    pub fn with_source(mut self, source: Box<dyn ArrivalProcess>) -> Self {
        self.source = Some(source);
        self
    }

    /// Enable period boundaries (controller + rate schedule) every
    /// `period_length` seconds.
    pub fn with_periods(mut self, period_length: f64) -> Self {
        self.period_length = Some(period_length);
        self
    }

    pub fn with_rate_schedule(mut self, schedule: RateSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Schedule an event. Scheduling into the past is an engine bug.
    pub fn schedule(
        &mut self,
        time: f64,
        priority: u8,
        label: &'static str,
        action: SimEvent,
    ) -> Result<(), SimError> {
        let now = self.clock.now();
        if time < now {
            return Err(SimError::ScheduleInPast { label, time, now });
        }
        self.event_queue.push(ScheduledEvent::new(
            time,
            priority,
            self.sequence,
            label,
            action,
        ));
        self.sequence += 1;
        Ok(())
    }

    /// Number of events still pending.
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Look up a request seen this run.
    pub fn request(&self, id: u64) -> Option<&Request> {
        self.requests.get(&id)
    }

    fn prime(&mut self) -> Result<(), SimError> {
        if self.primed {
            return Ok(());
        }
        self.primed = true;
        if let Some(source) = &self.source {
            let first = source.first_tick();
            self.schedule(first, PRIORITY_DEFAULT, "source-tick", SimEvent::SourceTick)?;
        }
        if let Some(period) = self.period_length {
            self.schedule(
                self.clock.now() + period,
                PRIORITY_DEFAULT,
                "period-end",
                SimEvent::PeriodEnd,
            )?;
        }
        Ok(())
    }

    /// Run until the stop time, then build the run report.
    ///
    /// The first event past the stop time ends the run without executing.
    /// Running out of events early is not an error but gets a warning: a
    /// simulation with a live source should never starve.
    pub fn run(&mut self) -> Result<SimulationReport, SimError> {
        self.prime()?;
        loop {
            let Some(mut event) = self.event_queue.pop() else {
                if self.clock.now() < self.stop_time {
                    warn!(
                        now = self.clock.now(),
                        stop_time = self.stop_time,
                        "event queue drained before the stop time"
                    );
                }
                break;
            };
            if event.time > self.stop_time {
                break;
            }
            self.clock.advance_to(event.time);
            let action = event.fire()?;
            self.dispatch(action)?;
            self.events_processed += 1;
        }
        Ok(self.report())
    }

    /// Build a report for the run so far.
    pub fn report(&self) -> SimulationReport {
        self.metrics.report(
            self.balancer.policy_name(),
            self.clock.now(),
            self.balancer.active_count(),
        )
    }

    fn dispatch(&mut self, action: SimEvent) -> Result<(), SimError> {
        match action {
            SimEvent::Arrival(request) => self.submit(request),
            SimEvent::CancelTimeout { request_id } => self.handle_cancel(request_id),
            SimEvent::ServiceComplete { request_id } => self.handle_completion(request_id),
            SimEvent::SourceTick => self.handle_source_tick(),
            SimEvent::PeriodEnd => self.handle_period_end(),
        }
    }

    /// Admit a request into the system at the current instant.
    ///
    /// Logs the arrival, starts the waiting interval, arms the cancellation
    /// timeout, and routes. A request the routing policy rejects, or that
    /// meets a full queue, is cancelled by the system on the spot.
    pub fn submit(&mut self, mut request: Request) -> Result<(), SimError> {
        let now = self.clock.now();
        let request_id = request.id;
        self.metrics.count(now, Stat::Arrivals);
        self.metrics.count(now, Stat::StartedWaiting);
        request.begin_waiting(now);

        // The timeout always fires; it is a no-op once the request is
        // terminal.
        self.schedule(
            now + request.tolerance_window,
            PRIORITY_DEFAULT,
            "cancel-timeout",
            SimEvent::CancelTimeout { request_id },
        )?;

        let target = self.balancer.route(&request);
        self.requests.insert(request_id, request);

        let outcome = match target {
            Some(server_id) => match self.balancer.server_mut(server_id) {
                Some(server) => Some((server_id, server.assign(request_id))),
                None => {
                    warn!(request_id, server_id, "policy routed to an unknown server");
                    None
                }
            },
            None => None,
        };
        match outcome {
            Some((server_id, AssignOutcome::Started)) => {
                self.set_assigned(request_id, server_id)?;
                self.start_service(request_id)?;
            }
            Some((server_id, AssignOutcome::Queued)) => {
                self.set_assigned(request_id, server_id)?;
            }
            Some((_, AssignOutcome::QueueFull)) | None => {
                self.handle_cancel(request_id)?;
            }
        }
        self.log_queue_total();
        Ok(())
    }

    fn log_queue_total(&mut self) {
        let total = self.balancer.total_queued() as f64;
        self.metrics.log(self.clock.now(), Stat::QueueTotal, total);
    }

    fn set_assigned(&mut self, request_id: u64, server_id: u32) -> Result<(), SimError> {
        let request = self
            .requests
            .get_mut(&request_id)
            .ok_or(SimError::UnknownRequest { id: request_id })?;
        request.assigned_server = Some(server_id);
        Ok(())
    }

    /// Start service for a request already occupying a server slot.
    fn start_service(&mut self, request_id: u64) -> Result<(), SimError> {
        let now = self.clock.now();
        let request = self
            .requests
            .get_mut(&request_id)
            .ok_or(SimError::UnknownRequest { id: request_id })?;
        if let Some(wait) = request.begin_service(now) {
            let done = now + request.service_duration;
            self.metrics.log(now, Stat::WaitTime, wait);
            self.schedule(
                done,
                PRIORITY_COMPLETION,
                "service-complete",
                SimEvent::ServiceComplete { request_id },
            )?;
        }
        Ok(())
    }

    fn handle_completion(&mut self, request_id: u64) -> Result<(), SimError> {
        let now = self.clock.now();
        let Some(request) = self.requests.get_mut(&request_id) else {
            warn!(request_id, "completion for unknown request");
            return Ok(());
        };
        // A request cancelled mid-service leaves its completion event in
        // the heap; it fires as a no-op.
        let Some(sojourn) = request.complete(now) else {
            return Ok(());
        };
        let server_id = request.assigned_server;
        self.metrics.count(now, Stat::Processed);
        self.metrics.log(now, Stat::SojournTime, sojourn);

        if let Some(server_id) = server_id {
            let next = match self.balancer.server_mut(server_id) {
                Some(server) => server.finish_current()?,
                None => None,
            };
            if let Some(next_id) = next {
                self.start_service(next_id)?;
            }
            self.balancer.reap_drained();
        }
        Ok(())
    }

    fn handle_cancel(&mut self, request_id: u64) -> Result<(), SimError> {
        let now = self.clock.now();
        let Some(request) = self.requests.get_mut(&request_id) else {
            warn!(request_id, "cancellation for unknown request");
            return Ok(());
        };
        if !request.cancel() {
            return Ok(());
        }
        let server_id = request.assigned_server;
        self.metrics.count(now, Stat::Cancelled);

        if let Some(server_id) = server_id {
            let location = match self.balancer.server_mut(server_id) {
                Some(server) => Some(server.cancel(request_id)?),
                None => None,
            };
            match location {
                Some(CancelLocation::InService { next }) => {
                    if let Some(next_id) = next {
                        self.start_service(next_id)?;
                    }
                }
                Some(CancelLocation::Dequeued) => {}
                Some(CancelLocation::NotFound) => {
                    warn!(request_id, server_id, "cancelled request not on its server");
                }
                None => {
                    warn!(request_id, server_id, "cancelled request's server is gone");
                }
            }
            self.balancer.reap_drained();
        }
        Ok(())
    }

    fn handle_source_tick(&mut self) -> Result<(), SimError> {
        let now = self.clock.now();
        let outcome = match self.source.as_mut() {
            Some(source) => source.on_tick(now)?,
            None => return Ok(()),
        };
        for (time, request) in outcome.arrivals {
            if time <= now {
                self.submit(request)?;
            } else {
                self.schedule(time, PRIORITY_DEFAULT, "arrival", SimEvent::Arrival(request))?;
            }
        }
        if let Some(next) = outcome.next_tick {
            self.schedule(next, PRIORITY_DEFAULT, "source-tick", SimEvent::SourceTick)?;
        }
        Ok(())
    }

    fn handle_period_end(&mut self) -> Result<(), SimError> {
        let now = self.clock.now();
        let ctx = self.metrics.period_context();
        self.metrics.reset_period();

        let before = self.balancer.active_count();
        if let Some(decision) = self.balancer.rescale(&ctx)? {
            self.metrics.log(now, Stat::Reward, decision.reward);
            self.metrics
                .log(now, Stat::ExplorationRate, decision.exploration_rate);
            self.metrics.log(
                now,
                Stat::ActionKind,
                if decision.explored { 0.0 } else { 1.0 },
            );
            self.metrics.log(now, Stat::NumServers, f64::from(before));
            self.metrics.log(
                now,
                Stat::NumServers,
                f64::from(self.balancer.active_count()),
            );
        }

        if let Some(schedule) = self.schedule.as_mut() {
            let rate = schedule.next_rate();
            if let Some(source) = self.source.as_mut() {
                source.set_rate(rate);
            }
            self.metrics.log(now, Stat::ArrivalRate, rate);
        }

        if let Some(period) = self.period_length {
            self.schedule(
                now + period,
                PRIORITY_DEFAULT,
                "period-end",
                SimEvent::PeriodEnd,
            )?;
        }
        Ok(())
    }
}
