//! Arrival processes feeding the simulation.
//!
//! A source is a capability the engine ticks: each [`SourceTick`] event asks
//! the source for the arrivals it produces at that instant and the time of
//! its next tick. Sources own their RNG and request-id counter, so two runs
//! with the same seed produce the same workload.
//!
//! [`SourceTick`]: crate::event::SimEvent::SourceTick

use crate::error::SimError;
use crate::request::Request;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Exp, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid workload parameters, caught at source construction.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request type probabilities sum to {0}, expected 1")]
    TypeProbabilities(f64),
    #[error("request type {index} has invalid duration distribution (mean {mean}, std {std})")]
    DurationDistribution { index: usize, mean: f64, std: f64 },
    #[error("arrival rate {0} must be > 0")]
    InvalidRate(f64),
    #[error("arrival probability {0} is outside (0, 1]")]
    InvalidProbability(f64),
}

/// One request category in the workload mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTypeSpec {
    /// Probability of an arrival being this type. Must sum to 1 across types.
    pub probability: f64,
    /// Mean service duration in seconds.
    pub mean_duration: f64,
    /// Std deviation of the service duration. Samples clamp at 0.
    #[serde(default)]
    pub std_duration: f64,
    /// Client patience in seconds.
    pub tolerance_window: f64,
}

/// Samples concrete requests from the configured type mix.
#[derive(Debug, Clone)]
struct RequestSampler {
    weights: WeightedIndex<f64>,
    durations: Vec<Normal<f64>>,
    tolerances: Vec<f64>,
    next_id: u64,
}

impl RequestSampler {
    fn new(types: &[RequestTypeSpec]) -> Result<Self, SourceError> {
        let total: f64 = types.iter().map(|t| t.probability).sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(SourceError::TypeProbabilities(total));
        }
        let weights = WeightedIndex::new(types.iter().map(|t| t.probability))
            .map_err(|_| SourceError::TypeProbabilities(total))?;
        let mut durations = Vec::with_capacity(types.len());
        for (index, t) in types.iter().enumerate() {
            let normal = Normal::new(t.mean_duration, t.std_duration).map_err(|_| {
                SourceError::DurationDistribution {
                    index,
                    mean: t.mean_duration,
                    std: t.std_duration,
                }
            })?;
            durations.push(normal);
        }
        Ok(Self {
            weights,
            durations,
            tolerances: types.iter().map(|t| t.tolerance_window).collect(),
            next_id: 0,
        })
    }

    fn sample(&mut self, rng: &mut ChaCha8Rng) -> Result<Request, SimError> {
        let type_index = self.weights.sample(rng);
        let duration = self.durations[type_index].sample(rng).max(0.0);
        let id = self.next_id;
        self.next_id += 1;
        Request::new(id, type_index, duration, self.tolerances[type_index])
    }
}

/// What a source produced for one tick.
#[derive(Debug)]
pub struct SourceOutcome {
    /// Arrivals and their arrival times (`>= now`).
    pub arrivals: Vec<(f64, Request)>,
    /// When to tick this source again; `None` stops it.
    pub next_tick: Option<f64>,
}

/// The arrival-process capability.
pub trait ArrivalProcess: Send {
    fn on_tick(&mut self, now: f64) -> Result<SourceOutcome, SimError>;

    /// Change the arrival rate (requests per second), e.g. from a schedule.
    fn set_rate(&mut self, rate: f64);

    fn rate(&self) -> f64;

    /// Time of the first tick.
    fn first_tick(&self) -> f64 {
        0.0
    }
}

/// Bernoulli arrivals: ticks at a fixed interval of `request_prob / rate`
/// seconds, each tick producing an arrival with probability `request_prob`.
/// The expected rate is `rate` while keeping individual ticks cheap.
pub struct BernoulliSource {
    sampler: RequestSampler,
    rng: ChaCha8Rng,
    rate: f64,
    request_prob: f64,
}

impl BernoulliSource {
    pub fn new(
        types: &[RequestTypeSpec],
        rate: f64,
        request_prob: f64,
        seed: u64,
    ) -> Result<Self, SourceError> {
        if rate <= 0.0 {
            return Err(SourceError::InvalidRate(rate));
        }
        if !(request_prob > 0.0 && request_prob <= 1.0) {
            return Err(SourceError::InvalidProbability(request_prob));
        }
        Ok(Self {
            sampler: RequestSampler::new(types)?,
            rng: ChaCha8Rng::seed_from_u64(seed),
            rate,
            request_prob,
        })
    }

    fn interval(&self) -> f64 {
        self.request_prob / self.rate
    }
}

impl ArrivalProcess for BernoulliSource {
    fn on_tick(&mut self, now: f64) -> Result<SourceOutcome, SimError> {
        let mut arrivals = Vec::new();
        if self.rng.gen::<f64>() < self.request_prob {
            arrivals.push((now, self.sampler.sample(&mut self.rng)?));
        }
        Ok(SourceOutcome {
            arrivals,
            next_tick: Some(now + self.interval()),
        })
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn rate(&self) -> f64 {
        self.rate
    }
}

/// Poisson-process arrivals: one request per tick, exponentially
/// distributed inter-arrival times.
pub struct ExponentialSource {
    sampler: RequestSampler,
    rng: ChaCha8Rng,
    rate: f64,
    inter_arrival: Exp<f64>,
}

impl ExponentialSource {
    pub fn new(types: &[RequestTypeSpec], rate: f64, seed: u64) -> Result<Self, SourceError> {
        if rate <= 0.0 {
            return Err(SourceError::InvalidRate(rate));
        }
        Ok(Self {
            sampler: RequestSampler::new(types)?,
            rng: ChaCha8Rng::seed_from_u64(seed),
            rate,
            inter_arrival: Exp::new(rate).map_err(|_| SourceError::InvalidRate(rate))?,
        })
    }
}

impl ArrivalProcess for ExponentialSource {
    fn on_tick(&mut self, now: f64) -> Result<SourceOutcome, SimError> {
        let request = self.sampler.sample(&mut self.rng)?;
        let next = now + self.inter_arrival.sample(&mut self.rng);
        Ok(SourceOutcome {
            arrivals: vec![(now, request)],
            next_tick: Some(next),
        })
    }

    fn set_rate(&mut self, rate: f64) {
        if rate > 0.0 {
            if let Ok(dist) = Exp::new(rate) {
                self.rate = rate;
                self.inter_arrival = dist;
            }
        }
    }

    fn rate(&self) -> f64 {
        self.rate
    }
}

/// Batched arrivals: one tick per period generates the whole period's
/// requests at once, uniformly spread over the period. Cheaper than
/// per-arrival ticks for long runs at high rates.
pub struct BatchedSource {
    sampler: RequestSampler,
    rng: ChaCha8Rng,
    rate: f64,
    period_length: f64,
}

impl BatchedSource {
    pub fn new(
        types: &[RequestTypeSpec],
        rate: f64,
        period_length: f64,
        seed: u64,
    ) -> Result<Self, SourceError> {
        if rate <= 0.0 {
            return Err(SourceError::InvalidRate(rate));
        }
        if period_length <= 0.0 {
            return Err(SourceError::InvalidRate(period_length));
        }
        Ok(Self {
            sampler: RequestSampler::new(types)?,
            rng: ChaCha8Rng::seed_from_u64(seed),
            rate,
            period_length,
        })
    }
}

impl ArrivalProcess for BatchedSource {
    fn on_tick(&mut self, now: f64) -> Result<SourceOutcome, SimError> {
        let count = (self.rate * self.period_length).round() as usize;
        let mut arrivals = Vec::with_capacity(count);
        for _ in 0..count {
            let offset: f64 = self.rng.gen::<f64>() * self.period_length;
            arrivals.push((now + offset, self.sampler.sample(&mut self.rng)?));
        }
        Ok(SourceOutcome {
            arrivals,
            next_tick: Some(now + self.period_length),
        })
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn rate(&self) -> f64 {
        self.rate
    }
}

/// Cyclic per-period arrival rates, applied at period boundaries.
#[derive(Debug, Clone)]
pub struct RateSchedule {
    rates: Vec<f64>,
    cursor: usize,
}

impl RateSchedule {
    pub fn new(rates: Vec<f64>) -> Option<Self> {
        if rates.is_empty() {
            return None;
        }
        Some(Self { rates, cursor: 0 })
    }

    /// Rate for the next period; cycles when exhausted.
    pub fn next_rate(&mut self) -> f64 {
        let rate = self.rates[self.cursor % self.rates.len()];
        self.cursor += 1;
        rate
    }
}
