//! Epsilon-greedy fleet-size controller.
//!
//! At the end of each control period the controller scores the period
//! that just finished, folds that observation into its reward model, and
//! then either explores (uniform fleet size from its range) or exploits
//! (the size the model predicts the highest reward for). The feature row
//! stored for a period describes the traffic aggregates of the period
//! that *preceded* the sizing decision, so features and rewards stay
//! offset by one period: the model learns "given last period looked like
//! this and we ran n servers, this is what the period earned".

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::ControlError;
use crate::model::RewardModel;
use crate::traits::{ControlDecision, PeriodContext, ScalingController};

/// Per-event reward weights applied when scoring a finished period.
#[derive(Debug, Clone, Copy)]
pub struct RewardWeights {
    /// Credit per request served to completion.
    pub process: f64,
    /// Penalty per request that gave up waiting.
    pub cancel: f64,
    /// Cost per server-hour of capacity kept online.
    pub server: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            process: 1.0,
            cancel: -10.0,
            server: -300.0,
        }
    }
}

impl RewardWeights {
    /// Score one finished period of `period_length` seconds run on
    /// `servers` servers.
    pub fn period_reward(&self, ctx: &PeriodContext, servers: u32, period_length: f64) -> f64 {
        let server_hours = period_length / 3600.0 * f64::from(servers);
        ctx.processed * self.process + ctx.cancelled * self.cancel + server_hours * self.server
    }
}

/// Exploration rate, fixed or a function of the period index.
pub enum ExplorationSchedule {
    Constant(f64),
    Func(Box<dyn Fn(u32) -> f64 + Send>),
}

impl std::fmt::Debug for ExplorationSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant(eta) => f.debug_tuple("Constant").field(eta).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl ExplorationSchedule {
    fn rate(&self, period: u32) -> Result<f64, ControlError> {
        let eta = match self {
            Self::Constant(eta) => *eta,
            Self::Func(func) => func(period),
        };
        if !(0.0..=1.0).contains(&eta) {
            return Err(ControlError::InvalidExplorationRate(eta));
        }
        Ok(eta)
    }
}

/// Epsilon-greedy controller over an inclusive fleet-size range.
pub struct EpsilonGreedyController {
    model: Box<dyn RewardModel>,
    weights: RewardWeights,
    exploration: ExplorationSchedule,
    min_servers: u32,
    max_servers: u32,
    period_length: f64,
    use_partial_fit: bool,
    period_index: u32,
    features: Vec<Vec<f64>>,
    rewards: Vec<f64>,
    rng: ChaCha8Rng,
}

impl EpsilonGreedyController {
    pub fn new(
        model: Box<dyn RewardModel>,
        min_servers: u32,
        max_servers: u32,
        period_length: f64,
    ) -> Result<Self, ControlError> {
        if min_servers == 0 || min_servers > max_servers {
            return Err(ControlError::EmptyServerRange {
                min: min_servers,
                max: max_servers,
            });
        }
        Ok(Self {
            model,
            weights: RewardWeights::default(),
            exploration: ExplorationSchedule::Constant(0.1),
            min_servers,
            max_servers,
            period_length,
            use_partial_fit: false,
            period_index: 0,
            features: Vec::new(),
            rewards: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(0),
        })
    }

    pub fn with_weights(mut self, weights: RewardWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_exploration(mut self, exploration: ExplorationSchedule) -> Self {
        self.exploration = exploration;
        self
    }

    pub fn with_partial_fit(mut self, enabled: bool) -> Self {
        self.use_partial_fit = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Number of (feature row, reward) pairs the model has been fed.
    pub fn history_len(&self) -> usize {
        self.rewards.len()
    }

    fn greedy_choice(&self, ctx: &PeriodContext) -> Result<u32, ControlError> {
        let mut best = self.min_servers;
        let mut best_score = f64::NEG_INFINITY;
        for candidate in self.min_servers..=self.max_servers {
            let score = self.model.predict(&ctx.to_features(candidate))?;
            if !score.is_finite() {
                return Err(ControlError::NonFinitePrediction { candidate });
            }
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }
        Ok(best)
    }
}

impl ScalingController for EpsilonGreedyController {
    fn decide(
        &mut self,
        ctx: &PeriodContext,
        current_servers: u32,
    ) -> Result<ControlDecision, ControlError> {
        let reward = self
            .weights
            .period_reward(ctx, current_servers, self.period_length);

        // The first period has no prior sizing decision to credit, so
        // its reward is not learned from. Afterwards the reward observed
        // now pairs with the feature row stored one period ago.
        if self.period_index > 0 {
            self.rewards.push(reward);
            if self.use_partial_fit {
                let latest = self.features.len() - 1;
                self.model
                    .partial_fit(&self.features[latest..], &self.rewards[latest..])?;
            } else {
                self.model.fit(&self.features, &self.rewards)?;
            }
        }

        let eta = self.exploration.rate(self.period_index)?;
        let draw: f64 = self.rng.gen();
        // The draw is taken even when the model is too young to exploit,
        // keeping the random stream independent of the period index.
        let explored = draw < eta || self.period_index <= 1;

        let target = if explored {
            self.rng.gen_range(self.min_servers..=self.max_servers)
        } else {
            self.greedy_choice(ctx)?
        };

        debug!(
            period = self.period_index,
            reward, eta, explored, target, "scaling decision"
        );

        self.features.push(ctx.to_features(target));
        self.period_index += 1;

        Ok(ControlDecision {
            target_servers: target,
            reward,
            exploration_rate: eta,
            explored,
        })
    }

    fn name(&self) -> &'static str {
        "epsilon_greedy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Model that scores fleet size n as -(n - 5)^2 and records fit calls.
    struct FavorFive {
        fits: usize,
        last_history: usize,
    }

    impl RewardModel for FavorFive {
        fn predict(&self, features: &[f64]) -> Result<f64, ControlError> {
            let n = features[features.len() - 1];
            Ok(-(n - 5.0) * (n - 5.0))
        }

        fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), ControlError> {
            assert_eq!(features.len(), targets.len());
            self.fits += 1;
            self.last_history = targets.len();
            Ok(())
        }
    }

    fn quiet_context() -> PeriodContext {
        PeriodContext {
            mean_queue_len: 0.5,
            started_waiting: 12.0,
            arrivals: 12.0,
            mean_wait_time: 0.2,
            processed: 11.0,
            mean_sojourn_time: 1.1,
            cancelled: 1.0,
        }
    }

    #[test]
    fn test_rejects_empty_server_range() {
        let err = EpsilonGreedyController::new(Box::new(FavorFive { fits: 0, last_history: 0 }), 8, 3, 60.0);
        assert!(matches!(err, Err(ControlError::EmptyServerRange { min: 8, max: 3 })));
    }

    #[test]
    fn test_first_two_periods_always_explore() {
        let mut controller = EpsilonGreedyController::new(
            Box::new(FavorFive { fits: 0, last_history: 0 }),
            1,
            40,
            60.0,
        )
        .unwrap()
        .with_exploration(ExplorationSchedule::Constant(0.0));

        let ctx = quiet_context();
        let first = controller.decide(&ctx, 3).unwrap();
        let second = controller.decide(&ctx, first.target_servers).unwrap();
        assert!(first.explored);
        assert!(second.explored);
    }

    #[test]
    fn test_greedy_choice_follows_the_model() {
        let mut controller = EpsilonGreedyController::new(
            Box::new(FavorFive { fits: 0, last_history: 0 }),
            1,
            40,
            60.0,
        )
        .unwrap()
        .with_exploration(ExplorationSchedule::Constant(0.0));

        let ctx = quiet_context();
        let mut current = 3;
        for _ in 0..2 {
            current = controller.decide(&ctx, current).unwrap().target_servers;
        }
        for _ in 0..5 {
            let decision = controller.decide(&ctx, current).unwrap();
            assert!(!decision.explored);
            assert_eq!(decision.target_servers, 5);
            current = decision.target_servers;
        }
    }

    #[test]
    fn test_features_lag_rewards_by_one_period() {
        let mut controller = EpsilonGreedyController::new(
            Box::new(FavorFive { fits: 0, last_history: 0 }),
            1,
            10,
            60.0,
        )
        .unwrap();

        let ctx = quiet_context();
        let mut current = 2;
        for round in 0..4 {
            current = controller.decide(&ctx, current).unwrap().target_servers;
            assert_eq!(controller.history_len(), round);
            assert_eq!(controller.features.len(), round + 1);
        }
    }

    #[test]
    fn test_period_reward_weighs_events_and_capacity() {
        let ctx = quiet_context();
        let weights = RewardWeights::default();
        // 11 processed - 10 * 1 cancelled - 300 * (3600s on 2 servers = 2h)
        let reward = weights.period_reward(&ctx, 2, 3600.0);
        assert!((reward - (11.0 - 10.0 - 600.0)).abs() < 1e-9);
    }

    #[test]
    fn test_exploration_schedule_can_depend_on_period() {
        let mut controller = EpsilonGreedyController::new(
            Box::new(FavorFive { fits: 0, last_history: 0 }),
            1,
            10,
            60.0,
        )
        .unwrap()
        .with_exploration(ExplorationSchedule::Func(Box::new(|period| {
            if period < 3 {
                1.0
            } else {
                0.0
            }
        })));

        let ctx = quiet_context();
        let mut current = 2;
        for _ in 0..3 {
            let decision = controller.decide(&ctx, current).unwrap();
            assert!(decision.explored);
            current = decision.target_servers;
        }
        let decision = controller.decide(&ctx, current).unwrap();
        assert!(!decision.explored);
        assert_eq!(decision.target_servers, 5);
    }

    #[test]
    fn test_invalid_exploration_rate_is_an_error() {
        let mut controller = EpsilonGreedyController::new(
            Box::new(FavorFive { fits: 0, last_history: 0 }),
            1,
            10,
            60.0,
        )
        .unwrap()
        .with_exploration(ExplorationSchedule::Constant(1.5));

        let err = controller.decide(&quiet_context(), 2);
        assert!(matches!(err, Err(ControlError::InvalidExplorationRate(eta)) if eta == 1.5));
    }
}
