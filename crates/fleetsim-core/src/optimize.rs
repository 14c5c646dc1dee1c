//! Offline fleet-size optimization.
//!
//! Complements the online controller: run whole simulations at candidate
//! fleet sizes and pick the most profitable one. The profit profile over
//! server count is treated as unimodal, so a bracketing search needs far
//! fewer full runs than a linear sweep; evaluations are memoized and the
//! final bracket is scanned linearly.

use crate::error::SimError;
use fleetsim_policies::RewardWeights;
use std::collections::HashMap;

/// Inclusive search bounds for the fleet size.
#[derive(Debug, Clone, Copy)]
pub struct SearchSpace {
    pub min: u32,
    pub max: u32,
}

/// Profit of one whole run, scored the same way the controller scores a
/// period.
pub fn run_profit(
    weights: &RewardWeights,
    processed: u64,
    cancelled: u64,
    servers: u32,
    duration: f64,
) -> f64 {
    let server_hours = duration / 3600.0 * f64::from(servers);
    processed as f64 * weights.process + cancelled as f64 * weights.cancel
        + server_hours * weights.server
}

/// Bracketing search for the most profitable fleet size.
///
/// `evaluate` runs a full simulation at the given size and returns its
/// profit; each size is evaluated at most once. The bracket narrows by
/// comparing the two quarter points until it spans at most 2, then the
/// remaining candidates are scanned directly.
pub fn binary_fleet_search<F>(mut evaluate: F, space: SearchSpace) -> Result<u32, SimError>
where
    F: FnMut(u32) -> Result<f64, SimError>,
{
    let mut cache: HashMap<u32, f64> = HashMap::new();
    let mut probe = |n: u32, cache: &mut HashMap<u32, f64>| -> Result<f64, SimError> {
        if let Some(&profit) = cache.get(&n) {
            return Ok(profit);
        }
        let profit = evaluate(n)?;
        cache.insert(n, profit);
        Ok(profit)
    };

    let mut left = space.min;
    let mut right = space.max.max(space.min);

    while right - left > 2 {
        let mid = (f64::from(left) + f64::from(right)) / 2.0;
        let left_probe = ((f64::from(left) + mid) / 2.0).round() as u32;
        let right_probe = ((f64::from(right) + mid) / 2.0).round() as u32;

        let left_profit = probe(left_probe, &mut cache)?;
        let right_profit = probe(right_probe, &mut cache)?;
        if left_profit > right_profit {
            right = mid.round() as u32;
        } else {
            left = mid.round() as u32;
        }
    }

    let mut best = left;
    let mut best_profit = probe(left, &mut cache)?;
    for n in left + 1..=right {
        let profit = probe(n, &mut cache)?;
        if profit > best_profit {
            best = n;
            best_profit = profit;
        }
    }
    Ok(best)
}

/// Least-squares line through (arrival rate, optimal server count) points.
/// Returns `(slope, intercept)`.
pub fn fit_fleet_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    Some((slope, intercept))
}

/// Predict the optimal fleet size for an arrival rate from a fitted line.
pub fn optimal_for_rate(slope: f64, intercept: f64, rate: f64) -> u32 {
    (slope * rate + intercept).round().max(0.0) as u32
}
