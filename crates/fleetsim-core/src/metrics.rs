//! Metrics collection and aggregation for simulation runs.
//!
//! Every engine owns one [`MetricsSink`]; components log into it through
//! the engine rather than any ambient global state. Each statistic is a
//! timestamped series with a period cursor, so the controller can read
//! aggregates of just the period that ended while the run-level report
//! still sees everything.

use fleetsim_policies::PeriodContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics tracked during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    /// One sample per arrival.
    Arrivals,
    /// One sample per request that started waiting.
    StartedWaiting,
    /// Wait duration, logged when service starts.
    WaitTime,
    /// One sample per processed request.
    Processed,
    /// Arrival-to-completion duration, logged at completion.
    SojournTime,
    /// One sample per cancelled request.
    Cancelled,
    /// Fleet-wide queued total, logged after each assignment.
    QueueTotal,
    /// Active server count, logged before and after each resize.
    NumServers,
    /// Controller reward per period.
    Reward,
    /// Controller exploration rate per period.
    ExplorationRate,
    /// 0 for an explored (random) decision, 1 for a greedy one.
    ActionKind,
    /// Arrival rate applied at a period boundary.
    ArrivalRate,
}

/// One statistic's samples with parallel timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Series {
    pub values: Vec<f64>,
    pub timestamps: Vec<f64>,
    /// Index of the first sample belonging to the current period.
    period_start: usize,
}

impl Series {
    fn push(&mut self, now: f64, value: f64) {
        self.values.push(value);
        self.timestamps.push(now);
    }

    /// Samples logged since the last period reset.
    pub fn period_slice(&self) -> &[f64] {
        &self.values[self.period_start..]
    }
}

/// Sink for all statistics of one simulation run.
#[derive(Debug, Clone, Default)]
pub struct MetricsSink {
    series: HashMap<Stat, Series>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    if m.is_finite() {
        m
    } else {
        0.0
    }
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample.
    pub fn log(&mut self, now: f64, stat: Stat, value: f64) {
        self.series.entry(stat).or_default().push(now, value);
    }

    /// Record a unit sample (an occurrence counter).
    pub fn count(&mut self, now: f64, stat: Stat) {
        self.log(now, stat, 1.0);
    }

    pub fn series(&self, stat: Stat) -> Option<&Series> {
        self.series.get(&stat)
    }

    pub fn values(&self, stat: Stat) -> &[f64] {
        self.series.get(&stat).map_or(&[], |s| &s.values)
    }

    fn period_values(&self, stat: Stat) -> &[f64] {
        self.series.get(&stat).map_or(&[], |s| s.period_slice())
    }

    /// Move every period cursor to the end of its series.
    pub fn reset_period(&mut self) {
        for series in self.series.values_mut() {
            series.period_start = series.values.len();
        }
    }

    /// Aggregate the current period into the controller's view: counters
    /// are summed, duration and queue-length series are averaged, and an
    /// empty series contributes 0.
    pub fn period_context(&self) -> PeriodContext {
        PeriodContext {
            mean_queue_len: mean(self.period_values(Stat::QueueTotal)),
            started_waiting: self.period_values(Stat::StartedWaiting).iter().sum(),
            arrivals: self.period_values(Stat::Arrivals).iter().sum(),
            mean_wait_time: mean(self.period_values(Stat::WaitTime)),
            processed: self.period_values(Stat::Processed).iter().sum(),
            mean_sojourn_time: mean(self.period_values(Stat::SojournTime)),
            cancelled: self.period_values(Stat::Cancelled).iter().sum(),
        }
    }

    /// Build the run-level report.
    pub fn report(&self, policy: &str, duration: f64, final_servers: u32) -> SimulationReport {
        let num_servers = self.values(Stat::NumServers);
        let mean_servers = if num_servers.is_empty() {
            f64::from(final_servers)
        } else {
            mean(num_servers)
        };
        let processed = self.values(Stat::Processed).len() as u64;

        SimulationReport {
            policy: policy.to_string(),
            duration,
            arrivals: self.values(Stat::Arrivals).len() as u64,
            processed,
            cancelled: self.values(Stat::Cancelled).len() as u64,
            wait_time: Percentiles::from_values(self.values(Stat::WaitTime)),
            sojourn_time: Percentiles::from_values(self.values(Stat::SojournTime)),
            queue_total: Percentiles::from_values(self.values(Stat::QueueTotal)),
            mean_servers,
            final_servers,
            total_reward: self.values(Stat::Reward).iter().sum(),
            processed_per_sec: if duration > 0.0 {
                processed as f64 / duration
            } else {
                0.0
            },
        }
    }
}

/// Percentile values for a distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Percentiles {
    /// Compute percentiles from a slice of values.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                p50: 0.0,
                p75: 0.0,
                p90: 0.0,
                p95: 0.0,
                p99: 0.0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;

        Self {
            p50: percentile_sorted(&sorted, 50.0),
            p75: percentile_sorted(&sorted, 75.0),
            p90: percentile_sorted(&sorted, 90.0),
            p95: percentile_sorted(&sorted, 95.0),
            p99: percentile_sorted(&sorted, 99.0),
            min: sorted[0],
            max: sorted[n - 1],
            mean,
        }
    }
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Aggregated results for an entire simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Routing policy name.
    pub policy: String,
    /// Simulated duration in seconds.
    pub duration: f64,
    pub arrivals: u64,
    pub processed: u64,
    pub cancelled: u64,
    pub wait_time: Percentiles,
    pub sojourn_time: Percentiles,
    pub queue_total: Percentiles,
    /// Mean of the logged server counts (run-long fleet size).
    pub mean_servers: f64,
    pub final_servers: u32,
    /// Sum of per-period controller rewards; 0 without a controller.
    pub total_reward: f64,
    pub processed_per_sec: f64,
}

/// Format a report as a pretty-printed table string.
pub fn format_table(report: &SimulationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{:=<70}\n",
        format!("  {} Results  ", report.policy)
    ));
    out.push_str(&format!(
        "  Duration: {:.1}s | Arrivals: {} | Processed: {} | Cancelled: {}\n",
        report.duration, report.arrivals, report.processed, report.cancelled,
    ));
    out.push_str(&format!("{:-<70}\n", "  Latency  "));
    out.push_str(&format!(
        "  Wait (s)     P50={:>8.3}  P90={:>8.3}  P99={:>8.3}  mean={:>8.3}\n",
        report.wait_time.p50, report.wait_time.p90, report.wait_time.p99, report.wait_time.mean,
    ));
    out.push_str(&format!(
        "  Sojourn (s)  P50={:>8.3}  P90={:>8.3}  P99={:>8.3}  mean={:>8.3}\n",
        report.sojourn_time.p50,
        report.sojourn_time.p90,
        report.sojourn_time.p99,
        report.sojourn_time.mean,
    ));
    out.push_str(&format!("{:-<70}\n", "  Fleet  "));
    out.push_str(&format!(
        "  Queue total  P50={:>8.1}  max={:>8.1}\n",
        report.queue_total.p50, report.queue_total.max,
    ));
    out.push_str(&format!(
        "  Servers: mean {:.1}, final {} | Throughput: {:.2} req/s\n",
        report.mean_servers, report.final_servers, report.processed_per_sec,
    ));
    out.push_str(&format!(
        "  Total reward: {:.1}\n",
        report.total_reward
    ));
    out.push_str(&format!("{:=<70}\n", ""));
    out
}

/// Format a comparison table of multiple policy results.
pub fn format_comparison_table(results: &[SimulationReport]) -> String {
    if results.is_empty() {
        return String::from("No results to compare.\n");
    }

    let mut out = String::new();
    out.push_str(&format!("\n{:=<86}\n", "  Policy Comparison  "));
    out.push_str(&format!(
        "{:<18} {:>9} {:>9} {:>10} {:>10} {:>9} {:>9}\n",
        "Policy", "Processed", "Cancelled", "Wait p50", "Wait p99", "Req/s", "Reward"
    ));
    out.push_str(&format!("{:-<86}\n", ""));

    for r in results {
        out.push_str(&format!(
            "{:<18} {:>9} {:>9} {:>10.3} {:>10.3} {:>9.2} {:>9.1}\n",
            r.policy,
            r.processed,
            r.cancelled,
            r.wait_time.p50,
            r.wait_time.p99,
            r.processed_per_sec,
            r.total_reward,
        ));
    }
    out.push_str(&format!("{:=<86}\n", ""));
    out
}
