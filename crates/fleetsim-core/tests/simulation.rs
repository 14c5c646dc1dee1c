//! End-to-end simulation runs driven through the public API.

use fleetsim_core::config::SimConfig;
use fleetsim_core::error::SimError;

const BASE_CONFIG: &str = r#"
[simulation]
name = "integration"
seed = 7
stop_time = 600.0
period_length = 60.0

[fleet]
num_servers = 4

[workload]
source = "exponential"
arrivals_per_sec = 2.0

[[workload.request_types]]
probability = 0.8
mean_duration = 1.0
std_duration = 0.2
tolerance_window = 30.0

[[workload.request_types]]
probability = 0.2
mean_duration = 3.0
std_duration = 0.5
tolerance_window = 60.0
"#;

#[test]
fn test_full_run_produces_traffic() {
    let config = SimConfig::from_str(BASE_CONFIG).unwrap();
    let report = fleetsim_core::run_simulation(&config).unwrap();

    assert_eq!(report.policy, "round_robin");
    assert!(report.arrivals > 500, "arrivals = {}", report.arrivals);
    assert!(report.processed > 0);
    assert!(report.processed + report.cancelled <= report.arrivals);
    assert!(report.duration > 0.0 && report.duration <= 600.0);
    assert_eq!(report.final_servers, 4);
}

#[test]
fn test_same_seed_is_deterministic() {
    let config = SimConfig::from_str(BASE_CONFIG).unwrap();
    let a = fleetsim_core::run_simulation(&config).unwrap();
    let b = fleetsim_core::run_simulation(&config).unwrap();

    assert_eq!(a.arrivals, b.arrivals);
    assert_eq!(a.processed, b.processed);
    assert_eq!(a.cancelled, b.cancelled);
    assert_eq!(a.wait_time.mean, b.wait_time.mean);
    assert_eq!(a.sojourn_time.mean, b.sojourn_time.mean);
}

#[test]
fn test_different_seeds_diverge() {
    let config = SimConfig::from_str(BASE_CONFIG).unwrap();
    let mut other = config.clone();
    other.simulation.seed = 8;

    let a = fleetsim_core::run_simulation(&config).unwrap();
    let b = fleetsim_core::run_simulation(&other).unwrap();
    assert_ne!(
        (a.arrivals, a.wait_time.mean),
        (b.arrivals, b.wait_time.mean)
    );
}

#[test]
fn test_light_load_never_cancels() {
    let toml = r#"
[simulation]
seed = 3
stop_time = 300.0

[fleet]
num_servers = 3

[workload]
source = "exponential"
arrivals_per_sec = 0.5

[[workload.request_types]]
probability = 1.0
mean_duration = 0.5
std_duration = 0.1
tolerance_window = 500.0
"#;
    let config = SimConfig::from_str(toml).unwrap();
    let report = fleetsim_core::run_simulation(&config).unwrap();
    assert_eq!(report.cancelled, 0);
    assert!(report.processed > 0);
}

#[test]
fn test_overload_cancels_requests() {
    let toml = r#"
[simulation]
seed = 3
stop_time = 300.0

[fleet]
num_servers = 1

[workload]
source = "exponential"
arrivals_per_sec = 5.0

[[workload.request_types]]
probability = 1.0
mean_duration = 4.0
std_duration = 0.5
tolerance_window = 2.0
"#;
    let config = SimConfig::from_str(toml).unwrap();
    let report = fleetsim_core::run_simulation(&config).unwrap();
    assert!(report.cancelled > 0);
    assert!(report.cancelled > report.processed);
}

#[test]
fn test_controller_keeps_fleet_within_bounds() {
    let toml = r#"
[simulation]
seed = 11
stop_time = 1200.0
period_length = 60.0

[fleet]
num_servers = 4

[workload]
source = "exponential"
arrivals_per_sec = 2.0

[[workload.request_types]]
probability = 1.0
mean_duration = 1.0
std_duration = 0.2
tolerance_window = 20.0

[controller]
enabled = true
min_servers = 2
max_servers = 8
exploration_rate = 0.3
"#;
    let config = SimConfig::from_str(toml).unwrap();
    let report = fleetsim_core::run_simulation(&config).unwrap();

    assert!(
        (2..=8).contains(&report.final_servers),
        "final_servers = {}",
        report.final_servers
    );
    assert!(report.mean_servers >= 2.0 && report.mean_servers <= 8.0);
    // Twenty control periods accrue reward for every one of them.
    assert!(report.total_reward != 0.0);
}

#[test]
fn test_rate_schedule_changes_throughput() {
    let slow = r#"
[simulation]
seed = 5
stop_time = 600.0
period_length = 60.0

[fleet]
num_servers = 4

[workload]
source = "exponential"
arrivals_per_sec = 1.0

[[workload.request_types]]
probability = 1.0
mean_duration = 0.5
std_duration = 0.1
tolerance_window = 30.0

[schedule]
rates = [0.5]
"#;
    let fast = slow.replace("rates = [0.5]", "rates = [6.0]");

    let slow_report =
        fleetsim_core::run_simulation(&SimConfig::from_str(slow).unwrap()).unwrap();
    let fast_report =
        fleetsim_core::run_simulation(&SimConfig::from_str(&fast).unwrap()).unwrap();
    assert!(
        fast_report.arrivals > slow_report.arrivals * 2,
        "fast = {}, slow = {}",
        fast_report.arrivals,
        slow_report.arrivals
    );
}

#[test]
fn test_compare_policies_one_report_each() {
    let config = SimConfig::from_str(BASE_CONFIG).unwrap();
    let names = ["round_robin", "shortest_queue", "random"];
    let reports = fleetsim_core::compare_policies(&config, &names).unwrap();

    assert_eq!(reports.len(), 3);
    for (report, name) in reports.iter().zip(names) {
        assert_eq!(report.policy, name);
        assert!(report.arrivals > 0);
    }
}

#[test]
fn test_unknown_policy_is_rejected() {
    let config = SimConfig::from_str(BASE_CONFIG).unwrap();
    let err = fleetsim_core::run_with_policy(&config, "coin_flip").unwrap_err();
    assert!(matches!(err, SimError::UnknownPolicy(name) if name == "coin_flip"));
}

#[test]
fn test_bounded_queues_shed_load() {
    let toml = r#"
[simulation]
seed = 9
stop_time = 300.0

[fleet]
num_servers = 2
queue_capacity = 1

[workload]
source = "exponential"
arrivals_per_sec = 8.0

[[workload.request_types]]
probability = 1.0
mean_duration = 2.0
std_duration = 0.2
tolerance_window = 100.0
"#;
    let config = SimConfig::from_str(toml).unwrap();
    let report = fleetsim_core::run_simulation(&config).unwrap();
    // Generous tolerance means every cancellation here came from a full queue.
    assert!(report.cancelled > 0);
}
