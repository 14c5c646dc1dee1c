//! Error types for the simulation core.

use fleetsim_policies::ControlError;
use thiserror::Error;

/// Failures in the simulation engine and its collaborators.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("request {id} has negative service duration {duration}")]
    NegativeServiceDuration { id: u64, duration: f64 },
    #[error("event '{label}' at t={time} has already been triggered")]
    AlreadyTriggered { label: &'static str, time: f64 },
    #[error("cannot schedule '{label}' at t={time}, clock is already at t={now}")]
    ScheduleInPast {
        label: &'static str,
        time: f64,
        now: f64,
    },
    #[error("pull from empty queue on server {server}")]
    EmptyQueue { server: u32 },
    #[error("unknown request id {id}")]
    UnknownRequest { id: u64 },
    #[error("unknown routing policy '{0}'")]
    UnknownPolicy(String),
    #[error("scaling controller failed: {0}")]
    Control(#[from] ControlError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
