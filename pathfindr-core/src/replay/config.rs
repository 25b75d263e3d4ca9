use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Timing and limits for stepping and recording a search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Search steps per second when the host ticks in real time
    pub steps_per_second: f64,
    /// Seconds between route-tracing hops
    pub route_trace_interval: f64,
    /// Step cap for a visualized run
    pub max_steps: usize,
    /// Step cap for instant and background runs
    pub instant_max_steps: usize,
    /// Timeline milliseconds per metre of segment length
    pub distance_time_multiplier: f64,
    pub exploration_speed_multiplier: f64,
    /// Below 1.0 draws the final route faster than the exploration
    pub route_speed_multiplier: f64,
    /// Segments shorter than this many metres are rejected
    pub zero_length_epsilon_m: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            steps_per_second: 100.0,
            route_trace_interval: 0.05,
            max_steps: 1_000,
            instant_max_steps: 100_000,
            // 50 000 ms per degree, about 111 139 m
            distance_time_multiplier: 50_000.0 / 111_139.0,
            exploration_speed_multiplier: 1.0,
            route_speed_multiplier: 0.5,
            zero_length_epsilon_m: 1e-3,
        }
    }
}

impl ExecutorConfig {
    /// Delay between search steps for the host scheduler
    pub fn tick_interval(&self) -> Result<Duration, Error> {
        interval("steps_per_second", 1.0 / self.steps_per_second)
    }

    /// Delay between route-tracing hops
    pub fn trace_interval(&self) -> Result<Duration, Error> {
        interval("route_trace_interval", self.route_trace_interval)
    }

    /// Rejects settings that cannot be turned into scheduler delays.
    pub fn validate(&self) -> Result<(), Error> {
        self.tick_interval()?;
        self.trace_interval()?;
        Ok(())
    }
}

fn interval(name: &str, secs: f64) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(secs)
        .map_err(|err| Error::InvalidConfig(format!("{name} gives no usable interval: {err}")))
}
