//! Planning run configuration.
//!
//! All sections have defaults, so a TOML file only needs the values it
//! overrides.
//!
//! # Examples
//!
//! ```
//! use u_rebalance::config::PlanningConfig;
//!
//! let config = PlanningConfig::from_toml_str(r#"
//!     scenario_count = 5
//!     horizon = 12
//!     seed = 7
//!
//!     [reward]
//!     w_v = 2.0
//!
//!     [routes]
//!     max_stops = 4
//! "#).unwrap();
//!
//! assert_eq!(config.scenario_count, 5);
//! assert_eq!(config.reward.w_v, 2.0);
//! assert_eq!(config.reward.w_r, 1.0);
//! assert_eq!(config.routes.max_stops, 4);
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PlanningError;

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] PlanningError),
}

/// Top-level configuration of a planning run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Number of demand scenarios drawn per run.
    pub scenario_count: usize,
    /// Number of discrete time steps in the planning horizon.
    pub horizon: u32,
    /// Seed for the scenario random stream.
    pub seed: u64,
    /// Distance units travelled per time step.
    pub travel_speed: f64,
    pub reward: RewardConfig,
    pub routes: RouteConfig,
    pub optimizer: OptimizerConfig,
    pub master: MasterConfig,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            scenario_count: 2,
            horizon: 25,
            seed: 0,
            travel_speed: 1.0,
            reward: RewardConfig::default(),
            routes: RouteConfig::default(),
            optimizer: OptimizerConfig::default(),
            master: MasterConfig::default(),
        }
    }
}

impl PlanningConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid TOML, or
    /// fails [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string (no validation).
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Sets the scenario count.
    pub fn with_scenario_count(mut self, count: usize) -> Self {
        self.scenario_count = count;
        self
    }

    /// Sets the horizon length in time steps.
    pub fn with_horizon(mut self, horizon: u32) -> Self {
        self.horizon = horizon;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replaces the reward section.
    pub fn with_reward(mut self, reward: RewardConfig) -> Self {
        self.reward = reward;
        self
    }

    /// Replaces the route search section.
    pub fn with_routes(mut self, routes: RouteConfig) -> Self {
        self.routes = routes;
        self
    }

    /// Replaces the master section.
    pub fn with_master(mut self, master: MasterConfig) -> Self {
        self.master = master;
        self
    }

    /// Checks every section, failing on the first invalid value.
    pub fn validate(&self) -> Result<(), PlanningError> {
        if self.scenario_count == 0 {
            return Err(invalid("scenario_count must be at least 1"));
        }
        if self.horizon == 0 {
            return Err(invalid("horizon must be at least 1"));
        }
        if !self.travel_speed.is_finite() || self.travel_speed <= 0.0 {
            return Err(invalid("travel_speed must be positive and finite"));
        }
        self.reward.validate()?;
        self.routes.validate()?;
        self.optimizer.validate()?;
        self.master.validate()
    }
}

/// Objective weights and base rewards.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Weight of the violation term (`W_V`).
    pub w_v: f64,
    /// Weight of the bonus term (`W_R`).
    pub w_r: f64,
    /// Base violation-term reward (`V_O`).
    pub base_reward: f64,
    /// Base bonus reward (`R_O`).
    pub base_bonus_reward: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            w_v: 1.0,
            w_r: 1.0,
            base_reward: 0.0,
            base_bonus_reward: 0.0,
        }
    }
}

impl RewardConfig {
    fn validate(&self) -> Result<(), PlanningError> {
        for (name, value) in [("w_v", self.w_v), ("w_r", self.w_r)] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(&format!("reward.{name} must be finite and >= 0")));
            }
        }
        for (name, value) in [
            ("base_reward", self.base_reward),
            ("base_bonus_reward", self.base_bonus_reward),
        ] {
            if !value.is_finite() {
                return Err(invalid(&format!("reward.{name} must be finite")));
            }
        }
        Ok(())
    }
}

/// Bounds on the route search.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Maximum stations per route, including the start.
    pub max_stops: usize,
    /// Maximum routes emitted per vehicle.
    pub max_routes: usize,
    /// Nearest unvisited stations tried per extension.
    pub branching: usize,
    /// Maximum cumulative travel time of a route.
    pub max_duration: Option<f64>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            max_stops: 3,
            max_routes: 64,
            branching: 4,
            max_duration: None,
        }
    }
}

impl RouteConfig {
    fn validate(&self) -> Result<(), PlanningError> {
        if self.max_stops < 2 {
            return Err(invalid("routes.max_stops must be at least 2"));
        }
        if self.max_routes == 0 {
            return Err(invalid("routes.max_routes must be at least 1"));
        }
        if self.branching == 0 {
            return Err(invalid("routes.branching must be at least 1"));
        }
        if let Some(d) = self.max_duration {
            if !d.is_finite() || d < 0.0 {
                return Err(invalid("routes.max_duration must be finite and >= 0"));
            }
        }
        Ok(())
    }
}

/// Time budgets for optimizer calls.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Budget per subproblem solve, in seconds.
    pub subproblem_time_limit_secs: Option<f64>,
    /// Budget for the master solve, in seconds.
    pub master_time_limit_secs: Option<f64>,
}

impl OptimizerConfig {
    /// Subproblem budget as a [`Duration`].
    pub fn subproblem_time_limit(&self) -> Option<Duration> {
        self.subproblem_time_limit_secs.map(Duration::from_secs_f64)
    }

    /// Master budget as a [`Duration`].
    pub fn master_time_limit(&self) -> Option<Duration> {
        self.master_time_limit_secs.map(Duration::from_secs_f64)
    }

    fn validate(&self) -> Result<(), PlanningError> {
        for (name, limit) in [
            ("subproblem_time_limit_secs", self.subproblem_time_limit_secs),
            ("master_time_limit_secs", self.master_time_limit_secs),
        ] {
            if let Some(secs) = limit {
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(invalid(&format!("optimizer.{name} must be positive")));
                }
            }
        }
        Ok(())
    }
}

/// Master selection options.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MasterConfig {
    /// At most one vehicle may target a station with a non-idle candidate.
    pub exclusive_targets: bool,
    /// Weight of the target-station allocation term relative to scores.
    pub quantity_weight: f64,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            exclusive_targets: false,
            quantity_weight: 1e-3,
        }
    }
}

impl MasterConfig {
    fn validate(&self) -> Result<(), PlanningError> {
        if !self.quantity_weight.is_finite() || self.quantity_weight < 0.0 {
            return Err(invalid("master.quantity_weight must be finite and >= 0"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> PlanningError {
    PlanningError::Configuration(msg.to_string())
}
