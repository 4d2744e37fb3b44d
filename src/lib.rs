//! # u-rebalance
//!
//! Bike-share fleet rebalancing under stochastic demand. Each vehicle gets a
//! next target station and the number of batteries to swap and charged or
//! flat bikes to pick up or drop off there.
//!
//! ## Modules
//!
//! - [`models`] — Domain model types (Station, Vehicle, Route, Pattern, Scenario, MasterSolution)
//! - [`distance`] — Travel time matrix
//! - [`scenario`] — Poisson demand scenario generation
//! - [`generation`] — Route and loading pattern enumeration
//! - [`optimizer`] — Solver-independent formulations and the `good_lp` backend
//! - [`evaluation`] — Per-scenario allocation subproblems and score tables
//! - [`master`] — Fleet-wide selection and solution extraction
//! - [`heuristic`] — End-to-end planning runs
//! - [`config`] — Run configuration, TOML loading
//! - [`error`] — Error taxonomy

pub mod config;
pub mod distance;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod heuristic;
pub mod master;
pub mod models;
pub mod optimizer;
pub mod scenario;
