//! Candidate enumeration.
//!
//! - [`RoutePatternGenerator`] — Bounded breadth-first route search with per-route loading patterns

mod route_pattern;

pub use route_pattern::{patterns_for, RouteCandidates, RoutePatternGenerator};
