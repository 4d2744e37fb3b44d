//! Travel time between stations.
//!
//! Provides a dense matrix used to order and bound route extensions.

mod matrix;

pub use matrix::TravelTimeMatrix;
