//! Master selection and solution extraction.
//!
//! - [`MasterSelector`] — Mixed-integer selection of one candidate per vehicle
//! - [`SolutionExtractor`] — Typed assignment → [`MasterSolution`](crate::models::MasterSolution)

mod extractor;
mod selector;

pub use extractor::{SolutionExtractor, INTEGRALITY_TOLERANCE};
pub use selector::{MasterAssignment, MasterCandidate, MasterSelector};
