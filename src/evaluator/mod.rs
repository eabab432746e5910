//! Оценка кандидатов и сохраняемые записи

#[allow(clippy::module_inception)]
pub mod evaluator;
pub mod record;
pub mod timing;

#[cfg(test)]
mod tests;

pub use evaluator::{EvaluationRequest, Evaluator};
pub use record::{EvaluationRecord, RunSettings};
pub use timing::TimingSummary;
