//! Планы выполнения: модель дерева и получение плана из базы

pub mod acquirer;
pub mod node;
pub mod timing;

#[cfg(test)]
mod tests;

pub use acquirer::{AcquiredPlan, DynamicTimeoutCap, PlanAcquirer, TimeoutPolicy};
pub use node::{ExplainDocument, NodeVisit, PlanNode};
pub use timing::{top_nodes_by_time, NodeTime, TimingPlan};
