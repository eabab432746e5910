//! A/B эксперименты с индексами
//!
//! Индекс принимается, только если обе оценки корректны, основная метрика
//! улучшилась не менее чем вдвое и ни одна метрика не ухудшилась больше
//! чем на 10%.

pub mod policy;

pub use policy::{
    ABDecision, AbOutcome, AbPolicy, AbRule, AbSide, ExperimentSide, MetricDelta, TrackedMetric,
};
