//! queryeval - оценка кандидатов на оптимизацию SQL запросов
//!
//! Для каждого кандидата (переписанного запроса или нового индекса)
//! получает план выполнения с фактическими счетчиками, сворачивает его в
//! метрики, проверяет совпадение результата с базовым запросом, выставляет
//! сводную оценку и строит отчет об узких местах. Для экспериментов с
//! индексами принимает решение "принять или отклонить" по паре оценок.

pub mod ab;
pub mod cli;
pub mod common;
pub mod equivalence;
pub mod evaluator;
pub mod executor;
pub mod metrics;
pub mod plan;
pub mod report;
pub mod scoring;

pub use ab::{ABDecision, AbPolicy, AbSide};
pub use common::error::{Error, Result};
pub use common::types::*;
pub use common::{AppConfig, ConnectionConfig, EvaluationConfig};
pub use equivalence::{EquivalenceChecker, EquivalenceVerdict, InMemoryResultCache, ResultCache};
pub use evaluator::{EvaluationRecord, EvaluationRequest, Evaluator};
pub use executor::{PsqlExecutor, QueryExecutor, RecordedExecutor};
pub use metrics::Metrics;
pub use plan::{ExplainDocument, PlanNode};
pub use report::{BottleneckReport, Selection};
pub use scoring::{ScoreResult, Scorer};

/// Версия библиотеки
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
