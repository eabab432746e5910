//! Правило принятия индекса в A/B эксперименте

use crate::common::constants::{AB_MAX_REGRESSION_RATIO, AB_REQUIRED_IMPROVEMENT_FACTOR};
use crate::common::{Error, Result};
use crate::equivalence::EquivalenceVerdict;
use crate::evaluator::{EvaluationRecord, RunSettings};
use crate::metrics::Metrics;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Отслеживаемая метрика
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedMetric {
    /// Чтения разделяемых блоков
    Reads,
    /// Стоимость корня плана
    Cost,
    /// Временные блоки
    TempBlocks,
    /// Строки, отброшенные фильтрами
    RowsRemoved,
    /// Медианное время SELECT
    MedianMs,
}

impl TrackedMetric {
    /// Основные метрики, одна из которых должна улучшиться
    pub const PRIMARY: [TrackedMetric; 2] = [TrackedMetric::Reads, TrackedMetric::Cost];

    fn value(self, side: &AbSide<'_>) -> Option<f64> {
        let metrics = side.metrics?;
        match self {
            TrackedMetric::Reads => Some(metrics.shared_read_blocks as f64),
            TrackedMetric::Cost => Some(metrics.total_cost),
            TrackedMetric::TempBlocks => Some(metrics.temp_blocks() as f64),
            TrackedMetric::RowsRemoved => Some(metrics.rows_removed_by_filter),
            TrackedMetric::MedianMs => side.median_ms,
        }
    }
}

impl fmt::Display for TrackedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackedMetric::Reads => "reads",
            TrackedMetric::Cost => "cost",
            TrackedMetric::TempBlocks => "temp_blocks",
            TrackedMetric::RowsRemoved => "rows_removed",
            TrackedMetric::MedianMs => "median_ms",
        };
        f.write_str(name)
    }
}

/// Сторона эксперимента
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentSide {
    /// Без индекса
    Before,
    /// С индексом
    After,
}

impl fmt::Display for ExperimentSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExperimentSide::Before => "before",
            ExperimentSide::After => "after",
        })
    }
}

/// Исход эксперимента
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbOutcome {
    /// Индекс принят
    Accept,
    /// Индекс отклонен
    Reject,
}

/// Сработавшее правило
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AbRule {
    /// Все условия выполнены
    Accepted {
        /// Улучшившаяся основная метрика
        improved: TrackedMetric,
    },
    /// Одна из сторон не прошла проверку эквивалентности
    FunctionalFailure {
        /// Сторона
        side: ExperimentSide,
    },
    /// Ни одна основная метрика не улучшилась вдвое
    NoPrimaryImprovement,
    /// Метрика ухудшилась больше допустимого
    Regression {
        /// Метрика
        metric: TrackedMetric,
    },
}

impl fmt::Display for AbRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbRule::Accepted { improved } => write!(f, "accepted: {} improved ≥2x", improved),
            AbRule::FunctionalFailure { side } => write!(f, "functional_ok=false: {}", side),
            AbRule::NoPrimaryImprovement => write!(f, "no primary metric improved ≥2x"),
            AbRule::Regression { metric } => write!(f, "regression>10%: {}", metric),
        }
    }
}

/// Изменение метрики
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    /// Метрика
    pub metric: TrackedMetric,
    /// Значение без индекса
    pub before: f64,
    /// Значение с индексом
    pub after: f64,
    /// Отношение after / before, если before > 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
}

/// Решение по эксперименту
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ABDecision {
    /// Исход
    pub outcome: AbOutcome,
    /// Сработавшее правило
    pub rule: AbRule,
    /// Текст правила
    pub rule_text: String,
    /// Изменения отслеживаемых метрик
    pub deltas: Vec<MetricDelta>,
}

impl ABDecision {
    fn new(outcome: AbOutcome, rule: AbRule, deltas: Vec<MetricDelta>) -> Self {
        Self {
            outcome,
            rule_text: rule.to_string(),
            rule,
            deltas,
        }
    }

    /// Принят ли индекс
    pub fn accepted(&self) -> bool {
        self.outcome == AbOutcome::Accept
    }
}

/// Одна сторона эксперимента: метрики, вердикт и настройки запуска
#[derive(Debug, Clone, Copy)]
pub struct AbSide<'a> {
    /// Метрики (отсутствуют, если проверка эквивалентности не пройдена)
    pub metrics: Option<&'a Metrics>,
    /// Вердикт эквивалентности
    pub verdict: &'a EquivalenceVerdict,
    /// Медианное время SELECT
    pub median_ms: Option<f64>,
    /// Настройки запуска
    pub settings: &'a RunSettings,
    /// Таймаут, действовавший при получении плана (мс)
    pub effective_timeout_ms: Option<u64>,
}

impl<'a> AbSide<'a> {
    /// Сторона из сохраненной оценки
    pub fn from_record(record: &'a EvaluationRecord) -> Self {
        Self {
            metrics: record.metrics.as_ref(),
            verdict: &record.verdict,
            median_ms: record.timing.as_ref().map(|t| t.median_ms),
            settings: &record.settings,
            effective_timeout_ms: record.effective_timeout_ms,
        }
    }
}

/// Правило принятия индекса
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbPolicy {
    /// Во сколько раз должна улучшиться основная метрика
    pub improvement_factor: f64,
    /// Допустимое отношение after / before для любой метрики
    pub max_regression_ratio: f64,
}

impl Default for AbPolicy {
    fn default() -> Self {
        Self {
            improvement_factor: AB_REQUIRED_IMPROVEMENT_FACTOR,
            max_regression_ratio: AB_MAX_REGRESSION_RATIO,
        }
    }
}

impl AbPolicy {
    /// Принимает решение по двум оценкам: без индекса и с индексом.
    ///
    /// Оценки с разными настройками запуска сравнивать нельзя, это ошибка
    /// конфигурации, а не отказ.
    pub fn decide(&self, before: &AbSide<'_>, after: &AbSide<'_>) -> Result<ABDecision> {
        if before.settings != after.settings {
            return Err(Error::configuration(format!(
                "A/B sides were evaluated with different settings: {:?} vs {:?}",
                before.settings, after.settings
            )));
        }

        // Сторона без плана (не прошла проверку) таймаута не имеет
        if let (Some(b), Some(a)) = (before.effective_timeout_ms, after.effective_timeout_ms) {
            if b != a {
                return Err(Error::configuration(format!(
                    "A/B sides ran under different effective timeouts: {} ms vs {} ms",
                    b, a
                )));
            }
        }

        let deltas = self.deltas(before, after);

        for (side, data) in [(ExperimentSide::Before, before), (ExperimentSide::After, after)] {
            if !data.verdict.functional_ok {
                return Ok(ABDecision::new(
                    AbOutcome::Reject,
                    AbRule::FunctionalFailure { side },
                    deltas,
                ));
            }
            if data.metrics.is_none() {
                return Err(Error::internal(format!(
                    "{} side passed equivalence but carries no metrics",
                    side
                )));
            }
        }

        let improved = TrackedMetric::PRIMARY.into_iter().find(|metric| {
            deltas
                .iter()
                .find(|d| d.metric == *metric)
                .is_some_and(|d| d.before > 0.0 && d.after <= d.before / self.improvement_factor)
        });
        let Some(improved) = improved else {
            return Ok(ABDecision::new(
                AbOutcome::Reject,
                AbRule::NoPrimaryImprovement,
                deltas,
            ));
        };

        if let Some(regressed) = deltas
            .iter()
            .find(|d| d.after > d.before * self.max_regression_ratio)
        {
            let rule = AbRule::Regression {
                metric: regressed.metric,
            };
            return Ok(ABDecision::new(AbOutcome::Reject, rule, deltas));
        }

        Ok(ABDecision::new(
            AbOutcome::Accept,
            AbRule::Accepted { improved },
            deltas,
        ))
    }

    fn deltas(&self, before: &AbSide<'_>, after: &AbSide<'_>) -> Vec<MetricDelta> {
        [
            TrackedMetric::Reads,
            TrackedMetric::Cost,
            TrackedMetric::TempBlocks,
            TrackedMetric::RowsRemoved,
            TrackedMetric::MedianMs,
        ]
        .into_iter()
        .filter_map(|metric| {
            let before = metric.value(before)?;
            let after = metric.value(after)?;
            Some(MetricDelta {
                metric,
                before,
                after,
                ratio: (before > 0.0).then(|| after / before),
            })
        })
        .collect()
    }
}
