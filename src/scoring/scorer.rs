//! Весовая функция и проверка весов

use crate::common::constants::WEIGHT_SUM_TOLERANCE;
use crate::common::{Error, EvaluationConfig, Result};
use crate::metrics::Metrics;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Нормированное значение метрики: 1 при нуле, стремится к 0 на бесконечности
pub fn term(x: f64) -> f64 {
    // NaN и отрицательные значения считаются нулем
    let x = if x > 0.0 { x } else { 0.0 };
    1.0 / (1.0 + x.ln_1p())
}

/// Режим оценки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// Чтения и стоимость
    NoTime,
    /// Чтения, медианное время и стоимость
    WithTime,
}

/// Проверенный набор весов
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Вес чтений разделяемых блоков
    pub read: f64,
    /// Вес времени, отсутствует в режиме без замеров
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// Вес стоимости
    pub cost: f64,
}

impl ScoreWeights {
    /// Веса (чтения, стоимость)
    pub fn no_time(read: f64, cost: f64) -> Result<Self> {
        validate_weights(&[("read", read), ("cost", cost)])?;
        Ok(Self {
            read,
            time: None,
            cost,
        })
    }

    /// Веса (чтения, время, стоимость)
    pub fn with_time(read: f64, time: f64, cost: f64) -> Result<Self> {
        validate_weights(&[("read", read), ("time", time), ("cost", cost)])?;
        Ok(Self {
            read,
            time: Some(time),
            cost,
        })
    }

    /// Режим, которому соответствуют веса
    pub fn mode(&self) -> ScoreMode {
        match self.time {
            Some(_) => ScoreMode::WithTime,
            None => ScoreMode::NoTime,
        }
    }
}

fn validate_weights(weights: &[(&str, f64)]) -> Result<()> {
    for (name, weight) in weights {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(Error::invalid_weights(format!(
                "weight '{}' must be a finite non-negative number, got {}",
                name, weight
            )));
        }
    }
    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(Error::invalid_weights(format!(
            "weights must sum to 1, got {}",
            sum
        )));
    }
    Ok(())
}

/// Слагаемое оценки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    /// Имя метрики
    pub metric: String,
    /// Исходное значение
    pub value: f64,
    /// Нормированное значение
    pub term: f64,
    /// Вес
    pub weight: f64,
}

/// Итоговая оценка вместе со слагаемыми
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Сводная оценка в `(0, 1]`
    pub combined_score: f64,
    /// Режим
    pub mode: ScoreMode,
    /// Использованные веса
    pub weights: ScoreWeights,
    /// Слагаемые
    pub components: Vec<ScoreComponent>,
}

/// Вычислитель оценки
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    no_time: ScoreWeights,
    with_time: ScoreWeights,
}

impl Default for Scorer {
    fn default() -> Self {
        let (read, cost) = crate::common::constants::DEFAULT_WEIGHTS_NO_TIME;
        let (t_read, t_time, t_cost) = crate::common::constants::DEFAULT_WEIGHTS_WITH_TIME;
        Self {
            no_time: ScoreWeights {
                read,
                time: None,
                cost,
            },
            with_time: ScoreWeights {
                read: t_read,
                time: Some(t_time),
                cost: t_cost,
            },
        }
    }
}

impl Scorer {
    /// Создает вычислитель из двух наборов весов
    pub fn new(no_time: ScoreWeights, with_time: ScoreWeights) -> Result<Self> {
        if no_time.mode() != ScoreMode::NoTime || with_time.mode() != ScoreMode::WithTime {
            return Err(Error::invalid_weights(
                "expected (read, cost) and (read, time, cost) weight sets",
            ));
        }
        Ok(Self { no_time, with_time })
    }

    /// Создает вычислитель из конфигурации
    pub fn from_config(config: &EvaluationConfig) -> Result<Self> {
        let (read, cost) = config.weights_no_time;
        let (t_read, t_time, t_cost) = config.weights_with_time;
        Self::new(
            ScoreWeights::no_time(read, cost)?,
            ScoreWeights::with_time(t_read, t_time, t_cost)?,
        )
    }

    /// Вычисляет оценку. Время учитывается, только если оно измерено.
    pub fn score(&self, metrics: &Metrics, median_ms: Option<f64>) -> ScoreResult {
        let reads = metrics.shared_read_blocks as f64;
        let cost = metrics.total_cost;

        let (weights, components) = match median_ms.filter(|ms| ms.is_finite()) {
            Some(ms) => {
                let w = self.with_time;
                (
                    w,
                    vec![
                        component("shared_read_blocks", reads, w.read),
                        component("median_ms", ms, w.time.unwrap_or(0.0)),
                        component("total_cost", cost, w.cost),
                    ],
                )
            }
            None => {
                let w = self.no_time;
                (
                    w,
                    vec![
                        component("shared_read_blocks", reads, w.read),
                        component("total_cost", cost, w.cost),
                    ],
                )
            }
        };

        let combined: f64 = components.iter().map(|c| c.weight * c.term).sum();

        ScoreResult {
            combined_score: combined.min(1.0),
            mode: weights.mode(),
            weights,
            components,
        }
    }
}

fn component(metric: &str, value: f64, weight: f64) -> ScoreComponent {
    ScoreComponent {
        metric: metric.to_string(),
        value,
        term: term(value),
        weight,
    }
}

/// Порядок кандидатов для отбора: оценка по убыванию, затем чтения и
/// стоимость по возрастанию. `Less` означает, что `a` идет раньше `b`.
pub fn compare_ranked(
    a: (&ScoreResult, &Metrics),
    b: (&ScoreResult, &Metrics),
) -> Ordering {
    b.0.combined_score
        .total_cmp(&a.0.combined_score)
        .then_with(|| a.1.shared_read_blocks.cmp(&b.1.shared_read_blocks))
        .then_with(|| a.1.total_cost.total_cmp(&b.1.total_cost))
}
