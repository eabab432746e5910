//! Замеры времени выполнения SELECT
//!
//! Один прогревочный запуск, затем N последовательных замеров. Запуски
//! никогда не выполняются параллельно: иначе они делили бы буферный кэш.

use crate::common::{QuerySpec, Result};
use crate::executor::{bounded, QueryExecutor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Сводка замеров
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    /// Количество замеров
    pub runs: u32,
    /// Замеры в миллисекундах
    pub samples_ms: Vec<f64>,
    /// Медиана
    pub median_ms: f64,
    /// 95-й перцентиль
    pub p95_ms: f64,
}

impl TimingSummary {
    /// Строит сводку по замерам; `None` для пустого списка
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let samples_ms: Vec<f64> = samples
            .iter()
            .map(|d| round3(d.as_secs_f64() * 1000.0))
            .collect();
        let mut sorted = samples_ms.clone();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        let p95_index = ((n as f64 * 0.95) as usize).saturating_sub(1);

        Some(Self {
            runs: n as u32,
            samples_ms,
            median_ms: round3(median),
            p95_ms: sorted[p95_index],
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Выполняет прогрев и `runs` замеров. Любая ошибка прерывает замеры.
pub async fn measure<E: QueryExecutor>(
    executor: &mut E,
    query: &QuerySpec,
    runs: u32,
    timeout: Option<Duration>,
) -> Result<Option<TimingSummary>> {
    if runs == 0 {
        return Ok(None);
    }

    bounded("timed select", timeout, executor.run(query, timeout)).await?;

    let mut samples = Vec::with_capacity(runs as usize);
    for _ in 0..runs {
        let elapsed = bounded("timed select", timeout, executor.run(query, timeout)).await?;
        samples.push(elapsed);
    }

    let summary = TimingSummary::from_samples(&samples);
    if let Some(summary) = &summary {
        log::debug!(
            "Замеры SELECT: медиана {} мс, p95 {} мс",
            summary.median_ms,
            summary.p95_ms
        );
    }
    Ok(summary)
}
