//! Сравнение результатов базового запроса и кандидата

use crate::common::constants::{DEFAULT_FLOAT_EPSILON, DEFAULT_MAX_REPORTED_MISMATCHES};
use crate::common::{ColumnKind, EvaluationConfig, QuerySpec, Result, ResultSet, Row, Value};
use crate::equivalence::cache::{CacheKey, NoopResultCache, ResultCache};
use crate::executor::{bounded, QueryExecutor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Вид расхождения строки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Значения в строке различаются
    Value,
    /// Те же строки, но в другом порядке
    Order,
    /// Строка есть только у базового запроса
    Missing,
    /// Строка есть только у кандидата
    Extra,
}

/// Расхождение в одной позиции
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMismatch {
    /// Номер строки (с нуля)
    pub row: usize,
    /// Вид расхождения
    pub kind: MismatchKind,
    /// Строка базового запроса
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Row>,
    /// Строка кандидата
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<Row>,
    /// Номера различающихся колонок
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<usize>,
}

/// Структурированное описание расхождений
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDiff {
    /// Строк у базового запроса
    pub baseline_rows: usize,
    /// Строк у кандидата
    pub candidate_rows: usize,
    /// Несовпадение набора колонок
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_mismatch: Option<String>,
    /// Различается количество строк
    pub row_count_mismatch: bool,
    /// Строки совпадают как мультимножества, различается только порядок
    pub order_only: bool,
    /// Всего различающихся позиций
    pub total_mismatches: usize,
    /// Первые расхождения
    pub mismatches: Vec<RowMismatch>,
}

impl fmt::Display for ResultDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(columns) = &self.column_mismatch {
            return write!(f, "column mismatch: {}", columns);
        }
        if self.row_count_mismatch {
            write!(
                f,
                "row count mismatch: {} vs {}, ",
                self.baseline_rows, self.candidate_rows
            )?;
        } else if self.order_only {
            write!(f, "order mismatch, ")?;
        }
        write!(f, "{} mismatching rows", self.total_mismatches)
    }
}

/// Вердикт проверки эквивалентности
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceVerdict {
    /// Результаты совпадают
    pub functional_ok: bool,
    /// Расхождения, если результаты не совпали
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<ResultDiff>,
}

impl EquivalenceVerdict {
    /// Результаты совпали
    pub fn passed() -> Self {
        Self {
            functional_ok: true,
            diff: None,
        }
    }

    /// Результаты не совпали
    pub fn failed(diff: ResultDiff) -> Self {
        Self {
            functional_ok: false,
            diff: Some(diff),
        }
    }
}

/// Проверка эквивалентности результатов
#[derive(Clone)]
pub struct EquivalenceChecker {
    float_epsilon: f64,
    max_reported_mismatches: usize,
    cache: Arc<dyn ResultCache>,
}

impl fmt::Debug for EquivalenceChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EquivalenceChecker")
            .field("float_epsilon", &self.float_epsilon)
            .field("max_reported_mismatches", &self.max_reported_mismatches)
            .field("cache", &self.cache.statistics())
            .finish()
    }
}

impl Default for EquivalenceChecker {
    fn default() -> Self {
        Self::new(DEFAULT_FLOAT_EPSILON, DEFAULT_MAX_REPORTED_MISMATCHES)
    }
}

impl EquivalenceChecker {
    /// Создает проверку без кэша
    pub fn new(float_epsilon: f64, max_reported_mismatches: usize) -> Self {
        Self {
            float_epsilon,
            max_reported_mismatches,
            cache: Arc::new(NoopResultCache),
        }
    }

    /// Создает проверку из конфигурации
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::new(config.float_epsilon, config.max_reported_mismatches)
    }

    /// Подключает кэш результатов базового запроса
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Кэш результатов базового запроса
    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    /// Выполняет оба запроса и сравнивает результаты.
    ///
    /// Результат базового запроса берется из кэша, если он там есть.
    pub async fn check<E: QueryExecutor>(
        &self,
        executor: &mut E,
        baseline: &QuerySpec,
        candidate: &QuerySpec,
        timeout: Option<Duration>,
    ) -> Result<EquivalenceVerdict> {
        let key = CacheKey::for_query(baseline);
        let baseline_rows = match self.cache.get(&key) {
            Some(cached) => {
                log::debug!("Результат базового запроса взят из кэша");
                cached
            }
            None => {
                let fetched = bounded(
                    "baseline fetch",
                    timeout,
                    executor.fetch(baseline, timeout),
                )
                .await?;
                let fetched = Arc::new(fetched);
                self.cache.put(key, Arc::clone(&fetched));
                fetched
            }
        };

        let candidate_rows = bounded(
            "candidate fetch",
            timeout,
            executor.fetch(candidate, timeout),
        )
        .await?;

        let verdict = self.compare(&baseline_rows, &candidate_rows);
        match &verdict.diff {
            Some(diff) => log::info!("Кандидат не эквивалентен базовому запросу: {}", diff),
            None => log::debug!(
                "Результаты совпали ({} строк)",
                candidate_rows.row_count()
            ),
        }
        Ok(verdict)
    }

    /// Сравнивает два результата как упорядоченные последовательности строк
    pub fn compare(&self, baseline: &ResultSet, candidate: &ResultSet) -> EquivalenceVerdict {
        let mut diff = ResultDiff {
            baseline_rows: baseline.row_count(),
            candidate_rows: candidate.row_count(),
            row_count_mismatch: baseline.row_count() != candidate.row_count(),
            ..ResultDiff::default()
        };

        if baseline.columns.len() != candidate.columns.len() {
            diff.column_mismatch = Some(format!(
                "baseline has {} columns, candidate has {}",
                baseline.columns.len(),
                candidate.columns.len()
            ));
            diff.total_mismatches = diff.baseline_rows.max(diff.candidate_rows).max(1);
            return EquivalenceVerdict::failed(diff);
        }

        let float_columns: Vec<bool> = (0..baseline.columns.len())
            .map(|i| {
                baseline.column_kind(i) == ColumnKind::Float
                    || candidate.column_kind(i) == ColumnKind::Float
            })
            .collect();

        let common = baseline.row_count().min(candidate.row_count());
        for row in 0..common {
            let columns =
                self.differing_columns(&baseline.rows[row], &candidate.rows[row], &float_columns);
            if !columns.is_empty() {
                self.record(
                    &mut diff,
                    RowMismatch {
                        row,
                        kind: MismatchKind::Value,
                        baseline: Some(baseline.rows[row].clone()),
                        candidate: Some(candidate.rows[row].clone()),
                        columns,
                    },
                );
            }
        }
        for row in common..baseline.row_count() {
            self.record(
                &mut diff,
                RowMismatch {
                    row,
                    kind: MismatchKind::Missing,
                    baseline: Some(baseline.rows[row].clone()),
                    candidate: None,
                    columns: Vec::new(),
                },
            );
        }
        for row in common..candidate.row_count() {
            self.record(
                &mut diff,
                RowMismatch {
                    row,
                    kind: MismatchKind::Extra,
                    baseline: None,
                    candidate: Some(candidate.rows[row].clone()),
                    columns: Vec::new(),
                },
            );
        }

        if diff.total_mismatches == 0 {
            return EquivalenceVerdict::passed();
        }

        if !diff.row_count_mismatch && self.same_multiset(baseline, candidate, &float_columns) {
            diff.order_only = true;
            for mismatch in &mut diff.mismatches {
                mismatch.kind = MismatchKind::Order;
            }
        }

        EquivalenceVerdict::failed(diff)
    }

    fn record(&self, diff: &mut ResultDiff, mismatch: RowMismatch) {
        diff.total_mismatches += 1;
        if diff.mismatches.len() < self.max_reported_mismatches {
            diff.mismatches.push(mismatch);
        }
    }

    fn differing_columns(&self, baseline: &[Value], candidate: &[Value], float_columns: &[bool]) -> Vec<usize> {
        (0..baseline.len().max(candidate.len()))
            .filter(|&i| match (baseline.get(i), candidate.get(i)) {
                (Some(a), Some(b)) => !self.values_match(
                    a,
                    b,
                    float_columns.get(i).copied().unwrap_or(false),
                ),
                _ => true,
            })
            .collect()
    }

    fn rows_match(&self, baseline: &[Value], candidate: &[Value], float_columns: &[bool]) -> bool {
        self.differing_columns(baseline, candidate, float_columns).is_empty()
    }

    fn values_match(&self, a: &Value, b: &Value, float_column: bool) -> bool {
        match (a, b) {
            (Value::Float(x), Value::Float(y)) if float_column => {
                floats_match(*x, *y, self.float_epsilon)
            }
            (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
            _ => a == b,
        }
    }

    fn same_multiset(&self, baseline: &ResultSet, candidate: &ResultSet, float_columns: &[bool]) -> bool {
        let key = |row: &Row| -> String {
            row.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("\u{1f}")
        };
        let mut a: Vec<&Row> = baseline.rows.iter().collect();
        let mut b: Vec<&Row> = candidate.rows.iter().collect();
        a.sort_by_cached_key(|row| key(*row));
        b.sort_by_cached_key(|row| key(*row));
        a.iter()
            .zip(b.iter())
            .all(|(ra, rb)| self.rows_match(ra, rb, float_columns))
    }
}

/// Сравнение с относительным допуском. NaN равен NaN, как в PostgreSQL.
#[allow(clippy::float_cmp)]
fn floats_match(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b || (a.is_nan() && b.is_nan()) {
        return true;
    }
    let denom = a.abs().max(b.abs());
    if denom == 0.0 {
        return (a - b).abs() <= tolerance;
    }
    (a - b).abs() / denom <= tolerance
}
