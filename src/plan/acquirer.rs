//! Получение плана выполнения
//!
//! Запрос выполняется по-настоящему (EXPLAIN ANALYZE), поэтому каждый вызов
//! прогревает буферный кэш; повторные замеры на тех же данных сходятся.

use crate::common::constants::*;
use crate::common::{EvaluationConfig, QuerySpec, Result};
use crate::executor::{bounded, QueryExecutor};
use crate::plan::timing::{top_nodes_by_time, TimingPlan};
use crate::plan::ExplainDocument;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Динамическое ограничение таймаута по истории успешных запусков
#[derive(Debug, Clone)]
pub struct DynamicTimeoutCap {
    history: VecDeque<Duration>,
    window: usize,
    min_samples: usize,
    factor: f64,
    floor: Duration,
}

impl Default for DynamicTimeoutCap {
    fn default() -> Self {
        Self {
            history: VecDeque::new(),
            window: DYNAMIC_TIMEOUT_WINDOW,
            min_samples: DYNAMIC_TIMEOUT_MIN_SAMPLES,
            factor: DYNAMIC_TIMEOUT_FACTOR,
            floor: Duration::from_millis(DYNAMIC_TIMEOUT_FLOOR_MS),
        }
    }
}

impl DynamicTimeoutCap {
    /// Создает ограничение с заданными параметрами
    pub fn new(window: usize, min_samples: usize, factor: f64, floor: Duration) -> Self {
        Self {
            history: VecDeque::with_capacity(window),
            window: window.max(1),
            min_samples: min_samples.max(1),
            factor,
            floor,
        }
    }

    /// Запоминает длительность успешного запуска
    pub fn record(&mut self, elapsed: Duration) {
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(elapsed);
    }

    /// Текущее ограничение: `max(floor, factor × самый медленный запуск)`
    pub fn cap(&self) -> Option<Duration> {
        if self.history.len() < self.min_samples {
            return None;
        }
        let slowest = self.history.iter().max()?;
        Some(slowest.mul_f64(self.factor).max(self.floor))
    }

    /// Количество запусков в истории
    pub fn samples(&self) -> usize {
        self.history.len()
    }
}

/// Политика таймаутов: статический лимит и необязательное динамическое ограничение
#[derive(Debug, Clone, Default)]
pub struct TimeoutPolicy {
    static_timeout: Option<Duration>,
    dynamic: Option<DynamicTimeoutCap>,
}

impl TimeoutPolicy {
    /// Только статический лимит
    pub fn fixed(static_timeout: Option<Duration>) -> Self {
        Self {
            static_timeout,
            dynamic: None,
        }
    }

    /// Статический лимит с динамическим ограничением
    pub fn with_dynamic_cap(static_timeout: Option<Duration>, cap: DynamicTimeoutCap) -> Self {
        Self {
            static_timeout,
            dynamic: Some(cap),
        }
    }

    /// Политика из конфигурации
    pub fn from_config(config: &EvaluationConfig) -> Self {
        if config.dynamic_timeout_disable {
            Self::fixed(config.static_timeout())
        } else {
            Self::with_dynamic_cap(config.static_timeout(), DynamicTimeoutCap::default())
        }
    }

    /// Статический лимит
    pub fn static_timeout(&self) -> Option<Duration> {
        self.static_timeout
    }

    /// Действующий лимит: меньший из статического и динамического
    pub fn effective(&self) -> Option<Duration> {
        let cap = self.dynamic.as_ref().and_then(DynamicTimeoutCap::cap);
        match (self.static_timeout, cap) {
            (Some(fixed), Some(cap)) => Some(fixed.min(cap)),
            (fixed, None) => fixed,
            (None, cap) => cap,
        }
    }

    /// Запоминает успешный запуск
    pub fn record_success(&mut self, elapsed: Duration) {
        if let Some(dynamic) = self.dynamic.as_mut() {
            dynamic.record(elapsed);
        }
    }

    /// Включено ли динамическое ограничение
    pub fn is_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }
}

/// Полученный план
#[derive(Debug, Clone)]
pub struct AcquiredPlan {
    /// Разобранный документ EXPLAIN
    pub document: ExplainDocument,
    /// Время получения плана
    pub elapsed: Duration,
    /// Лимит, действовавший при получении
    pub effective_timeout: Option<Duration>,
}

/// Получатель планов
#[derive(Debug, Clone, Default)]
pub struct PlanAcquirer {
    policy: TimeoutPolicy,
}

impl PlanAcquirer {
    /// Создает получатель с политикой таймаутов
    pub fn new(policy: TimeoutPolicy) -> Self {
        Self { policy }
    }

    /// Политика таймаутов
    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    /// Профилирующая инструкция для запроса
    pub fn profiling_statement(query: &QuerySpec) -> String {
        format!("{}\n{}", EXPLAIN_PREFIX, query.statement_text())
    }

    /// Диагностическая инструкция с TIMING ON
    pub fn timing_statement(query: &QuerySpec) -> String {
        format!("{}\n{}", EXPLAIN_TIMING_PREFIX, query.statement_text())
    }

    /// Получает диагностический план с временем по узлам.
    ///
    /// Лимит передается явно; история динамического таймаута не
    /// пополняется, так как TIMING ON замедляет выполнение.
    pub async fn acquire_timing<E: QueryExecutor>(
        &self,
        executor: &mut E,
        query: &QuerySpec,
        timeout: Option<Duration>,
    ) -> Result<TimingPlan> {
        let statement = Self::timing_statement(query);
        let started = Instant::now();
        let raw = bounded(
            "timing plan acquisition",
            timeout,
            executor.explain(&statement, query, timeout),
        )
        .await?;
        let elapsed = started.elapsed();
        let document = ExplainDocument::parse(&raw)?;

        Ok(TimingPlan {
            elapsed_ms: elapsed.as_millis() as u64,
            top_nodes: top_nodes_by_time(&document.plan, TIMING_PLAN_TOP_NODES),
        })
    }

    /// Выполняет запрос под EXPLAIN ANALYZE и разбирает план.
    ///
    /// При превышении лимита возвращается только `TimeoutExceeded`, история
    /// динамического таймаута не пополняется.
    pub async fn acquire<E: QueryExecutor>(
        &mut self,
        executor: &mut E,
        query: &QuerySpec,
    ) -> Result<AcquiredPlan> {
        let timeout = self.policy.effective();
        let statement = Self::profiling_statement(query);

        log::debug!(
            "Получение плана через {} (лимит: {:?})",
            executor.name(),
            timeout
        );

        let started = Instant::now();
        let raw = bounded(
            "plan acquisition",
            timeout,
            executor.explain(&statement, query, timeout),
        )
        .await?;
        let elapsed = started.elapsed();

        let document = ExplainDocument::parse(&raw)?;
        self.policy.record_success(elapsed);

        log::debug!(
            "План получен за {} мс, узлов: {}",
            elapsed.as_millis(),
            document.plan.node_count()
        );

        Ok(AcquiredPlan {
            document,
            elapsed,
            effective_timeout: timeout,
        })
    }
}
