//! Оценка кандидатов
//!
//! Порядок работы: проверка эквивалентности (если задан базовый запрос),
//! получение плана, извлечение метрик, замеры времени, сводная оценка и
//! отчет об узких местах. По запросу дополнительно снимается план с TIMING ON,
//! который только сохраняется в записи. Любой таймаут или сбой подключения прерывает
//! оценку целиком: частичных результатов не бывает.

use crate::common::{EvaluationConfig, QuerySpec, Result};
use crate::equivalence::{EquivalenceChecker, ResultCache};
use crate::evaluator::record::{EvaluationRecord, RunSettings};
use crate::evaluator::timing;
use crate::executor::QueryExecutor;
use crate::metrics;
use crate::plan::{PlanAcquirer, TimeoutPolicy};
use crate::report::{render_markdown, BottleneckReport, Selection};
use crate::scoring::Scorer;
use std::sync::Arc;

/// Запрос на оценку
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    /// Запрос-кандидат
    pub candidate: QuerySpec,
    /// Базовый запрос для проверки эквивалентности
    pub baseline: Option<QuerySpec>,
    /// Метка для записи
    pub label: Option<String>,
}

impl EvaluationRequest {
    /// Оценка без проверки эквивалентности
    pub fn new(candidate: QuerySpec) -> Self {
        Self {
            candidate,
            baseline: None,
            label: None,
        }
    }

    /// Добавляет базовый запрос
    pub fn with_baseline(mut self, baseline: QuerySpec) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Добавляет метку
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Оценщик кандидатов.
///
/// Владеет исполнителем единолично: все обращения к базе идут через
/// `&mut self`, поэтому в каждый момент выполняется не больше одной операции.
pub struct Evaluator<E: QueryExecutor> {
    executor: E,
    config: EvaluationConfig,
    acquirer: PlanAcquirer,
    checker: EquivalenceChecker,
    scorer: Scorer,
}

impl<E: QueryExecutor> Evaluator<E> {
    /// Создает оценщик; конфигурация проверяется сразу
    pub fn new(executor: E, config: EvaluationConfig) -> Result<Self> {
        config.validate()?;
        let scorer = Scorer::from_config(&config)?;
        Ok(Self {
            executor,
            acquirer: PlanAcquirer::new(TimeoutPolicy::from_config(&config)),
            checker: EquivalenceChecker::from_config(&config),
            scorer,
            config,
        })
    }

    /// Подключает кэш результатов базового запроса
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.checker = self.checker.with_cache(cache);
        self
    }

    /// Кэш результатов базового запроса
    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        self.checker.cache()
    }

    /// Конфигурация
    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Исполнитель
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Возвращает исполнитель
    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Настройки запуска, попадающие в запись
    pub fn settings(&self) -> RunSettings {
        RunSettings::from(&self.config)
    }

    /// Оценивает кандидата
    pub async fn evaluate(&mut self, request: &EvaluationRequest) -> Result<EvaluationRecord> {
        let mut record = EvaluationRecord::new(request.candidate.clone(), self.settings());
        record.label = request.label.clone();
        record.baseline = request.baseline.clone();

        log::info!(
            "Оценка кандидата {}{}",
            record.fingerprint,
            request
                .label
                .as_deref()
                .map(|l| format!(" ({})", l))
                .unwrap_or_default()
        );

        if let Some(baseline) = &request.baseline {
            // Динамический лимит выводится из времени получения планов
            // кандидатов и к выборке базового запроса не применяется
            let timeout = self.acquirer.policy().static_timeout();
            let verdict = self
                .checker
                .check(&mut self.executor, baseline, &request.candidate, timeout)
                .await?;
            record.equivalence_checked = true;
            record.verdict = verdict;
            if !record.verdict.functional_ok {
                log::warn!(
                    "Кандидат {} отклонен: результат не совпадает с базовым",
                    record.fingerprint
                );
                return Ok(record);
            }
        }

        let acquired = self
            .acquirer
            .acquire(&mut self.executor, &request.candidate)
            .await?;
        let plan = &acquired.document.plan;
        let metrics = metrics::extract(plan);

        let timing = timing::measure(
            &mut self.executor,
            &request.candidate,
            self.config.select_runs,
            acquired.effective_timeout,
        )
        .await?;

        let score = self
            .scorer
            .score(&metrics, timing.as_ref().map(|t| t.median_ms));

        if self.config.timing_plan {
            let timing_plan = self
                .acquirer
                .acquire_timing(&mut self.executor, &request.candidate, acquired.effective_timeout)
                .await?;
            log::debug!(
                "План с TIMING ON получен за {} мс",
                timing_plan.elapsed_ms
            );
            record.timing_plan = Some(timing_plan);
        }

        if self.config.attach_bottlenecks {
            let report = BottleneckReport::build(plan, Selection::from_config(&self.config));
            record.bottlenecks_markdown = Some(render_markdown(&report));
            record.bottlenecks = Some(report);
        }

        log::info!(
            "Кандидат {}: combined_score={:.6}, reads={}, cost={:.2}",
            record.fingerprint,
            score.combined_score,
            metrics.shared_read_blocks,
            metrics.total_cost
        );

        record.explain_elapsed_ms = Some(acquired.elapsed.as_millis() as u64);
        record.effective_timeout_ms = acquired.effective_timeout.map(|t| t.as_millis() as u64);
        record.metrics = Some(metrics);
        record.score = Some(score);
        record.timing = timing;
        if self.config.attach_plan {
            record.plan = Some(acquired.document);
        }
        Ok(record)
    }
}
