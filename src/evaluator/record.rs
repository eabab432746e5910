//! Сохраняемая запись об оценке кандидата

use crate::common::{EvaluationConfig, QuerySpec, Result};
use crate::equivalence::EquivalenceVerdict;
use crate::evaluator::timing::TimingSummary;
use crate::metrics::Metrics;
use crate::plan::{ExplainDocument, TimingPlan};
use crate::report::BottleneckReport;
use crate::scoring::ScoreResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Настройки запуска, которые должны совпадать у сравниваемых оценок
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Статический таймаут (в секундах), 0 означает отсутствие
    pub timeout_seconds: u64,
    /// Динамическое сокращение таймаута отключено
    pub dynamic_timeout_disabled: bool,
    /// Количество параллельных оценок
    pub parallel_evaluations: u32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from(&EvaluationConfig::default())
    }
}

impl From<&EvaluationConfig> for RunSettings {
    fn from(config: &EvaluationConfig) -> Self {
        Self {
            timeout_seconds: config.timeout_seconds,
            dynamic_timeout_disabled: config.dynamic_timeout_disable,
            parallel_evaluations: config.parallel_evaluations,
        }
    }
}

/// Результат оценки одного кандидата.
///
/// Если кандидат не прошел проверку эквивалентности, метрики и оценка
/// отсутствуют: показатели неверного запроса не имеют смысла.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Идентификатор оценки
    pub id: Uuid,
    /// Время создания (мс с начала эпохи Unix)
    pub created_at: u64,
    /// Метка, переданная вызывающей стороной
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Отпечаток запроса-кандидата
    pub fingerprint: String,
    /// Запрос-кандидат
    pub query: QuerySpec,
    /// Базовый запрос
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<QuerySpec>,
    /// Выполнялась ли проверка эквивалентности
    pub equivalence_checked: bool,
    /// Вердикт эквивалентности
    pub verdict: EquivalenceVerdict,
    /// Метрики плана
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    /// Сводная оценка
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreResult>,
    /// Замеры времени
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingSummary>,
    /// Время получения плана (мс)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain_elapsed_ms: Option<u64>,
    /// Действовавший таймаут (мс)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_timeout_ms: Option<u64>,
    /// Настройки запуска
    pub settings: RunSettings,
    /// Отчет об узких местах
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottlenecks: Option<BottleneckReport>,
    /// Отчет об узких местах в markdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottlenecks_markdown: Option<String>,
    /// Сырое дерево плана
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ExplainDocument>,
    /// Диагностический план с временем по узлам
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_plan: Option<TimingPlan>,
}

impl EvaluationRecord {
    /// Создает запись без метрик
    pub fn new(query: QuerySpec, settings: RunSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: current_timestamp_ms(),
            label: None,
            fingerprint: query.fingerprint(),
            query,
            baseline: None,
            equivalence_checked: false,
            verdict: EquivalenceVerdict::passed(),
            metrics: None,
            score: None,
            timing: None,
            explain_elapsed_ms: None,
            effective_timeout_ms: None,
            settings,
            bottlenecks: None,
            bottlenecks_markdown: None,
            plan: None,
            timing_plan: None,
        }
    }

    /// Результат совпал с базовым (или проверка не требовалась)
    pub fn functional_ok(&self) -> bool {
        self.verdict.functional_ok
    }

    /// Оценка для отбора кандидатов; `None`, если кандидат неверен
    pub fn fitness(&self) -> Option<f64> {
        if !self.functional_ok() {
            return None;
        }
        self.score.as_ref().map(|s| s.combined_score)
    }

    /// Сохраняет запись в JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Читает запись из JSON
    pub fn read_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
