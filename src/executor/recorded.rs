//! Исполнитель, воспроизводящий заранее записанные планы и результаты
//!
//! Нужен там, где живая база недоступна или нежелательна: в тестах и при
//! повторном разборе сохраненных планов. Задержки моделируются через
//! `tokio::time::sleep`, поэтому они честно взаимодействуют с таймаутами.

use crate::common::{Error, QuerySpec, Result, ResultSet};
use crate::executor::QueryExecutor;
use std::collections::HashMap;
use std::time::Duration;

/// Вид обращения к исполнителю
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Получение плана
    Explain,
    /// Получение строк
    Fetch,
    /// Замер времени
    Run,
}

/// Запись об обращении
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Вид обращения
    pub kind: CallKind,
    /// Текст запроса
    pub sql: String,
}

/// Исполнитель с записанными ответами
#[derive(Debug, Default)]
pub struct RecordedExecutor {
    plans: HashMap<String, String>,
    timing_plans: HashMap<String, String>,
    results: HashMap<String, ResultSet>,
    delays: HashMap<String, Duration>,
    run_durations: HashMap<String, Vec<Duration>>,
    offline: bool,
    calls: Vec<RecordedCall>,
}

impl RecordedExecutor {
    /// Создает пустой исполнитель
    pub fn new() -> Self {
        Self::default()
    }

    /// Записывает JSON плана для запроса
    pub fn with_plan(mut self, sql: &str, plan_json: impl Into<String>) -> Self {
        self.plans.insert(key(sql), plan_json.into());
        self
    }

    /// Записывает результат запроса
    pub fn with_result(mut self, sql: &str, result: ResultSet) -> Self {
        self.results.insert(key(sql), result);
        self
    }

    /// Записывает JSON плана с TIMING ON; без него отдается обычный план
    pub fn with_timing_plan(mut self, sql: &str, plan_json: impl Into<String>) -> Self {
        self.timing_plans.insert(key(sql), plan_json.into());
        self
    }

    /// Задает задержку для любых обращений к запросу
    pub fn with_delay(mut self, sql: &str, delay: Duration) -> Self {
        self.delays.insert(key(sql), delay);
        self
    }

    /// Задает последовательность длительностей замеров (по кругу)
    pub fn with_run_durations(mut self, sql: &str, durations: Vec<Duration>) -> Self {
        self.run_durations.insert(key(sql), durations);
        self
    }

    /// Имитирует недоступную базу
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Журнал обращений
    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// Количество обращений заданного вида
    pub fn call_count(&self, kind: CallKind) -> usize {
        self.calls.iter().filter(|c| c.kind == kind).count()
    }

    async fn enter(&mut self, kind: CallKind, query: &QuerySpec) -> Result<String> {
        let sql = key(query.statement_text());
        self.calls.push(RecordedCall {
            kind,
            sql: sql.clone(),
        });
        if self.offline {
            return Err(Error::connection_failure("recorded executor is offline"));
        }
        if let Some(delay) = self.delays.get(&sql).copied() {
            tokio::time::sleep(delay).await;
        }
        Ok(sql)
    }
}

impl QueryExecutor for RecordedExecutor {
    async fn explain(
        &mut self,
        statement: &str,
        query: &QuerySpec,
        _timeout: Option<Duration>,
    ) -> Result<String> {
        let sql = self.enter(CallKind::Explain, query).await?;
        let timing_plan = if statement.contains("TIMING ON") {
            self.timing_plans.get(&sql)
        } else {
            None
        };
        timing_plan
            .or_else(|| self.plans.get(&sql))
            .cloned()
            .ok_or_else(|| Error::query_execution(format!("no recorded plan for: {}", sql)))
    }

    async fn fetch(&mut self, query: &QuerySpec, _timeout: Option<Duration>) -> Result<ResultSet> {
        let sql = self.enter(CallKind::Fetch, query).await?;
        self.results
            .get(&sql)
            .cloned()
            .ok_or_else(|| Error::query_execution(format!("no recorded result for: {}", sql)))
    }

    async fn run(&mut self, query: &QuerySpec, _timeout: Option<Duration>) -> Result<Duration> {
        let sql = self.enter(CallKind::Run, query).await?;
        let done = self.call_count(CallKind::Run) - 1;
        let delay = self.delays.get(&sql).copied().unwrap_or_default();
        Ok(match self.run_durations.get(&sql) {
            Some(durations) if !durations.is_empty() => durations[done % durations.len()],
            _ => delay,
        })
    }

    fn name(&self) -> &str {
        "recorded"
    }
}

fn key(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim_end().to_string()
}
