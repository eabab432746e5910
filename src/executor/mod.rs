//! Доступ к живой базе данных
//!
//! Все обращения к базе проходят через [`QueryExecutor`]. Исполнитель
//! принадлежит одному оценщику, а методы принимают `&mut self`, поэтому
//! одновременно выполняется не больше одной операции.

pub mod psql;
pub mod recorded;

#[cfg(test)]
mod tests;

pub use psql::PsqlExecutor;
pub use recorded::RecordedExecutor;

use crate::common::{Error, QuerySpec, Result, ResultSet};
use std::future::Future;
use std::time::Duration;

/// Исполнитель запросов
#[allow(async_fn_in_trait)]
pub trait QueryExecutor {
    /// Выполняет профилирующую инструкцию и возвращает сырой вывод (JSON плана).
    ///
    /// `statement` уже содержит префикс EXPLAIN; параметры берутся из `query`.
    async fn explain(
        &mut self,
        statement: &str,
        query: &QuerySpec,
        timeout: Option<Duration>,
    ) -> Result<String>;

    /// Выполняет запрос и возвращает упорядоченный набор строк
    async fn fetch(&mut self, query: &QuerySpec, timeout: Option<Duration>) -> Result<ResultSet>;

    /// Выполняет запрос, отбрасывая строки, и возвращает затраченное время
    async fn run(&mut self, query: &QuerySpec, timeout: Option<Duration>) -> Result<Duration>;

    /// Имя исполнителя для логов
    fn name(&self) -> &str {
        "executor"
    }
}

/// Ограничивает операцию таймаутом.
///
/// По истечении лимита будущее сбрасывается вместе со всем, что оно успело
/// накопить, и возвращается только [`Error::TimeoutExceeded`].
pub async fn bounded<T, F>(operation: &str, timeout: Option<Duration>, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| Error::timeout_exceeded(operation, limit))?,
        None => future.await,
    }
}
