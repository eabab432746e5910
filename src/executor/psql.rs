//! Исполнитель на базе клиента psql
//!
//! Каждая операция запускает отдельный процесс psql через `tokio::process`.
//! Скрипт передается через stdin, чтобы psql подставил переменные `:name`.
//! Пароль и прочие учетные данные psql берет из окружения (`PGPASSWORD`,
//! `.pgpass`).

use crate::common::constants::{
    DRIVER_GRACE_SECONDS, PSQL_FIELD_SEPARATOR, PSQL_NULL_MARKER, PSQL_RECORD_SEPARATOR,
};
use crate::common::{ColumnDesc, ColumnKind, ConnectionConfig, Error, QuerySpec, Result, ResultSet, Value};
use crate::executor::QueryExecutor;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::Instant;

/// Таблица в невыровненном выводе psql: заголовок, строки и счетчик из подвала
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PsqlTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Исполнитель запросов через psql
#[derive(Debug, Clone)]
pub struct PsqlExecutor {
    config: ConnectionConfig,
}

impl PsqlExecutor {
    /// Создает исполнитель
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Конфигурация подключения
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn command(&self, query: &QuerySpec, capture_stdout: bool) -> Command {
        let mut cmd = Command::new(&self.config.psql_path);
        cmd.arg("-h")
            .arg(&self.config.host)
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg("-U")
            .arg(&self.config.user)
            .arg("-d")
            .arg(&self.config.dbname)
            .args(["-X", "-q", "-A", "-v", "ON_ERROR_STOP=1"])
            .arg("-F")
            .arg(PSQL_FIELD_SEPARATOR.to_string())
            .arg("-R")
            .arg(PSQL_RECORD_SEPARATOR.to_string())
            .arg("-P")
            .arg(format!("null={}", PSQL_NULL_MARKER))
            .arg("-P")
            .arg("pager=off");
        for (name, value) in &query.binds {
            cmd.arg("-v").arg(format!("{}={}", name, value.to_sql_literal()));
        }
        cmd.stdin(Stdio::piped())
            .stdout(if capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Запускает скрипт и возвращает stdout
    async fn run_script(
        &self,
        operation: &str,
        script: String,
        query: &QuerySpec,
        timeout: Option<Duration>,
        capture_stdout: bool,
    ) -> Result<String> {
        let mut child = self.command(query, capture_stdout).spawn().map_err(|e| {
            Error::connection_failure(format!(
                "cannot start {}: {}",
                self.config.psql_path, e
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::internal("psql stdin is not piped"))?;

        let session = async move {
            // psql может завершиться, не дочитав скрипт; причину покажет код выхода
            tolerate_broken_pipe(stdin.write_all(script.as_bytes()).await)?;
            drop(stdin);
            child.wait_with_output().await
        };

        let output = match timeout {
            Some(limit) => {
                let hard_limit = limit + Duration::from_secs(DRIVER_GRACE_SECONDS);
                tokio::time::timeout(hard_limit, session)
                    .await
                    .map_err(|_| Error::timeout_exceeded(operation, limit))??
            }
            None => session.await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_failure(operation, output.status.code(), &stderr, timeout));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn describe(&self, query: &QuerySpec, timeout: Option<Duration>) -> Result<Vec<ColumnDesc>> {
        let script = format!(
            "{}{}\n\\gdesc\n",
            timeout_preamble(timeout),
            query.statement_text()
        );
        let stdout = self.run_script("describe", script, query, timeout, true).await?;
        let table = parse_table(&stdout)?;
        table
            .rows
            .into_iter()
            .map(|row| match row.as_slice() {
                [Some(name), Some(type_name)] => Ok(ColumnDesc::new(name.clone(), type_name.clone())),
                _ => Err(Error::query_execution("unexpected \\gdesc output from psql")),
            })
            .collect()
    }
}

impl QueryExecutor for PsqlExecutor {
    async fn explain(
        &mut self,
        statement: &str,
        query: &QuerySpec,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let script = format!("{}{};\n", timeout_preamble(timeout), statement);
        let stdout = self
            .run_script("plan acquisition", script, query, timeout, true)
            .await?;
        // Вывод без заголовка (например, при -t в psqlrc) отдаем как есть:
        // разбор плана умеет вырезать JSON из смешанного текста.
        match parse_table(&stdout) {
            Ok(table) => table
                .rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next().flatten())
                .ok_or_else(|| Error::plan_parse("EXPLAIN returned no rows")),
            Err(_) => Ok(stdout),
        }
    }

    async fn fetch(&mut self, query: &QuerySpec, timeout: Option<Duration>) -> Result<ResultSet> {
        let started = Instant::now();
        let columns = self.describe(query, timeout).await?;
        let remaining = match timeout {
            Some(limit) => Some(
                limit
                    .checked_sub(started.elapsed())
                    .ok_or_else(|| Error::timeout_exceeded("result fetch", limit))?,
            ),
            None => None,
        };

        let script = format!(
            "{}{};\n",
            timeout_preamble(remaining),
            query.statement_text()
        );
        let stdout = self
            .run_script("result fetch", script, query, remaining, true)
            .await?;
        let table = parse_table(&stdout)?;

        if table.header.len() != columns.len() {
            return Err(Error::query_execution(format!(
                "column count changed between describe ({}) and fetch ({})",
                columns.len(),
                table.header.len()
            )));
        }

        let rows = table
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .map(|(i, cell)| match cell {
                        None => Value::Null,
                        Some(raw) => Value::parse(
                            &raw,
                            columns.get(i).map(|c| c.kind).unwrap_or(ColumnKind::Exact),
                        ),
                    })
                    .collect()
            })
            .collect();

        Ok(ResultSet::new(columns, rows))
    }

    async fn run(&mut self, query: &QuerySpec, timeout: Option<Duration>) -> Result<Duration> {
        let script = format!("{}{};\n", timeout_preamble(timeout), query.statement_text());
        let started = Instant::now();
        self.run_script("timed select", script, query, timeout, false)
            .await?;
        Ok(started.elapsed())
    }

    fn name(&self) -> &str {
        "psql"
    }
}

/// Префикс скрипта с `statement_timeout`
pub(crate) fn timeout_preamble(timeout: Option<Duration>) -> String {
    match timeout {
        Some(limit) => format!("SET statement_timeout = {};\n", limit.as_millis().max(1)),
        None => "SET statement_timeout = 0;\n".to_string(),
    }
}

/// Закрытый psql канал stdin не считается ошибкой записи
pub(crate) fn tolerate_broken_pipe(result: std::io::Result<()>) -> std::io::Result<()> {
    match result {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Сопоставляет отказ psql с видом ошибки
pub(crate) fn classify_failure(
    operation: &str,
    exit_code: Option<i32>,
    stderr: &str,
    timeout: Option<Duration>,
) -> Error {
    if stderr.contains("canceling statement due to statement timeout") {
        return Error::timeout_exceeded(operation, timeout.unwrap_or_default());
    }
    let lowered = stderr.to_ascii_lowercase();
    if exit_code == Some(2)
        || lowered.contains("could not connect")
        || lowered.contains("connection to server")
        || lowered.contains("connection refused")
    {
        return Error::connection_failure(stderr.to_string());
    }
    Error::query_execution(if stderr.is_empty() {
        format!("psql exited with code {:?}", exit_code)
    } else {
        stderr.to_string()
    })
}

/// Разбирает невыровненный вывод psql: заголовок, строки, подвал `(N rows)`
pub(crate) fn parse_table(stdout: &str) -> Result<PsqlTable> {
    let body = stdout.strip_suffix('\n').unwrap_or(stdout);
    let mut records: Vec<&str> = body.split(PSQL_RECORD_SEPARATOR).collect();

    let footer = records
        .pop()
        .ok_or_else(|| Error::query_execution("empty psql output"))?;
    let expected = parse_footer(footer).ok_or_else(|| {
        Error::query_execution(format!("unexpected psql footer: {:?}", footer))
    })?;

    if records.is_empty() {
        return Err(Error::query_execution("psql output has no header"));
    }
    let header: Vec<String> = records
        .remove(0)
        .split(PSQL_FIELD_SEPARATOR)
        .map(str::to_string)
        .collect();

    if records.len() != expected {
        return Err(Error::query_execution(format!(
            "psql reported {} rows but printed {}",
            expected,
            records.len()
        )));
    }

    let rows = records
        .into_iter()
        .map(|record| {
            record
                .split(PSQL_FIELD_SEPARATOR)
                .map(|cell| {
                    if cell == PSQL_NULL_MARKER {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect()
        })
        .collect();

    Ok(PsqlTable { header, rows })
}

/// Число строк из подвала `(3 rows)`; формулировка может быть локализована
fn parse_footer(footer: &str) -> Option<usize> {
    let inner = footer.trim().strip_prefix('(')?.strip_suffix(')')?;
    inner.split_whitespace().next()?.parse().ok()
}
