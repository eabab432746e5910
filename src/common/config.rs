//! Конфигурация для queryeval
//!
//! Порядок применения: значения по умолчанию, TOML файл, переменные
//! окружения `EVAL_*`, флаги командной строки.

use crate::common::constants::*;
use crate::common::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Полная конфигурация приложения
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Параметры оценки
    pub evaluation: EvaluationConfig,
    /// Параметры подключения
    pub connection: ConnectionConfig,
    /// Параметры логирования
    pub logging: LoggingConfig,
}

/// Параметры оценки кандидатов
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Статический таймаут (в секундах), 0 отключает
    pub timeout_seconds: u64,
    /// Количество замеров времени SELECT (0 отключает замеры)
    pub select_runs: u32,
    /// Прикладывать отчет об узких местах
    pub attach_bottlenecks: bool,
    /// Прикладывать сырое дерево плана
    pub attach_plan: bool,
    /// Дополнительно снять план с TIMING ON и время по узлам
    pub timing_plan: bool,
    /// Порог Парето в [0, 1], 0 включает режим top-K
    pub bottlenecks_pareto: f64,
    /// Количество узких мест в режиме top-K
    pub bottlenecks_top: usize,
    /// Веса (чтения, стоимость)
    pub weights_no_time: (f64, f64),
    /// Веса (чтения, время, стоимость)
    pub weights_with_time: (f64, f64, f64),
    /// Отключить динамическое сокращение таймаута
    pub dynamic_timeout_disable: bool,
    /// Относительный допуск для колонок с плавающей точкой
    pub float_epsilon: f64,
    /// Сколько расхождений строк попадает в отчет
    pub max_reported_mismatches: usize,
    /// Количество параллельных оценок (поддерживается только 1)
    pub parallel_evaluations: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            select_runs: 0,
            attach_bottlenecks: false,
            attach_plan: false,
            timing_plan: false,
            bottlenecks_pareto: DEFAULT_BOTTLENECKS_PARETO,
            bottlenecks_top: DEFAULT_BOTTLENECKS_TOP,
            weights_no_time: DEFAULT_WEIGHTS_NO_TIME,
            weights_with_time: DEFAULT_WEIGHTS_WITH_TIME,
            dynamic_timeout_disable: false,
            float_epsilon: DEFAULT_FLOAT_EPSILON,
            max_reported_mismatches: DEFAULT_MAX_REPORTED_MISMATCHES,
            parallel_evaluations: 1,
        }
    }
}

impl EvaluationConfig {
    /// Статический таймаут, `None` если отключен
    pub fn static_timeout(&self) -> Option<Duration> {
        match self.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Применяет переменные окружения `EVAL_*`
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Применяет переменные из произвольного источника
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EVAL_TIMEOUT") {
            self.timeout_seconds = parse_var("EVAL_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("EVAL_SELECT_RUNS") {
            self.select_runs = parse_var("EVAL_SELECT_RUNS", &v)?;
        }
        if let Some(v) = lookup("EVAL_ATTACH_BOTTLENECKS") {
            self.attach_bottlenecks = matches!(v.trim(), "1" | "true" | "True");
        }
        if let Some(v) = lookup("EVAL_TIMING_PLAN") {
            self.timing_plan = matches!(v.trim(), "1" | "true" | "True");
        }
        if let Some(v) = lookup("EVAL_BOTTLENECKS_PARETO") {
            self.bottlenecks_pareto = parse_var("EVAL_BOTTLENECKS_PARETO", &v)?;
        }
        if let Some(v) = lookup("EVAL_BOTTLENECKS_TOP") {
            self.bottlenecks_top = parse_var("EVAL_BOTTLENECKS_TOP", &v)?;
        }
        if let Some(v) = lookup("EVAL_CS_WEIGHTS_NO_TIME") {
            match parse_weight_list("EVAL_CS_WEIGHTS_NO_TIME", &v)?.as_slice() {
                [read, cost] => self.weights_no_time = (*read, *cost),
                _ => {
                    return Err(Error::invalid_weights(
                        "EVAL_CS_WEIGHTS_NO_TIME expects two comma-separated weights",
                    ))
                }
            }
        }
        if let Some(v) = lookup("EVAL_CS_WEIGHTS") {
            match parse_weight_list("EVAL_CS_WEIGHTS", &v)?.as_slice() {
                [read, time, cost] => self.weights_with_time = (*read, *time, *cost),
                _ => {
                    return Err(Error::invalid_weights(
                        "EVAL_CS_WEIGHTS expects three comma-separated weights",
                    ))
                }
            }
        }
        if let Some(v) = lookup("EVAL_DYNAMIC_TIMEOUT_DISABLE") {
            self.dynamic_timeout_disable = matches!(v.trim(), "1" | "true" | "True");
        }
        Ok(self)
    }

    /// Валидирует конфигурацию.
    ///
    /// Веса проверяются здесь же, чтобы ошибка проявилась при запуске,
    /// а не при первой оценке.
    pub fn validate(&self) -> Result<()> {
        crate::scoring::ScoreWeights::no_time(self.weights_no_time.0, self.weights_no_time.1)?;
        let (read, time, cost) = self.weights_with_time;
        crate::scoring::ScoreWeights::with_time(read, time, cost)?;

        if !(0.0..=1.0).contains(&self.bottlenecks_pareto) {
            return Err(Error::configuration(format!(
                "bottlenecks_pareto must be within [0, 1], got {}",
                self.bottlenecks_pareto
            )));
        }
        if self.bottlenecks_pareto == 0.0 && self.bottlenecks_top == 0 {
            return Err(Error::configuration(
                "bottlenecks_top must be greater than 0 when Pareto mode is disabled",
            ));
        }
        if !self.float_epsilon.is_finite() || self.float_epsilon < 0.0 {
            return Err(Error::configuration("float_epsilon must be a finite non-negative number"));
        }
        if self.parallel_evaluations != 1 {
            return Err(Error::configuration(format!(
                "parallel_evaluations must be 1, got {}",
                self.parallel_evaluations
            )));
        }
        Ok(())
    }
}

/// Параметры подключения к PostgreSQL через psql
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Путь к клиенту psql
    pub psql_path: String,
    /// Хост
    pub host: String,
    /// Порт
    pub port: u16,
    /// Пользователь
    pub user: String,
    /// Имя базы данных
    pub dbname: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            psql_path: "psql".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            dbname: "postgres".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Применяет стандартные переменные `PGHOST`, `PGPORT`, `PGUSER`, `PGDATABASE`
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(host) = std::env::var("PGHOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("PGPORT") {
            self.port = parse_var("PGPORT", &port)?;
        }
        if let Ok(user) = std::env::var("PGUSER") {
            self.user = user;
        }
        if let Ok(dbname) = std::env::var("PGDATABASE") {
            self.dbname = dbname;
        }
        Ok(self)
    }
}

/// Конфигурация логирования
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень логирования (фильтр в формате RUST_LOG)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Загружает конфигурацию из TOML файла
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Разбирает конфигурацию из строки TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::configuration(format!("invalid TOML configuration: {}", e)))
    }

    /// Сохраняет конфигурацию в TOML файл
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::configuration(format!("cannot encode configuration: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Применяет переменные окружения ко всем секциям
    pub fn apply_env(mut self) -> Result<Self> {
        self.evaluation = self.evaluation.apply_env()?;
        self.connection = self.connection.apply_env()?;
        Ok(self)
    }

    /// Валидирует конфигурацию
    pub fn validate(&self) -> Result<()> {
        self.evaluation.validate()?;
        if self.connection.psql_path.is_empty() {
            return Err(Error::configuration("psql_path cannot be empty"));
        }
        if self.connection.port == 0 {
            return Err(Error::configuration("Port must be greater than 0"));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::configuration(format!("cannot parse {}={:?}", name, raw)))
}

fn parse_weight_list(name: &str, raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(|part| {
            part.trim().parse::<f64>().map_err(|_| {
                Error::invalid_weights(format!("{}: cannot parse weight {:?}", name, part))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EvaluationConfig::default();
        assert_eq!(config.timeout_seconds, 60);
        assert_eq!(config.weights_no_time, (0.85, 0.15));
        assert_eq!(config.weights_with_time, (0.5, 0.4, 0.1));
        assert_eq!(config.bottlenecks_top, 5);
        assert_eq!(config.static_timeout(), Some(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_disables_static_limit() {
        let config = EvaluationConfig::default()
            .apply_vars(vars(&[("EVAL_TIMEOUT", "0")]))
            .unwrap();
        assert_eq!(config.static_timeout(), None);
    }

    #[test]
    fn test_env_overrides() {
        let config = EvaluationConfig::default()
            .apply_vars(vars(&[
                ("EVAL_SELECT_RUNS", "7"),
                ("EVAL_ATTACH_BOTTLENECKS", "true"),
                ("EVAL_TIMING_PLAN", "1"),
                ("EVAL_BOTTLENECKS_PARETO", "0"),
                ("EVAL_BOTTLENECKS_TOP", "3"),
                ("EVAL_CS_WEIGHTS", "0.6,0.3,0.1"),
                ("EVAL_CS_WEIGHTS_NO_TIME", "0.7, 0.3"),
            ]))
            .unwrap();
        assert_eq!(config.select_runs, 7);
        assert!(config.attach_bottlenecks);
        assert!(config.timing_plan);
        assert_eq!(config.bottlenecks_pareto, 0.0);
        assert_eq!(config.bottlenecks_top, 3);
        assert_eq!(config.weights_with_time, (0.6, 0.3, 0.1));
        assert_eq!(config.weights_no_time, (0.7, 0.3));
    }

    #[test]
    fn test_bad_weight_list_is_invalid_weights() {
        let err = EvaluationConfig::default()
            .apply_vars(vars(&[("EVAL_CS_WEIGHTS", "0.5,0.5")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWeights { .. }));
    }

    #[test]
    fn test_config_validation() {
        let mut config = EvaluationConfig::default();
        config.weights_no_time = (0.5, 0.6);
        assert!(matches!(config.validate(), Err(Error::InvalidWeights { .. })));

        let mut config = EvaluationConfig::default();
        config.bottlenecks_pareto = 1.5;
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));

        let mut config = EvaluationConfig::default();
        config.parallel_evaluations = 4;
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_toml_roundtrip_and_partial_file() {
        let config = AppConfig::from_toml_str(
            r#"
            [evaluation]
            timeout_seconds = 30
            weights_no_time = [0.9, 0.1]

            [connection]
            dbname = "shareholders"
            "#,
        )
        .unwrap();
        assert_eq!(config.evaluation.timeout_seconds, 30);
        assert_eq!(config.evaluation.weights_no_time, (0.9, 0.1));
        assert_eq!(config.evaluation.select_runs, 0);
        assert_eq!(config.connection.dbname, "shareholders");
        assert_eq!(config.connection.port, 5432);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queryeval.toml");
        config.to_file(&path).unwrap();
        assert_eq!(AppConfig::from_file(&path).unwrap(), config);
    }
}
