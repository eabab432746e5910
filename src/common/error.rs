//! Обработка ошибок для queryeval
//!
//! Несовпадение результатов кандидата и базового запроса ошибкой не
//! является: оно возвращается как вердикт эквивалентности.

use thiserror::Error;

/// Основной тип ошибки для queryeval
#[derive(Error, Debug)]
pub enum Error {
    /// База данных недоступна
    #[error("Connection failure: {message}")]
    ConnectionFailure { message: String },

    /// Выполнение превысило статический или динамический лимит
    #[error("Timeout exceeded after {timeout_ms} ms: {operation}")]
    TimeoutExceeded { operation: String, timeout_ms: u64 },

    /// Некорректная или неожиданная структура плана
    #[error("Plan parse error: {message}")]
    PlanParse { message: String },

    /// Веса скоринга не проходят проверку
    #[error("Invalid weights: {message}")]
    InvalidWeights { message: String },

    /// Сервер отклонил запрос
    #[error("Query execution error: {message}")]
    QueryExecution { message: String },

    /// Ошибка конфигурации
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Ошибка I/O операций
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Внутренняя ошибка
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Тип результата для queryeval
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Создает ошибку подключения
    pub fn connection_failure(message: impl Into<String>) -> Self {
        Self::ConnectionFailure {
            message: message.into(),
        }
    }

    /// Создает ошибку превышения таймаута
    pub fn timeout_exceeded(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::TimeoutExceeded {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Создает ошибку разбора плана
    pub fn plan_parse(message: impl Into<String>) -> Self {
        Self::PlanParse {
            message: message.into(),
        }
    }

    /// Создает ошибку весов
    pub fn invalid_weights(message: impl Into<String>) -> Self {
        Self::InvalidWeights {
            message: message.into(),
        }
    }

    /// Создает ошибку выполнения запроса
    pub fn query_execution(message: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
        }
    }

    /// Создает ошибку конфигурации
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Создает внутреннюю ошибку
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Короткое имя вида ошибки для отчетов и кода выхода CLI
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConnectionFailure { .. } => "ConnectionFailure",
            Error::TimeoutExceeded { .. } => "TimeoutExceeded",
            Error::PlanParse { .. } => "PlanParseError",
            Error::InvalidWeights { .. } => "InvalidWeights",
            Error::QueryExecution { .. } => "QueryExecution",
            Error::Configuration { .. } => "Configuration",
            Error::Io(_) => "Io",
            Error::Serialization(_) => "Serialization",
            Error::Internal { .. } => "Internal",
        }
    }

    /// Проверяет, является ли ошибка таймаутом
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimeoutExceeded { .. })
    }
}
