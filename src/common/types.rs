//! Базовые типы данных для queryeval

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use twox_hash::XxHash64;

/// Значение параметра привязки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindValue {
    /// NULL значение
    Null,
    /// Булево значение
    Boolean(bool),
    /// Целое число
    Integer(i64),
    /// Число с плавающей точкой
    Float(f64),
    /// Текст
    Text(String),
}

impl BindValue {
    /// Преобразует значение в SQL литерал
    pub fn to_sql_literal(&self) -> String {
        match self {
            BindValue::Null => "NULL".to_string(),
            BindValue::Boolean(true) => "TRUE".to_string(),
            BindValue::Boolean(false) => "FALSE".to_string(),
            BindValue::Integer(i) => i.to_string(),
            BindValue::Float(f) if f.is_nan() => "'NaN'::float8".to_string(),
            BindValue::Float(f) if f.is_infinite() && *f > 0.0 => "'Infinity'::float8".to_string(),
            BindValue::Float(f) if f.is_infinite() => "'-Infinity'::float8".to_string(),
            BindValue::Float(f) => format!("{:?}", f),
            BindValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }

    /// Разбирает значение из аргумента командной строки.
    ///
    /// Текст в одинарных кавычках всегда остается текстом (`'007'`),
    /// остальное распознается как NULL, булево или число.
    pub fn parse_cli(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
            let inner = &trimmed[1..trimmed.len() - 1];
            return BindValue::Text(inner.replace("''", "'"));
        }
        if trimmed.eq_ignore_ascii_case("null") {
            return BindValue::Null;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return BindValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return BindValue::Boolean(false);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return BindValue::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return BindValue::Float(f);
            }
        }
        BindValue::Text(raw.to_string())
    }
}

/// Параметры привязки в порядке объявления
pub type BindParams = IndexMap<String, BindValue>;

/// Запрос вместе с параметрами привязки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Текст SQL запроса
    pub sql: String,
    /// Параметры привязки (`:name` в тексте запроса)
    #[serde(default)]
    pub binds: BindParams,
}

impl QuerySpec {
    /// Создает запрос без параметров
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: BindParams::new(),
        }
    }

    /// Добавляет параметр привязки
    pub fn bind(mut self, name: impl Into<String>, value: BindValue) -> Self {
        self.binds.insert(name.into(), value);
        self
    }

    /// Текст запроса без завершающих точек с запятой и пробелов
    pub fn statement_text(&self) -> &str {
        self.sql.trim().trim_end_matches(';').trim_end()
    }

    /// Стабильный отпечаток текста и параметров (xxHash64, hex)
    pub fn fingerprint(&self) -> String {
        let mut material = String::with_capacity(self.sql.len() + 32);
        material.push_str(&self.sql);
        for (name, value) in &self.binds {
            material.push('\0');
            material.push_str(name);
            material.push('=');
            material.push_str(&value.to_sql_literal());
        }
        format!("{:016x}", XxHash64::oneshot(0, material.as_bytes()))
    }
}

/// Класс типа колонки, определяющий правило сравнения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Булевы значения
    Boolean,
    /// Целые числа
    Integer,
    /// real / double precision: сравнение с допуском
    Float,
    /// Все остальное, включая numeric: точное сравнение текста
    Exact,
}

impl ColumnKind {
    /// Определяет класс по имени типа PostgreSQL
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => ColumnKind::Boolean,
            "smallint" | "integer" | "bigint" | "int2" | "int4" | "int8" => ColumnKind::Integer,
            "real" | "double precision" | "float4" | "float8" => ColumnKind::Float,
            _ => ColumnKind::Exact,
        }
    }
}

/// Описание колонки результата
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDesc {
    /// Имя колонки
    pub name: String,
    /// Имя типа, как его сообщает сервер
    pub type_name: String,
    /// Класс сравнения
    pub kind: ColumnKind,
}

impl ColumnDesc {
    /// Создает описание колонки по имени типа
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let kind = ColumnKind::from_type_name(&type_name);
        Self {
            name: name.into(),
            type_name,
            kind,
        }
    }
}

/// Значение ячейки результата
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// NULL
    Null,
    /// Булево значение
    Boolean(bool),
    /// Целое число
    Integer(i64),
    /// Число с плавающей точкой
    Float(f64),
    /// Текстовое представление
    Text(String),
}

impl Value {
    /// Разбирает текстовое представление значения по классу колонки
    pub fn parse(raw: &str, kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Boolean => match raw {
                "t" | "true" => Value::Boolean(true),
                "f" | "false" => Value::Boolean(false),
                _ => Value::Text(raw.to_string()),
            },
            ColumnKind::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnKind::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnKind::Exact => Value::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// Строка результата
pub type Row = Vec<Value>;

/// Упорядоченный набор строк результата
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Колонки
    pub columns: Vec<ColumnDesc>,
    /// Строки в порядке выдачи
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Создает набор строк
    pub fn new(columns: Vec<ColumnDesc>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Количество строк
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Класс сравнения колонки по индексу
    pub fn column_kind(&self, index: usize) -> ColumnKind {
        self.columns
            .get(index)
            .map(|c| c.kind)
            .unwrap_or(ColumnKind::Exact)
    }
}
