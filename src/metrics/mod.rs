//! Метрики плана выполнения
//!
//! Свертка дерева плана в плоскую запись. Извлечение не обращается к базе
//! и не может завершиться ошибкой: все проверки формы плана выполнены при
//! его разборе.

pub mod extractor;

pub use extractor::{extract, Metrics};
