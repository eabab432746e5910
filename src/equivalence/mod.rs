//! Проверка функциональной эквивалентности
//!
//! Результаты сравниваются как упорядоченные последовательности строк:
//! потребители полагаются на постраничную выдачу `ORDER BY ... LIMIT`.
//! Расхождение результатов является вердиктом, а не ошибкой.

pub mod cache;
pub mod checker;

#[cfg(test)]
mod tests;

pub use cache::{CacheKey, CacheStatistics, InMemoryResultCache, NoopResultCache, ResultCache};
pub use checker::{EquivalenceChecker, EquivalenceVerdict, MismatchKind, ResultDiff, RowMismatch};
