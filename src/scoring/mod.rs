//! Сводная оценка кандидата
//!
//! Каждая метрика `x` нормируется как `1 / (1 + ln(1 + x))`, после чего
//! нормированные значения складываются с весами. Меньший расход ресурсов
//! дает большую оценку, результат лежит в `(0, 1]`.

pub mod scorer;

pub use scorer::{compare_ranked, term, ScoreComponent, ScoreMode, ScoreResult, ScoreWeights, Scorer};
