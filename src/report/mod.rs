//! Отчет об узких местах плана
//!
//! Тяжесть узла считается по его собственным счетчикам, без вклада
//! потомков, иначе накопительные значения сервера учитывались бы дважды.

pub mod render;
pub mod severity;

#[cfg(test)]
mod tests;

pub use render::{render_markdown, MarkdownReport};
pub use severity::{
    hint_for, rank_nodes, select, Bottleneck, BottleneckReport, ContributingMetric, NodeCounters,
    Selection,
};
