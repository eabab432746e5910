//! Форматирование отчета об узких местах в markdown

use crate::report::severity::{BottleneckReport, Selection};
use std::fmt;

/// Отчет в формате markdown
pub struct MarkdownReport<'a> {
    report: &'a BottleneckReport,
    source: Option<&'a str>,
}

impl<'a> MarkdownReport<'a> {
    /// Оборачивает отчет для вывода
    pub fn new(report: &'a BottleneckReport) -> Self {
        Self {
            report,
            source: None,
        }
    }

    /// Указывает источник плана (например, имя файла)
    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        writeln!(f, "# Узкие места плана")?;
        writeln!(f)?;
        if let Some(source) = self.source {
            writeln!(f, "План: {}", source)?;
        }
        match report.selection {
            Selection::Pareto { threshold } => writeln!(
                f,
                "Отбор по Парето: порог {:.2}, покрыто {:.1}% тяжести",
                threshold,
                report.covered_share * 100.0
            )?,
            Selection::TopK { k } => writeln!(f, "Отбор top-{}", k)?,
        }
        writeln!(f, "Узлов в плане: {}", report.total_nodes)?;
        writeln!(f)?;

        if report.items.is_empty() {
            return writeln!(f, "Узких мест не найдено.");
        }

        for (i, item) in report.items.iter().enumerate() {
            writeln!(
                f,
                "{}. **{}** | sev={:.3} | read={} | temp={} | rm={} | cost_k={:.1} | вклад: {}",
                i + 1,
                item.label,
                item.severity,
                item.counters.shared_read_blocks,
                item.counters.temp_blocks,
                item.counters.rows_removed_by_filter,
                item.counters.cost / 1000.0,
                item.dominant
            )?;
            writeln!(f, "   подсказка: {}", item.hint)?;
            if let Some(filter) = &item.filter {
                writeln!(f, "   фильтр: `{}`", filter)?;
            }
        }
        Ok(())
    }
}

/// Отчет в markdown одной строкой
pub fn render_markdown(report: &BottleneckReport) -> String {
    MarkdownReport::new(report).to_string()
}
