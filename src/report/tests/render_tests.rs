//! Тесты форматирования отчета

use crate::common::test_utils::holdings_plan;
use crate::plan::PlanNode;
use crate::report::{render_markdown, BottleneckReport, MarkdownReport, Selection};

#[test]
fn test_markdown_lists_selected_nodes() {
    let report = BottleneckReport::build(&holdings_plan(), Selection::Pareto { threshold: 0.9 });
    let markdown = MarkdownReport::new(&report).with_source("plan.json").to_string();

    assert!(markdown.starts_with("# Узкие места плана"));
    assert!(markdown.contains("План: plan.json"));
    assert!(markdown.contains("порог 0.90"));
    assert!(markdown.contains("1. **Seq Scan on holdings**"));
    assert!(markdown.contains("read=700"));
    assert!(markdown.contains("вклад: shared reads"));
    assert!(markdown.contains("фильтр: `(account_id = 42)`"));
    assert!(!markdown.contains("4. "));
}

#[test]
fn test_markdown_top_k_and_empty() {
    let report = BottleneckReport::build(&holdings_plan(), Selection::TopK { k: 2 });
    let markdown = render_markdown(&report);
    assert!(markdown.contains("Отбор top-2"));
    assert!(markdown.contains("2. **Index Scan on accounts**"));

    let empty = BottleneckReport::build(&PlanNode::new("Result"), Selection::default());
    assert!(render_markdown(&empty).contains("Узких мест не найдено."));
}
