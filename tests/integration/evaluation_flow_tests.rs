//! Полный цикл оценки кандидата на записанных данных

use super::common::*;
use queryeval::equivalence::MismatchKind;
use queryeval::report::{BottleneckReport, ContributingMetric, Selection};
use queryeval::scoring::ScoreMode;
use queryeval::{Error, EvaluationConfig, EvaluationRequest, Evaluator, ExplainDocument};
use std::time::Duration;

#[tokio::test]
async fn test_evaluation_with_baseline() {
    let executor = executor_with_plan(scan_plan("Index Scan", 20.0, 10));
    let mut evaluator = Evaluator::new(executor, quiet_config()).unwrap();

    let request = EvaluationRequest::new(holdings_query(HOLDINGS_SQL))
        .with_baseline(holdings_query(HOLDINGS_SQL))
        .with_label("index-scan");
    let record = evaluator.evaluate(&request).await.unwrap();

    assert!(record.equivalence_checked);
    assert!(record.functional_ok());
    assert_eq!(record.label.as_deref(), Some("index-scan"));

    let metrics = record.metrics.as_ref().unwrap();
    assert_eq!(metrics.shared_read_blocks, 10);
    assert_eq!(metrics.total_cost, 20.0);
    assert_eq!(metrics.node_count, 1);

    let score = record.score.as_ref().unwrap();
    assert_eq!(score.mode, ScoreMode::NoTime);
    assert!(score.combined_score > 0.0 && score.combined_score <= 1.0);
    assert_eq!(record.fitness(), Some(score.combined_score));

    let markdown = record.bottlenecks_markdown.as_ref().unwrap();
    assert!(markdown.contains("Index Scan on holdings"));
    assert!(record.timing.is_none());
    assert!(record.plan.is_none());
}

#[tokio::test]
async fn test_reordered_candidate_is_rejected() {
    let executor = executor_with_plan(scan_plan("Index Scan", 20.0, 10));
    let mut evaluator = Evaluator::new(executor, quiet_config()).unwrap();

    let request = EvaluationRequest::new(holdings_query(HOLDINGS_DESC_SQL))
        .with_baseline(holdings_query(HOLDINGS_SQL));
    let record = evaluator.evaluate(&request).await.unwrap();

    assert!(!record.functional_ok());
    assert!(record.metrics.is_none());
    assert!(record.score.is_none());
    assert_eq!(record.fitness(), None);

    let diff = record.verdict.diff.as_ref().unwrap();
    assert!(diff.order_only);
    assert!(!diff.row_count_mismatch);
    assert!(diff
        .mismatches
        .iter()
        .all(|m| m.kind == MismatchKind::Order));

    // План переписанного запроса не запрашивался
    assert_eq!(
        evaluator
            .executor()
            .call_count(queryeval::executor::recorded::CallKind::Explain),
        0
    );
}

#[tokio::test]
async fn test_timing_switches_to_weighted_time() {
    let executor = executor_with_plan(scan_plan("Index Scan", 20.0, 10)).with_run_durations(
        HOLDINGS_SQL,
        vec![
            Duration::from_millis(5),
            Duration::from_millis(10),
            Duration::from_millis(30),
            Duration::from_millis(20),
        ],
    );
    let config = EvaluationConfig {
        select_runs: 3,
        ..quiet_config()
    };
    let mut evaluator = Evaluator::new(executor, config).unwrap();

    let record = evaluator
        .evaluate(&EvaluationRequest::new(holdings_query(HOLDINGS_SQL)))
        .await
        .unwrap();

    let timing = record.timing.as_ref().unwrap();
    assert_eq!(timing.samples_ms, vec![10.0, 30.0, 20.0]);
    assert_eq!(timing.median_ms, 20.0);
    assert_eq!(record.score.as_ref().unwrap().mode, ScoreMode::WithTime);
}

#[tokio::test(start_paused = true)]
async fn test_slow_plan_times_out() {
    let executor = executor_with_plan(scan_plan("Seq Scan", 500.0, 1000))
        .with_delay(HOLDINGS_SQL, Duration::from_secs(120));
    let config = EvaluationConfig {
        timeout_seconds: 1,
        ..quiet_config()
    };
    let mut evaluator = Evaluator::new(executor, config).unwrap();

    let err = evaluator
        .evaluate(&EvaluationRequest::new(holdings_query(HOLDINGS_SQL)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(err, Error::TimeoutExceeded { timeout_ms: 1000, .. }));
}

#[test]
fn test_bottlenecks_from_saved_plan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");
    std::fs::write(&path, spilling_sort_plan()).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let document = ExplainDocument::parse(&raw).unwrap();
    let report = BottleneckReport::build(&document.plan, Selection::default());

    assert_eq!(report.total_nodes, 2);
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.items[0].label, "Seq Scan on holdings");
    assert_eq!(report.items[0].dominant, ContributingMetric::SharedReads);
    assert_eq!(report.items[1].node_type, "Sort");
    assert_eq!(report.items[1].dominant, ContributingMetric::TempBlocks);
    assert_eq!(report.items[1].counters.shared_read_blocks, 0);
    assert!(report.items[1].hint.contains("work_mem"));

    let top = BottleneckReport::build(&document.plan, Selection::TopK { k: 1 });
    assert_eq!(top.items.len(), 1);
    assert_eq!(top.items[0].rank, 1);
}
