//! Общие данные для интеграционных тестов

use queryeval::{ColumnDesc, EvaluationConfig, QuerySpec, RecordedExecutor, ResultSet, Value};
use serde_json::json;

/// Запрос по счетам акционера
pub const HOLDINGS_SQL: &str =
    "SELECT id, account_id, amount FROM holdings WHERE account_id = :acc ORDER BY id";

/// Переписанный запрос с другим порядком строк
pub const HOLDINGS_DESC_SQL: &str =
    "SELECT id, account_id, amount FROM holdings WHERE account_id = :acc ORDER BY id DESC";

/// Запрос с параметром `acc = 42`
pub fn holdings_query(sql: &str) -> QuerySpec {
    QuerySpec::new(sql).bind("acc", queryeval::BindValue::Integer(42))
}

/// План одного сканирования таблицы holdings
pub fn scan_plan(node_type: &str, cost: f64, reads: u64) -> String {
    let rows_removed = if node_type == "Seq Scan" { 9000 } else { 0 };
    json!([{
        "Plan": {
            "Node Type": node_type,
            "Relation Name": "holdings",
            "Alias": "h",
            "Total Cost": cost,
            "Plan Rows": 3,
            "Actual Rows": 3,
            "Shared Hit Blocks": 2,
            "Shared Read Blocks": reads,
            "Rows Removed by Filter": rows_removed,
            "Filter": "(account_id = 42)"
        },
        "Planning Time": 0.1,
        "Execution Time": 4.2
    }])
    .to_string()
}

/// План с сортировкой, сбрасывающей данные на диск
pub fn spilling_sort_plan() -> String {
    json!([{
        "Plan": {
            "Node Type": "Sort",
            "Total Cost": 900.0,
            "Shared Read Blocks": 400,
            "Temp Read Blocks": 120,
            "Temp Written Blocks": 120,
            "Plans": [{
                "Node Type": "Seq Scan",
                "Relation Name": "holdings",
                "Total Cost": 600.0,
                "Shared Read Blocks": 400,
                "Rows Removed by Filter": 20000,
                "Filter": "(amount > 0)"
            }]
        }
    }])
    .to_string()
}

/// Три строки результата
pub fn holdings_rows(reversed: bool) -> ResultSet {
    let mut rows: Vec<Vec<Value>> = (1..=3)
        .map(|id| {
            vec![
                Value::Integer(id),
                Value::Integer(42),
                Value::Float(id as f64 * 10.5),
            ]
        })
        .collect();
    if reversed {
        rows.reverse();
    }
    ResultSet::new(
        vec![
            ColumnDesc::new("id", "bigint"),
            ColumnDesc::new("account_id", "integer"),
            ColumnDesc::new("amount", "double precision"),
        ],
        rows,
    )
}

/// Исполнитель, отвечающий одним планом на запрос holdings
pub fn executor_with_plan(plan_json: String) -> RecordedExecutor {
    RecordedExecutor::new()
        .with_plan(HOLDINGS_SQL, plan_json)
        .with_result(HOLDINGS_SQL, holdings_rows(false))
        .with_result(HOLDINGS_DESC_SQL, holdings_rows(true))
}

/// Конфигурация без замеров времени
pub fn quiet_config() -> EvaluationConfig {
    EvaluationConfig {
        attach_bottlenecks: true,
        ..EvaluationConfig::default()
    }
}
