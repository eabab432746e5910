//! Общие утилиты для тестирования

use crate::common::{ColumnDesc, ResultSet, Value};
use crate::plan::PlanNode;

/// Дерево плана с соединением двух таблиц, сортировкой и лимитом.
///
/// Счетчики накопительные, как их сообщает сервер.
pub fn holdings_plan() -> PlanNode {
    let seq_scan = PlanNode::new("Seq Scan")
        .with_relation("holdings")
        .with_cost(800.0)
        .with_shared_read(700)
        .with_rows_removed(5000.0)
        .with_filter("(account_id = 42)");
    let index_scan = PlanNode::new("Index Scan")
        .with_relation("accounts")
        .with_cost(250.0)
        .with_shared_read(200);
    let hash_join = PlanNode::new("Hash Join")
        .with_cost(1100.0)
        .with_shared_read(900)
        .with_child(seq_scan)
        .with_child(index_scan);
    let sort = PlanNode::new("Sort")
        .with_cost(1190.0)
        .with_shared_read(900)
        .with_temp(40, 40)
        .with_child(hash_join);
    PlanNode::new("Limit")
        .with_cost(1200.0)
        .with_shared_read(900)
        .with_temp(40, 40)
        .with_child(sort)
}

/// Тот же план в виде вывода `EXPLAIN (FORMAT JSON)`
pub fn holdings_plan_json() -> String {
    serde_json::json!([{
        "Plan": holdings_plan(),
        "Planning Time": 0.25,
        "Execution Time": 12.5
    }])
    .to_string()
}

/// План из одного узла с заданными стоимостью и чтениями
pub fn single_scan_plan(cost: f64, reads: u64) -> PlanNode {
    PlanNode::new("Seq Scan")
        .with_relation("holdings")
        .with_cost(cost)
        .with_shared_read(reads)
}

/// Результат с колонками `(id integer, name text)`
pub fn id_name_rows(rows: &[(i64, &str)]) -> ResultSet {
    ResultSet::new(
        vec![ColumnDesc::new("id", "integer"), ColumnDesc::new("name", "text")],
        rows.iter()
            .map(|(id, name)| vec![Value::Integer(*id), Value::Text(name.to_string())])
            .collect(),
    )
}

/// Результат из одной колонки `double precision`
pub fn float_rows(values: &[f64]) -> ResultSet {
    ResultSet::new(
        vec![ColumnDesc::new("x", "double precision")],
        values.iter().map(|v| vec![Value::Float(*v)]).collect(),
    )
}
