//! Диагностический план с замером времени по узлам
//!
//! Время узлов не попадает ни в метрики, ни в сводную оценку: замер
//! TIMING ON сам искажает время выполнения.

use crate::plan::PlanNode;
use serde::{Deserialize, Serialize};

/// Время одного узла плана
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTime {
    /// Номер узла в прямом порядке обхода
    pub node_id: usize,
    /// Тип узла
    pub node_type: String,
    /// Таблица или псевдоним
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// Фактическое время (мс), включая потомков
    pub actual_total_time: f64,
    /// Фактическое количество строк
    pub actual_rows: f64,
    /// Оценка количества строк
    pub plan_rows: f64,
    /// Чтения разделяемых блоков
    pub shared_read_blocks: u64,
    /// Временные блоки
    pub temp_blocks: u64,
}

/// Результат диагностического плана
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingPlan {
    /// Время получения плана (мс)
    pub elapsed_ms: u64,
    /// Самые медленные узлы по убыванию времени
    pub top_nodes: Vec<NodeTime>,
}

/// Отбирает `limit` узлов с наибольшим фактическим временем.
///
/// Узлы без времени считаются нулевыми; при равенстве раньше идет узел с
/// меньшим номером.
pub fn top_nodes_by_time(root: &PlanNode, limit: usize) -> Vec<NodeTime> {
    let mut nodes = Vec::with_capacity(root.node_count());
    root.visit(|visit| {
        let node = visit.node;
        nodes.push(NodeTime {
            node_id: visit.id,
            node_type: node.node_type.clone(),
            relation: node.relation().map(str::to_string),
            actual_total_time: node.actual_total_time.unwrap_or(0.0),
            actual_rows: node.actual_rows.unwrap_or(0.0),
            plan_rows: node.plan_rows.unwrap_or(0.0),
            shared_read_blocks: node.shared_read_blocks.unwrap_or(0),
            temp_blocks: node.temp_blocks(),
        });
    });
    nodes.sort_by(|a, b| {
        b.actual_total_time
            .total_cmp(&a.actual_total_time)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    nodes.truncate(limit);
    nodes
}
