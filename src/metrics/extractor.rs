//! Извлечение метрик из дерева плана

use crate::plan::PlanNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Метрики одного запуска запроса
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Стоимость корня плана
    pub total_cost: f64,
    /// Сумма чтений разделяемых блоков по всем узлам
    pub shared_read_blocks: u64,
    /// Сумма попаданий в буферный кэш по всем узлам
    pub shared_hit_blocks: u64,
    /// Сумма строк, отброшенных фильтрами
    pub rows_removed_by_filter: f64,
    /// Сумма чтений временных блоков
    pub temp_read_blocks: u64,
    /// Сумма записей временных блоков
    pub temp_written_blocks: u64,
    /// Оценка строк корня
    pub plan_rows: f64,
    /// Фактические строки корня
    pub actual_rows: f64,
    /// Количество узлов
    pub node_count: usize,
    /// Типы узлов и сколько раз каждый встретился
    pub scan_types: BTreeMap<String, u64>,
}

impl Metrics {
    /// Все временные блоки (чтение и запись)
    pub fn temp_blocks(&self) -> u64 {
        self.temp_read_blocks + self.temp_written_blocks
    }

    /// Встречался ли тип узла
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.scan_types.contains_key(node_type)
    }
}

/// Сворачивает дерево плана в метрики.
///
/// Стоимость берется у корня: сервер сообщает ее накопительно. Счетчики
/// блоков и строк суммируются по всем узлам, отсутствующие поля дают ноль.
pub fn extract(root: &PlanNode) -> Metrics {
    let mut metrics = Metrics {
        total_cost: root.total_cost.unwrap_or(0.0),
        plan_rows: root.plan_rows.unwrap_or(0.0),
        actual_rows: root.actual_rows.unwrap_or(0.0),
        ..Metrics::default()
    };

    root.visit(|visit| {
        let node = visit.node;
        metrics.node_count += 1;
        metrics.shared_read_blocks += node.shared_read_blocks.unwrap_or(0);
        metrics.shared_hit_blocks += node.shared_hit_blocks.unwrap_or(0);
        metrics.rows_removed_by_filter += node.rows_removed_by_filter.unwrap_or(0.0);
        metrics.temp_read_blocks += node.temp_read_blocks.unwrap_or(0);
        metrics.temp_written_blocks += node.temp_written_blocks.unwrap_or(0);
        *metrics.scan_types.entry(node.node_type.clone()).or_insert(0) += 1;
    });

    metrics
}
