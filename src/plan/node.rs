//! Дерево плана выполнения
//!
//! Узел хранит фиксированный набор полей, нужных для метрик и отчетов, и
//! открытую карту остальных ключей плана, чтобы дерево можно было
//! сохранить без потерь. Стоимость и счетчики блоков сервер сообщает
//! накопительно: значение узла включает значения его потомков.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Узел плана выполнения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    /// Тип узла (Seq Scan, Hash Join, Sort, ...)
    #[serde(rename = "Node Type")]
    pub node_type: String,
    /// Имя таблицы
    #[serde(rename = "Relation Name", default, skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    /// Псевдоним
    #[serde(rename = "Alias", default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Оценка полной стоимости
    #[serde(rename = "Total Cost", default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    /// Оценка количества строк
    #[serde(rename = "Plan Rows", default, skip_serializing_if = "Option::is_none")]
    pub plan_rows: Option<f64>,
    /// Фактическое количество строк
    #[serde(rename = "Actual Rows", default, skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    /// Фактическое время узла (мс), есть только в плане с TIMING ON
    #[serde(rename = "Actual Total Time", default, skip_serializing_if = "Option::is_none")]
    pub actual_total_time: Option<f64>,
    /// Строки, отброшенные фильтром
    #[serde(rename = "Rows Removed by Filter", default, skip_serializing_if = "Option::is_none")]
    pub rows_removed_by_filter: Option<f64>,
    /// Попадания в разделяемый буферный кэш
    #[serde(rename = "Shared Hit Blocks", default, skip_serializing_if = "Option::is_none")]
    pub shared_hit_blocks: Option<u64>,
    /// Чтения разделяемых блоков
    #[serde(rename = "Shared Read Blocks", default, skip_serializing_if = "Option::is_none")]
    pub shared_read_blocks: Option<u64>,
    /// Чтения временных блоков
    #[serde(rename = "Temp Read Blocks", default, skip_serializing_if = "Option::is_none")]
    pub temp_read_blocks: Option<u64>,
    /// Записи временных блоков
    #[serde(rename = "Temp Written Blocks", default, skip_serializing_if = "Option::is_none")]
    pub temp_written_blocks: Option<u64>,
    /// Условие фильтрации
    #[serde(rename = "Filter", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Дочерние узлы
    #[serde(rename = "Plans", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
    /// Остальные поля узла
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Узел при обходе в прямом порядке
#[derive(Debug, Clone, Copy)]
pub struct NodeVisit<'a> {
    /// Номер узла в прямом порядке обхода (корень = 0)
    pub id: usize,
    /// Глубина (корень = 0)
    pub depth: usize,
    /// Узел
    pub node: &'a PlanNode,
}

impl PlanNode {
    /// Создает узел без счетчиков
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            relation_name: None,
            alias: None,
            total_cost: None,
            plan_rows: None,
            actual_rows: None,
            actual_total_time: None,
            rows_removed_by_filter: None,
            shared_hit_blocks: None,
            shared_read_blocks: None,
            temp_read_blocks: None,
            temp_written_blocks: None,
            filter: None,
            children: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Устанавливает таблицу
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation_name = Some(relation.into());
        self
    }

    /// Устанавливает оценку стоимости
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.total_cost = Some(cost);
        self
    }

    /// Устанавливает чтения разделяемых блоков
    pub fn with_shared_read(mut self, blocks: u64) -> Self {
        self.shared_read_blocks = Some(blocks);
        self
    }

    /// Устанавливает отброшенные фильтром строки
    pub fn with_rows_removed(mut self, rows: f64) -> Self {
        self.rows_removed_by_filter = Some(rows);
        self
    }

    /// Устанавливает временные блоки
    pub fn with_temp(mut self, read: u64, written: u64) -> Self {
        self.temp_read_blocks = Some(read);
        self.temp_written_blocks = Some(written);
        self
    }

    /// Устанавливает условие фильтрации
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Добавляет дочерний узел
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// Разбирает узел из JSON значения
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::plan_parse(format!("malformed plan node: {}", e)))
    }

    /// Таблица или псевдоним, по которому работает узел
    pub fn relation(&self) -> Option<&str> {
        self.relation_name.as_deref().or(self.alias.as_deref())
    }

    /// Человекочитаемая метка: `Seq Scan on holdings`
    pub fn label(&self) -> String {
        match self.relation() {
            Some(relation) => format!("{} on {}", self.node_type, relation),
            None => self.node_type.clone(),
        }
    }

    /// Чтения и записи временных блоков
    pub fn temp_blocks(&self) -> u64 {
        self.temp_read_blocks.unwrap_or(0) + self.temp_written_blocks.unwrap_or(0)
    }

    /// Количество узлов в поддереве
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(PlanNode::node_count).sum::<usize>()
    }

    /// Обходит дерево в прямом порядке
    pub fn visit<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(NodeVisit<'a>),
    {
        let mut next_id = 0;
        Self::visit_inner(self, 0, &mut next_id, &mut f);
    }

    fn visit_inner<'a, F>(node: &'a PlanNode, depth: usize, next_id: &mut usize, f: &mut F)
    where
        F: FnMut(NodeVisit<'a>),
    {
        let id = *next_id;
        *next_id += 1;
        f(NodeVisit { id, depth, node });
        for child in &node.children {
            Self::visit_inner(child, depth + 1, next_id, f);
        }
    }
}

/// Результат EXPLAIN: корень плана и общие тайминги
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainDocument {
    /// Корень плана
    #[serde(rename = "Plan")]
    pub plan: PlanNode,
    /// Время планирования (мс)
    #[serde(rename = "Planning Time", default, skip_serializing_if = "Option::is_none")]
    pub planning_time_ms: Option<f64>,
    /// Время выполнения (мс)
    #[serde(rename = "Execution Time", default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
}

impl ExplainDocument {
    /// Оборачивает готовое дерево
    pub fn from_plan(plan: PlanNode) -> Self {
        Self {
            plan,
            planning_time_ms: None,
            execution_time_ms: None,
        }
    }

    /// Разбирает вывод EXPLAIN (FORMAT JSON).
    ///
    /// Принимает `[{"Plan": ...}]`, `{"Plan": ...}` или голый узел. Если
    /// вывод содержит посторонний текст, берется фрагмент от первой `[` до
    /// последней `]`.
    pub fn parse(raw: &str) -> Result<Self> {
        let value = match serde_json::from_str::<serde_json::Value>(raw.trim()) {
            Ok(value) => value,
            Err(first_error) => {
                let start = raw.find('[');
                let end = raw.rfind(']');
                match (start, end) {
                    (Some(start), Some(end)) if start < end => {
                        serde_json::from_str(&raw[start..=end]).map_err(|e| {
                            Error::plan_parse(format!("cannot locate plan JSON: {}", e))
                        })?
                    }
                    _ => {
                        return Err(Error::plan_parse(format!(
                            "plan output is not JSON: {}",
                            first_error
                        )))
                    }
                }
            }
        };
        Self::from_json_value(value)
    }

    /// Разбирает уже декодированный JSON
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let document = match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .next()
                .ok_or_else(|| Error::plan_parse("plan array is empty"))?,
            other => other,
        };

        let serde_json::Value::Object(mut fields) = document else {
            return Err(Error::plan_parse("plan document is not a JSON object"));
        };

        if let Some(plan) = fields.remove("Plan") {
            let planning_time_ms = optional_number(&fields, "Planning Time")?;
            let execution_time_ms = optional_number(&fields, "Execution Time")?;
            return Ok(Self {
                plan: PlanNode::from_json_value(plan)?,
                planning_time_ms,
                execution_time_ms,
            });
        }

        if fields.contains_key("Node Type") {
            return Ok(Self::from_plan(PlanNode::from_json_value(
                serde_json::Value::Object(fields),
            )?));
        }

        Err(Error::plan_parse(
            "plan document has neither \"Plan\" nor \"Node Type\"",
        ))
    }
}

fn optional_number(
    fields: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<f64>> {
    match fields.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::plan_parse(format!("\"{}\" is not a number", key))),
    }
}
