//! Оценка тяжести узлов плана и отбор узких мест

use crate::common::constants::{DEFAULT_BOTTLENECKS_PARETO, DEFAULT_BOTTLENECKS_TOP, MAX_FILTER_SAMPLE_CHARS};
use crate::common::EvaluationConfig;
use crate::plan::PlanNode;
use serde::{Deserialize, Serialize};
use std::fmt;

const READ_WEIGHT: f64 = 3.0;
const TEMP_WEIGHT: f64 = 2.0;
const ROWS_REMOVED_WEIGHT: f64 = 1.5;
const COST_WEIGHT: f64 = 1.0;
const COST_SCALE: f64 = 1000.0;

/// Метрика, вносящая наибольший вклад в тяжесть узла
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributingMetric {
    /// Чтения разделяемых блоков
    SharedReads,
    /// Временные блоки (сброс на диск)
    TempBlocks,
    /// Строки, отброшенные фильтром
    RowsRemovedByFilter,
    /// Собственная стоимость
    Cost,
}

impl fmt::Display for ContributingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContributingMetric::SharedReads => "shared reads",
            ContributingMetric::TempBlocks => "temp blocks",
            ContributingMetric::RowsRemovedByFilter => "rows removed by filter",
            ContributingMetric::Cost => "cost",
        };
        f.write_str(name)
    }
}

/// Собственные (без потомков) счетчики узла
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCounters {
    /// Собственная стоимость
    pub cost: f64,
    /// Собственные чтения разделяемых блоков
    pub shared_read_blocks: u64,
    /// Собственные временные блоки
    pub temp_blocks: u64,
    /// Строки, отброшенные фильтром узла
    pub rows_removed_by_filter: f64,
}

impl NodeCounters {
    /// Вычитает накопленные значения потомков из значений узла
    pub fn exclusive(node: &PlanNode) -> Self {
        let child_cost: f64 = node.children.iter().map(|c| c.total_cost.unwrap_or(0.0)).sum();
        let child_reads: u64 = node
            .children
            .iter()
            .map(|c| c.shared_read_blocks.unwrap_or(0))
            .sum();
        let child_temp: u64 = node.children.iter().map(PlanNode::temp_blocks).sum();

        Self {
            cost: (node.total_cost.unwrap_or(0.0) - child_cost).max(0.0),
            shared_read_blocks: node.shared_read_blocks.unwrap_or(0).saturating_sub(child_reads),
            temp_blocks: node.temp_blocks().saturating_sub(child_temp),
            rows_removed_by_filter: node.rows_removed_by_filter.unwrap_or(0.0).max(0.0),
        }
    }

    /// Тяжесть и доминирующая метрика
    pub fn severity(&self) -> (f64, ContributingMetric) {
        let terms = [
            (
                READ_WEIGHT * (self.shared_read_blocks as f64).ln_1p(),
                ContributingMetric::SharedReads,
            ),
            (
                TEMP_WEIGHT * (self.temp_blocks as f64).ln_1p(),
                ContributingMetric::TempBlocks,
            ),
            (
                ROWS_REMOVED_WEIGHT * self.rows_removed_by_filter.ln_1p(),
                ContributingMetric::RowsRemovedByFilter,
            ),
            (
                COST_WEIGHT * (self.cost / COST_SCALE).ln_1p(),
                ContributingMetric::Cost,
            ),
        ];

        let severity: f64 = terms.iter().map(|(value, _)| value).sum();
        // При равенстве побеждает метрика, стоящая раньше в списке
        let dominant = terms
            .iter()
            .fold(terms[0], |best, term| if term.0 > best.0 { *term } else { best })
            .1;
        (severity, dominant)
    }
}

/// Узкое место плана
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    /// Место в рейтинге (с единицы)
    pub rank: usize,
    /// Номер узла в прямом порядке обхода
    pub node_id: usize,
    /// Глубина узла
    pub depth: usize,
    /// Тип узла
    pub node_type: String,
    /// Таблица
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// Метка для отчета
    pub label: String,
    /// Тяжесть
    pub severity: f64,
    /// Доминирующая метрика
    pub dominant: ContributingMetric,
    /// Собственные счетчики
    pub counters: NodeCounters,
    /// Подсказка
    pub hint: String,
    /// Условие фильтрации (усеченное)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Режим отбора узких мест
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Selection {
    /// Пока накопленная доля тяжести не достигнет порога
    Pareto {
        /// Порог в (0, 1]
        threshold: f64,
    },
    /// Фиксированное количество
    TopK {
        /// Количество
        k: usize,
    },
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Pareto {
            threshold: DEFAULT_BOTTLENECKS_PARETO,
        }
    }
}

impl Selection {
    /// Режим по порогу и количеству: нулевой порог включает top-K
    pub fn from_parameters(pareto: f64, top: usize) -> Self {
        if pareto > 0.0 {
            Selection::Pareto {
                threshold: pareto.min(1.0),
            }
        } else {
            Selection::TopK {
                k: if top == 0 { DEFAULT_BOTTLENECKS_TOP } else { top },
            }
        }
    }

    /// Режим из конфигурации
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::from_parameters(config.bottlenecks_pareto, config.bottlenecks_top)
    }
}

/// Ранжирует узлы плана по убыванию тяжести.
///
/// В список попадают все узлы, включая узлы с нулевой тяжестью. При
/// равной тяжести раньше идет узел с меньшим номером.
pub fn rank_nodes(root: &PlanNode) -> Vec<Bottleneck> {
    let mut ranked = Vec::new();
    root.visit(|visit| {
        let counters = NodeCounters::exclusive(visit.node);
        let (severity, dominant) = counters.severity();
        ranked.push(Bottleneck {
            rank: 0,
            node_id: visit.id,
            depth: visit.depth,
            node_type: visit.node.node_type.clone(),
            relation: visit.node.relation().map(str::to_string),
            label: visit.node.label(),
            severity,
            dominant,
            counters,
            hint: hint_for(&visit.node.node_type, dominant).to_string(),
            filter: visit.node.filter.as_deref().map(truncate_filter),
        });
    });

    ranked.sort_by(|a, b| {
        b.severity
            .total_cmp(&a.severity)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    for (i, item) in ranked.iter_mut().enumerate() {
        item.rank = i + 1;
    }
    ranked
}

/// Отбирает узкие места из ранжированного списка
pub fn select(ranked: Vec<Bottleneck>, selection: Selection) -> Vec<Bottleneck> {
    match selection {
        Selection::Pareto { threshold } => {
            let total: f64 = ranked.iter().map(|b| b.severity).sum();
            if total <= 0.0 {
                return Vec::new();
            }
            let mut cumulative = 0.0;
            let mut kept = Vec::new();
            for item in ranked {
                if item.severity <= 0.0 {
                    break;
                }
                cumulative += item.severity;
                kept.push(item);
                if cumulative / total >= threshold {
                    break;
                }
            }
            kept
        }
        Selection::TopK { k } => ranked.into_iter().take(k).collect(),
    }
}

/// Отчет об узких местах
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckReport {
    /// Режим отбора
    pub selection: Selection,
    /// Узлов в плане
    pub total_nodes: usize,
    /// Суммарная тяжесть всех узлов
    pub total_severity: f64,
    /// Доля тяжести, покрытая отобранными узлами
    pub covered_share: f64,
    /// Отобранные узлы
    pub items: Vec<Bottleneck>,
}

impl BottleneckReport {
    /// Строит отчет по плану
    pub fn build(root: &PlanNode, selection: Selection) -> Self {
        let ranked = rank_nodes(root);
        let total_severity: f64 = ranked.iter().map(|b| b.severity).sum();
        let items = select(ranked, selection);
        let selected: f64 = items.iter().map(|b| b.severity).sum();

        Self {
            selection,
            total_nodes: root.node_count(),
            total_severity,
            covered_share: if total_severity > 0.0 {
                selected / total_severity
            } else {
                0.0
            },
            items,
        }
    }

    /// Пуст ли отчет
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Подсказка по типу узла и доминирующей метрике
pub fn hint_for(node_type: &str, dominant: ContributingMetric) -> &'static str {
    if dominant == ContributingMetric::TempBlocks {
        return "Сброс на диск: уменьшите входной поток или увеличьте work_mem";
    }
    match node_type {
        "Seq Scan" => "Добавьте или уточните индекс, фильтруйте раньше, рассмотрите Bitmap/Index Scan",
        "Bitmap Heap Scan" | "Bitmap Index Scan" => {
            "Проверьте селективность и ключи соединения, рассмотрите покрывающий индекс"
        }
        "Sort" | "Incremental Sort" => {
            "Сократите строки до сортировки, добавьте индекс под ORDER BY, настройте work_mem"
        }
        "Hash Join" | "HashAggregate" => {
            "Уменьшите строящуюся сторону, добавьте индекс для соединения, следите за work_mem"
        }
        "Nested Loop" => "Нужен индекс по ключу соединения внутренней стороны, рассмотрите другой порядок соединений",
        "Merge Join" => "Избегайте глобальных сортировок: индексы могут дать нужный порядок",
        "WindowAgg" => "Замените на LATERAL/LIMIT 1 или DISTINCT ON, фильтруйте разделы заранее",
        _ => "Проталкивайте фильтры, подберите индексы, уменьшите промежуточные результаты",
    }
}

fn truncate_filter(filter: &str) -> String {
    let flat = filter.replace('\n', " ");
    if flat.chars().count() <= MAX_FILTER_SAMPLE_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(MAX_FILTER_SAMPLE_CHARS).collect();
    cut.push('…');
    cut
}
