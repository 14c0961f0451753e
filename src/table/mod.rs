//! Quantity table: columns, summary row, sorting and click selection.

pub mod columns;
pub mod selection;

pub use columns::{format_quantity, Align, Column};
pub use selection::{SelectionSource, TableSelection};

use crate::model::{QuantityData, QuantityRow};
use serde::Serialize;
use std::cmp::Ordering;

/// Sort order applied to the data rows. The summary row is never sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: usize,
    pub descending: bool,
}

/// Sums beneath all data rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub total: u64,
    pub volume: f64,
    pub level_counts: Vec<(String, usize)>,
}

impl SummaryRow {
    #[must_use]
    pub fn cell(&self, column: &Column) -> String {
        match column {
            Column::Name => "Total".to_string(),
            Column::ElementType => String::new(),
            Column::Total => self.total.to_string(),
            Column::Quantity => {
                if self.volume > 0.0 {
                    format!("{} m³", round3(self.volume))
                } else {
                    "0".to_string()
                }
            }
            Column::Level(level) => self
                .level_counts
                .iter()
                .find(|(name, _)| name == level)
                .map_or(0, |(_, count)| *count)
                .to_string(),
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Default)]
pub struct QuantityTable {
    rows: Vec<QuantityRow>,
    levels: Vec<String>,
    columns: Vec<Column>,
}

impl QuantityTable {
    #[must_use]
    pub fn new(rows: Vec<QuantityRow>, levels: Vec<String>) -> Self {
        let columns = Column::FIXED
            .into_iter()
            .chain(levels.iter().cloned().map(Column::Level))
            .collect();
        Self {
            rows,
            levels,
            columns,
        }
    }

    #[must_use]
    pub fn from_data(data: &QuantityData) -> Self {
        Self::new(data.data.clone(), data.level_names())
    }

    #[must_use]
    pub fn rows(&self) -> &[QuantityRow] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&QuantityRow> {
        self.rows.get(index)
    }

    #[must_use]
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> SummaryRow {
        SummaryRow {
            total: self.rows.iter().map(|r| r.total).sum(),
            volume: self.rows.iter().map(|r| r.volume).sum(),
            level_counts: self
                .levels
                .iter()
                .map(|level| {
                    let count = self.rows.iter().map(|r| r.levels.count(level)).sum();
                    (level.clone(), count)
                })
                .collect(),
        }
    }

    /// Row indices in display order.
    #[must_use]
    pub fn sorted_indices(&self, sort: Option<SortKey>) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.rows.len()).collect();
        let Some(sort) = sort else {
            return indices;
        };
        let Some(column) = self.columns.get(sort.column) else {
            return indices;
        };

        indices.sort_by(|&a, &b| {
            let ordering = compare_rows(column, &self.rows[a], &self.rows[b]);
            if sort.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        indices
    }
}

fn compare_rows(column: &Column, a: &QuantityRow, b: &QuantityRow) -> Ordering {
    match column {
        Column::Name => a.name.cmp(&b.name),
        Column::ElementType => a.element_type.cmp(&b.element_type),
        Column::Total => a.total.cmp(&b.total),
        Column::Quantity => displayed_measure(a).total_cmp(&displayed_measure(b)),
        Column::Level(level) => a.levels.count(level).cmp(&b.levels.count(level)),
    }
}

fn displayed_measure(row: &QuantityRow) -> f64 {
    if row.volume > 0.0 {
        row.volume
    } else {
        row.length.max(0.0)
    }
}
