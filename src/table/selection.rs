use super::QuantityTable;
use crate::model::SelectionSet;

/// What produced the current selection. Only one source is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionSource {
    #[default]
    None,
    Row(usize),
    Level(String),
}

/// Selection state driven by row and level-header clicks.
#[derive(Debug, Clone, Default)]
pub struct TableSelection {
    source: SelectionSource,
    ids: SelectionSet,
}

impl TableSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn source(&self) -> &SelectionSource {
        &self.source
    }

    #[must_use]
    pub fn ids(&self) -> &SelectionSet {
        &self.ids
    }

    /// Level whose header is marked as selected.
    #[must_use]
    pub fn selected_level(&self) -> Option<&str> {
        match &self.source {
            SelectionSource::Level(level) => Some(level),
            _ => None,
        }
    }

    #[must_use]
    pub fn selected_row(&self) -> Option<usize> {
        match self.source {
            SelectionSource::Row(index) => Some(index),
            _ => None,
        }
    }

    /// Selects every express ID of the row, across all of its levels.
    /// Any level selection is dropped.
    pub fn click_row(&mut self, table: &QuantityTable, index: usize) -> &SelectionSet {
        match table.row(index) {
            Some(row) => {
                self.ids = SelectionSet::flattened(row.express_ids());
                self.source = SelectionSource::Row(index);
            }
            None => self.clear(),
        }
        &self.ids
    }

    /// Selects every element on `level`; clicking the selected level again
    /// clears the selection. Any row selection is dropped.
    pub fn click_level(&mut self, table: &QuantityTable, level: &str) -> &SelectionSet {
        if self.selected_level() == Some(level) {
            self.clear();
            return &self.ids;
        }

        let ids = table
            .rows()
            .iter()
            .filter_map(|row| row.levels.get(level))
            .filter(|quantity| quantity.count > 0)
            .flat_map(|quantity| quantity.express_ids.iter().copied());
        self.ids = SelectionSet::union(ids);
        self.source = SelectionSource::Level(level.to_string());
        &self.ids
    }

    pub fn clear(&mut self) {
        self.source = SelectionSource::None;
        self.ids.clear();
    }
}
