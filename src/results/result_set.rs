use std::sync::Arc;

use super::row::{ColumnMeta, Columns, CustomDbRow};
use crate::types::{NestTables, RowValues};

/// Rows returned by a query plus the DML summary, if any.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub results: Vec<CustomDbRow>,
    /// Rows affected by an `INSERT`/`UPDATE`/`DELETE`
    pub rows_affected: u64,
    /// `LAST_INSERT_ID()` reported with the OK packet
    pub last_insert_id: Option<u64>,
    columns: Option<Arc<Columns>>,
}

impl ResultSet {
    /// Start a result set for the given column layout.
    #[must_use]
    pub fn new(columns: Vec<ColumnMeta>, nest_tables: &NestTables) -> Self {
        Self {
            results: Vec::new(),
            rows_affected: 0,
            last_insert_id: None,
            columns: Some(Arc::new(Columns::new(columns, nest_tables))),
        }
    }

    /// Result of a statement that returns no rows.
    #[must_use]
    pub fn affected(rows_affected: u64, last_insert_id: Option<u64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn columns(&self) -> Option<&Arc<Columns>> {
        self.columns.as_ref()
    }

    /// Append a row. Ignored when the set was built without columns.
    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        if let Some(columns) = &self.columns {
            self.results
                .push(CustomDbRow::new(Arc::clone(columns), values));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomDbRow> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a CustomDbRow;
    type IntoIter = std::slice::Iter<'a, CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = CustomDbRow;
    type IntoIter = std::vec::IntoIter<CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
