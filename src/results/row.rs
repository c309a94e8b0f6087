use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{NestTables, RowValues};

/// Metadata for one result column as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Originating table (alias), empty for computed columns such as `SELECT 1`
    pub table: String,
}

impl ColumnMeta {
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
        }
    }

    /// Column with no originating table.
    #[must_use]
    pub fn computed(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

/// Column layout shared by every row of one result set.
#[derive(Debug, Clone, Default)]
pub struct Columns {
    metas: Vec<ColumnMeta>,
    names: Vec<String>,
    by_name: HashMap<String, usize>,
    by_table: HashMap<(String, String), usize>,
}

impl Columns {
    /// Build the lookup tables, applying the `nestTables` naming rule.
    #[must_use]
    pub fn new(metas: Vec<ColumnMeta>, nest_tables: &NestTables) -> Self {
        let names: Vec<String> = metas
            .iter()
            .map(|meta| match nest_tables {
                NestTables::Separator(sep) if !meta.table.is_empty() => {
                    format!("{}{sep}{}", meta.table, meta.name)
                }
                _ => meta.name.clone(),
            })
            .collect();

        // later columns win, the way an object literal built column by column would
        let by_name = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        let by_table = metas
            .iter()
            .enumerate()
            .map(|(idx, meta)| ((meta.table.clone(), meta.name.clone()), idx))
            .collect();

        Self {
            metas,
            names,
            by_name,
            by_table,
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn metas(&self) -> &[ColumnMeta] {
        &self.metas
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn index_of_nested(&self, table: &str, name: &str) -> Option<usize> {
        self.by_table
            .get(&(table.to_string(), name.to_string()))
            .copied()
    }
}

/// A row from a query result.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    columns: Arc<Columns>,
    /// The values for this row, in column order
    pub values: Vec<RowValues>,
}

impl CustomDbRow {
    #[must_use]
    pub fn new(columns: Arc<Columns>, values: Vec<RowValues>) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    /// Get a value by column name (after `nestTables` renaming).
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.columns
            .index_of(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value by originating table and column, e.g. `("u", "id")` for
    /// `SELECT u.id, p.id FROM users u JOIN posts p ...`.
    #[must_use]
    pub fn get_nested(&self, table: &str, column_name: &str) -> Option<&RowValues> {
        self.columns
            .index_of_nested(table, column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    /// Values of one table, keyed by column name.
    #[must_use]
    pub fn table_values(&self, table: &str) -> Vec<(&str, &RowValues)> {
        self.columns
            .metas()
            .iter()
            .zip(&self.values)
            .filter(|(meta, _)| meta.table == table)
            .map(|(meta, value)| (meta.name.as_str(), value))
            .collect()
    }
}
