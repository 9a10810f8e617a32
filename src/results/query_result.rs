use std::sync::Arc;

use super::row::{ResultRow, index_columns};
use crate::types::Value;

/// The outcome of one query execution
///
/// Built once from the backend response with every row materialized up front; there is no
/// cursor and no way to mutate it afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    affected_rows: u64,
    rows: Vec<ResultRow>,
}

impl QueryResult {
    /// A result without rows, e.g. for DDL or BEGIN/COMMIT.
    #[must_use]
    pub fn empty(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            rows: Vec::new(),
        }
    }

    /// Build a result whose rows all share `column_names`.
    #[must_use]
    pub fn new(affected_rows: u64, column_names: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        let column_names = Arc::new(column_names);
        let rows = rows
            .into_iter()
            .map(|values| {
                ResultRow::with_index(
                    Arc::clone(&column_names),
                    Arc::clone(&column_index),
                    values,
                )
            })
            .collect();
        Self {
            affected_rows,
            rows,
        }
    }

    /// Build a result from rows that may come from different statements.
    #[must_use]
    pub fn from_rows(affected_rows: u64, rows: Vec<ResultRow>) -> Self {
        Self {
            affected_rows,
            rows,
        }
    }

    /// Rows inserted/updated/deleted, or returned for a SELECT.
    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    #[must_use]
    pub fn first(&self) -> Option<&ResultRow> {
        self.rows.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
