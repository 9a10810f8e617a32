use std::collections::HashMap;
use std::sync::Arc;

use crate::types::Value;

/// A row from a query result
///
/// Column names are shared by every row produced by the same statement; values are stored
/// positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    column_names: Arc<Vec<String>>,
    values: Vec<Value>,
    // column name -> position, shared with sibling rows
    column_index: Arc<HashMap<String, usize>>,
}

impl ResultRow {
    /// Create a row; `values` are matched to `column_names` by position.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<Value>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            values,
            column_index,
        }
    }

    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index: Arc<HashMap<String, usize>>,
        values: Vec<Value>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Position of `column_name`, if present. Duplicate names resolve to the first column.
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index.get(column_name).copied()
    }

    /// Value of `column_name`, or `None` when the row has no such column.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// The row as an ordered column → value mapping.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Map(
            self.column_names
                .iter()
                .cloned()
                .zip(self.values)
                .collect(),
        )
    }
}

pub(crate) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(column_names.len());
    for (position, name) in column_names.iter().enumerate() {
        index.entry(name.clone()).or_insert(position);
    }
    index
}
