use tokio_postgres::{Error as PgError, SimpleQueryMessage, SimpleQueryRow};

use crate::error::StoreError;
use crate::results::QueryResult;
use crate::types::Value;

/// Fold simple-query messages into a [`QueryResult`].
///
/// A multi-statement string yields one `CommandComplete` per statement; the last complete
/// statement wins, as with libpq.
#[must_use]
pub fn build_query_result(messages: Vec<SimpleQueryMessage>) -> QueryResult {
    let mut collector = StatementCollector::default();
    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => {
                collector.push_row(|| column_names(&row), row_values(&row));
            }
            SimpleQueryMessage::CommandComplete(affected) => collector.complete(affected),
            _ => {}
        }
    }
    collector.finish()
}

fn column_names(row: &SimpleQueryRow) -> Vec<String> {
    row.columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

/// The simple-query protocol returns text for every column; NULL stays NULL.
fn row_values(row: &SimpleQueryRow) -> Vec<Value> {
    (0..row.len())
        .map(|idx| row.get(idx).map_or(Value::Null, |text| Value::Text(text.to_string())))
        .collect()
}

#[derive(Debug, Default)]
struct StatementCollector {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    result: QueryResult,
}

impl StatementCollector {
    fn push_row(&mut self, columns: impl FnOnce() -> Vec<String>, values: Vec<Value>) {
        if self.rows.is_empty() {
            self.columns = columns();
        }
        self.rows.push(values);
    }

    fn complete(&mut self, affected_rows: u64) {
        self.result = QueryResult::new(
            affected_rows,
            std::mem::take(&mut self.columns),
            std::mem::take(&mut self.rows),
        );
    }

    fn finish(self) -> QueryResult {
        self.result
    }
}

/// Map a driver error onto the crate taxonomy.
///
/// Server-side errors carry a SQLSTATE and become classified query errors; everything else is
/// a transport failure.
#[must_use]
pub fn classify_error(err: &PgError, query: &str) -> StoreError {
    if let Some(db_error) = err.as_db_error() {
        return StoreError::query(db_error.code().code(), db_error.message(), query);
    }
    StoreError::Connect(err.to_string())
}

/// Classification without the query text, for errors raised outside a query.
impl From<PgError> for StoreError {
    fn from(err: PgError) -> Self {
        classify_error(&err, "")
    }
}
