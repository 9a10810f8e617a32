mod query_result;
mod row;

pub use query_result::QueryResult;
pub use row::ResultRow;
