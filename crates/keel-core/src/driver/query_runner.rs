use crate::{
    async_trait,
    stmt::{Row, Value},
    Result,
};

use std::pin::Pin;
use tokio_stream::Stream;

/// Rows streamed back from the database one at a time.
pub type RowStream = Pin<Box<dyn Stream<Item = Result<Row>> + Send>>;

/// What the database returned for one statement.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct QueryResult {
    /// Rows returned by the statement, including `RETURNING` / `OUTPUT` rows.
    pub records: Vec<Row>,

    /// Number of rows affected, when the database reports it.
    pub affected: Option<u64>,

    /// Identifier generated by the last insert on databases without
    /// `RETURNING` (MySQL `insertId`, SQLite `last_insert_rowid`).
    pub insert_id: Option<Value>,
}

impl QueryResult {
    pub fn from_records(records: Vec<Row>) -> QueryResult {
        QueryResult {
            records,
            ..QueryResult::default()
        }
    }

    pub fn affected(affected: u64) -> QueryResult {
        QueryResult {
            affected: Some(affected),
            ..QueryResult::default()
        }
    }
}

/// One physical connection (or a logical placeholder for connectionless
/// databases).
///
/// Query builders never talk to a database directly; every statement goes
/// through a runner.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Executes `sql` with positional `params` already in driver order.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Executes `sql` and yields rows as they arrive.
    async fn stream(&self, sql: &str, params: &[Value]) -> Result<RowStream> {
        let result = self.query(sql, params).await?;
        Ok(Box::pin(tokio_stream::iter(
            result.records.into_iter().map(Ok),
        )))
    }

    async fn start_transaction(&self) -> Result<()>;

    async fn commit_transaction(&self) -> Result<()>;

    async fn rollback_transaction(&self) -> Result<()>;

    fn is_transaction_active(&self) -> bool;

    /// Returns the connection to its pool.
    async fn release(&self) -> Result<()>;

    fn is_released(&self) -> bool;
}
