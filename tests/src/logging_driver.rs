use keel::{
    async_trait,
    driver::{Capability, Driver, QueryResult, QueryRunner},
    Result, Value,
};

use std::sync::{Arc, Mutex};

/// Wraps a driver and records everything its runners do.
#[derive(Debug)]
pub struct LoggingDriver {
    inner: Box<dyn Driver>,

    /// Shared with every runner the driver hands out
    ops_log: Arc<Mutex<Vec<DriverOp>>>,
}

impl LoggingDriver {
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self {
            inner: driver,
            ops_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn ops_log_handle(&self) -> Arc<Mutex<Vec<DriverOp>>> {
        self.ops_log.clone()
    }
}

#[async_trait]
impl Driver for LoggingDriver {
    fn capability(&self) -> &'static Capability {
        self.inner.capability()
    }

    async fn create_query_runner(&self) -> Result<Arc<dyn QueryRunner>> {
        let inner = self.inner.create_query_runner().await?;
        self.log(DriverOp::Connect);

        Ok(Arc::new(LoggingRunner {
            inner,
            ops_log: self.ops_log_handle(),
        }))
    }
}

impl LoggingDriver {
    fn log(&self, op: DriverOp) {
        self.ops_log.lock().expect("ops log poisoned").push(op);
    }
}

/// One thing a runner did.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverOp {
    Connect,
    Query {
        sql: String,
        params: Vec<Value>,
        result: Option<QueryResult>,
    },
    Begin,
    Commit,
    Rollback,
    Release,
}

impl DriverOp {
    pub fn sql(&self) -> Option<&str> {
        match self {
            DriverOp::Query { sql, .. } => Some(sql),
            _ => None,
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, DriverOp::Query { .. })
    }
}

struct LoggingRunner {
    inner: Arc<dyn QueryRunner>,
    ops_log: Arc<Mutex<Vec<DriverOp>>>,
}

impl LoggingRunner {
    fn log(&self, op: DriverOp) {
        self.ops_log.lock().expect("ops log poisoned").push(op);
    }
}

#[async_trait]
impl QueryRunner for LoggingRunner {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let res = self.inner.query(sql, params).await;

        // Failed statements are logged too, without a result
        self.log(DriverOp::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
            result: res.as_ref().ok().cloned(),
        });

        res
    }

    async fn start_transaction(&self) -> Result<()> {
        self.inner.start_transaction().await?;
        self.log(DriverOp::Begin);
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        self.inner.commit_transaction().await?;
        self.log(DriverOp::Commit);
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        self.inner.rollback_transaction().await?;
        self.log(DriverOp::Rollback);
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.inner.is_transaction_active()
    }

    async fn release(&self) -> Result<()> {
        self.inner.release().await?;
        self.log(DriverOp::Release);
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.inner.is_released()
    }
}
