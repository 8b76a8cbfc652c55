use keel::{
    async_trait, bail,
    driver::{Capability, Driver, QueryResult, QueryRunner},
    Error, Result, Row, Value,
};

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

/// Results handed out in order, one per statement. An empty queue answers
/// with an empty result.
#[derive(Debug, Clone, Default)]
pub struct Responses {
    queue: Arc<Mutex<VecDeque<Result<QueryResult>>>>,
}

impl Responses {
    pub fn push(&self, result: Result<QueryResult>) {
        self.queue.lock().expect("responses poisoned").push_back(result);
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.push(Ok(QueryResult::from_records(rows)));
    }

    pub fn push_affected(&self, affected: u64) {
        self.push(Ok(QueryResult::affected(affected)));
    }

    pub fn push_error(&self, err: Error) {
        self.push(Err(err));
    }

    fn next(&self) -> Result<QueryResult> {
        self.queue
            .lock()
            .expect("responses poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(QueryResult::default()))
    }
}

/// A driver with no database behind it; it only follows its script.
#[derive(Debug)]
pub struct ScriptedDriver {
    capability: &'static Capability,
    responses: Responses,
}

impl ScriptedDriver {
    pub fn new(capability: &'static Capability, responses: Responses) -> Self {
        Self {
            capability,
            responses,
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn capability(&self) -> &'static Capability {
        self.capability
    }

    async fn create_query_runner(&self) -> Result<Arc<dyn QueryRunner>> {
        Ok(Arc::new(ScriptedRunner {
            responses: self.responses.clone(),
            transaction: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }))
    }
}

struct ScriptedRunner {
    responses: Responses,
    transaction: AtomicBool,
    released: AtomicBool,
}

#[async_trait]
impl QueryRunner for ScriptedRunner {
    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        if self.is_released() {
            bail!("query runner already released");
        }
        self.responses.next()
    }

    async fn start_transaction(&self) -> Result<()> {
        if self.transaction.swap(true, Ordering::SeqCst) {
            bail!("transaction already started");
        }
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        if !self.transaction.swap(false, Ordering::SeqCst) {
            bail!("no transaction to commit");
        }
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        if !self.transaction.swap(false, Ordering::SeqCst) {
            bail!("no transaction to roll back");
        }
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.transaction.load(Ordering::SeqCst)
    }

    async fn release(&self) -> Result<()> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}
