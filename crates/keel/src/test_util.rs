//! A driver that records statements and replays canned results.

use crate::{
    async_trait,
    driver::{Capability, Driver, QueryResult, QueryRunner},
    schema::{ColumnDef, EntityDef, OrderDirection, RelationDef},
    Db, Result, Row, Value,
};

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

#[derive(Debug, Default)]
pub(crate) struct Script {
    pub(crate) executed: Mutex<Vec<(String, Vec<Value>)>>,
    pub(crate) results: Mutex<VecDeque<QueryResult>>,
    pub(crate) runners: AtomicUsize,
    pub(crate) released: AtomicUsize,
}

impl Script {
    pub(crate) fn push_rows(&self, rows: Vec<Row>) {
        self.results
            .lock()
            .unwrap()
            .push_back(QueryResult::from_records(rows));
    }

    pub(crate) fn sql(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub(crate) fn params(&self, index: usize) -> Vec<Value> {
        self.executed.lock().unwrap()[index].1.clone()
    }
}

#[derive(Debug)]
pub(crate) struct StubDriver {
    capability: &'static Capability,
    script: Arc<Script>,
}

#[async_trait]
impl Driver for StubDriver {
    fn capability(&self) -> &'static Capability {
        self.capability
    }

    async fn create_query_runner(&self) -> Result<Arc<dyn QueryRunner>> {
        self.script.runners.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubRunner {
            script: self.script.clone(),
            transaction: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }))
    }
}

pub(crate) struct StubRunner {
    script: Arc<Script>,
    transaction: AtomicBool,
    released: AtomicBool,
}

#[async_trait]
impl QueryRunner for StubRunner {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.script
            .executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self
            .script
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn start_transaction(&self) -> Result<()> {
        self.transaction.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        self.transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        self.transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.transaction.load(Ordering::SeqCst)
    }

    async fn release(&self) -> Result<()> {
        self.released.store(true, Ordering::SeqCst);
        self.script.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Users with photos, posts with categories and a soft-delete column.
pub(crate) fn blog() -> Vec<EntityDef> {
    vec![
        EntityDef::new("User")
            .column(ColumnDef::primary_generated("id"))
            .column(ColumnDef::new("name", "varchar"))
            .relation(RelationDef::one_to_many("photos", "Photo", "user")),
        EntityDef::new("Photo")
            .column(ColumnDef::primary_generated("id"))
            .column(ColumnDef::new("url", "varchar"))
            .relation(RelationDef::many_to_one("user", "User").inverse("photos")),
        EntityDef::new("Post")
            .column(ColumnDef::primary_generated("id"))
            .column(ColumnDef::new("title", "varchar"))
            .column(ColumnDef::version("version"))
            .column(ColumnDef::delete_date("deletedAt"))
            .relation(
                RelationDef::many_to_many("categories", "Category")
                    .inverse("posts")
                    .join_table(),
            ),
        EntityDef::new("Category")
            .column(ColumnDef::primary_generated("id"))
            .column(ColumnDef::new("name", "varchar"))
            .relation(RelationDef::many_to_many("posts", "Post").inverse("categories")),
        EntityDef::new("Tag")
            .column(ColumnDef::primary_generated("id"))
            .column(ColumnDef::new("label", "varchar"))
            .order_by("label", OrderDirection::Asc),
    ]
}

pub(crate) fn db(capability: &'static Capability) -> (Db, Arc<Script>) {
    let script = Arc::new(Script::default());
    let mut builder = Db::builder();
    for def in blog() {
        builder.register(def);
    }

    let db = builder
        .build(StubDriver {
            capability,
            script: script.clone(),
        })
        .unwrap();
    (db, script)
}
