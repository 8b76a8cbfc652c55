use crate::{Db, Result};

use keel_core::{
    driver::{QueryResult, QueryRunner, RowStream},
    err,
    stmt::Value,
    Error,
};
use keel_sql::Statement;

use indexmap::IndexMap;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// One execution of a builder: the runner it runs on and the transaction
/// it started, if any.
pub(crate) struct Session {
    db: Db,
    runner: Arc<dyn QueryRunner>,

    /// The runner was obtained for this execution and is released at the
    /// end of it.
    owned: bool,

    /// A transaction was started for this execution.
    started_transaction: bool,
}

impl Session {
    /// Uses `bound` when given, otherwise obtains a runner from the driver.
    pub(crate) async fn open(
        db: &Db,
        bound: Option<&Arc<dyn QueryRunner>>,
        use_transaction: bool,
    ) -> Result<Session> {
        if !db.capability().sql {
            return Err(Error::unsupported_feature(format!(
                "query builders need a SQL database; {:?} is not one",
                db.capability().kind
            )));
        }

        let runner = match bound {
            Some(runner) => runner.clone(),
            None => db.create_query_runner().await?,
        };
        let owned = bound.is_none();

        let mut session = Session {
            db: db.clone(),
            runner,
            owned,
            started_transaction: false,
        };

        if use_transaction && !session.runner.is_transaction_active() {
            if let Err(err) = session.runner.start_transaction().await {
                session.release().await;
                return Err(err);
            }
            info!(target: "keel::query", "transaction started");
            session.started_transaction = true;
        }

        Ok(session)
    }

    /// Runs one statement in a session of its own.
    pub(crate) async fn run(
        db: &Db,
        bound: Option<&Arc<dyn QueryRunner>>,
        use_transaction: bool,
        stmt: &Statement,
        params: &IndexMap<String, Value>,
    ) -> Result<QueryResult> {
        let session = Session::open(db, bound, use_transaction).await?;
        let res = session.query(stmt, params).await;
        session.finish(res).await
    }

    pub(crate) fn runner(&self) -> &Arc<dyn QueryRunner> {
        &self.runner
    }

    pub(crate) fn is_transaction_active(&self) -> bool {
        self.runner.is_transaction_active()
    }

    /// Serializes and runs one statement.
    pub(crate) async fn query(
        &self,
        stmt: &Statement,
        params: &IndexMap<String, Value>,
    ) -> Result<QueryResult> {
        let (sql, bound) = self.serialize(stmt, params)?;
        self.query_sql(&sql, &bound).await
    }

    pub(crate) async fn query_sql(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        debug!(target: "keel::query", sql, params = params.len(), "executing");
        self.runner.query(sql, params).await
    }

    /// Streams the rows of one statement. The stream owns the session and
    /// finishes it once the last row was read, or when it is dropped early.
    pub(crate) async fn stream(
        self,
        stmt: &Statement,
        params: &IndexMap<String, Value>,
    ) -> Result<RowStream> {
        let rows = match self.serialize(stmt, params) {
            Ok((sql, bound)) => {
                debug!(target: "keel::query", sql = sql.as_str(), params = bound.len(), "streaming");
                self.runner.stream(&sql, &bound).await
            }
            Err(err) => Err(err),
        };

        let mut rows = match rows {
            Ok(rows) => rows,
            Err(err) => return self.finish(Err(err)).await,
        };

        let mut guard = StreamGuard {
            session: Some(self),
        };

        Ok(Box::pin(async_stream::stream! {
            let mut failed = None;
            while let Some(row) = rows.next().await {
                match row {
                    Ok(row) => yield Ok(row),
                    Err(err) => {
                        failed = Some(err.clone());
                        yield Err(err);
                        break;
                    }
                }
            }

            let res = match failed {
                Some(err) => Err(err),
                None => Ok(()),
            };
            let report = res.is_ok();
            if let Some(session) = guard.session.take() {
                if let Err(err) = session.finish(res).await {
                    if report {
                        yield Err(err);
                    }
                }
            }
        }))
    }

    pub(crate) fn serialize(
        &self,
        stmt: &Statement,
        params: &IndexMap<String, Value>,
    ) -> Result<(String, Vec<Value>)> {
        let mut bound = vec![];
        let sql = self.db.serializer().serialize(stmt, params, &mut bound)?;
        Ok((sql, bound))
    }

    /// Commits or rolls back the transaction this session started, then
    /// releases an owned runner. A failed rollback is logged; `res` is
    /// what the caller gets back.
    pub(crate) async fn finish<T>(mut self, res: Result<T>) -> Result<T> {
        let res = match res {
            Ok(value) if self.started_transaction => match self.runner.commit_transaction().await {
                Ok(()) => {
                    info!(target: "keel::query", "transaction committed");
                    Ok(value)
                }
                Err(err) => Err(err),
            },
            res => res,
        };

        if res.is_err() && self.started_transaction && self.runner.is_transaction_active() {
            match self.runner.rollback_transaction().await {
                Ok(()) => info!(target: "keel::query", "transaction rolled back"),
                Err(rollback) => warn!(
                    target: "keel::query",
                    error = %rollback,
                    "rollback failed; returning the original error"
                ),
            }
        }
        self.started_transaction = false;

        match (res, self.release_checked().await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), _) => Err(err),
        }
    }

    async fn release_checked(&self) -> Result<()> {
        if self.owned && !self.runner.is_released() {
            self.runner.release().await?;
        }
        Ok(())
    }

    async fn release(&self) {
        if let Err(err) = self.release_checked().await {
            warn!(target: "keel::query", error = %err, "failed to release query runner");
        }
    }
}

/// Holds a streaming session until the stream has been read to the end.
///
/// A stream dropped before its last row rolls back the transaction it
/// started and releases an owned runner on a spawned task.
struct StreamGuard {
    session: Option<Session>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(target: "keel::query", "stream dropped before its end");
                handle.spawn(async move {
                    let _ = session
                        .finish::<()>(Err(err!("stream dropped before its end")))
                        .await;
                });
            }
            Err(_) => warn!(
                target: "keel::query",
                "stream dropped outside a runtime; its query runner was not released"
            ),
        }
    }
}
