mod capability;
pub use capability::{Capability, DatabaseKind, InsertIdSemantics, Returning};

mod query_runner;
pub use query_runner::{QueryResult, QueryRunner, RowStream};

use crate::async_trait;

use std::{fmt::Debug, sync::Arc};

#[async_trait]
pub trait Driver: Debug + Send + Sync + 'static {
    /// Describes the database behind the driver, which drives SQL emission.
    fn capability(&self) -> &'static Capability;

    /// Obtains a runner bound to one connection. The caller owns the runner
    /// and must release it.
    async fn create_query_runner(&self) -> crate::Result<Arc<dyn QueryRunner>>;
}
