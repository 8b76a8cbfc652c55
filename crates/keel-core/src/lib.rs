pub mod driver;
pub use driver::{Capability, Driver, QueryRunner};

mod error;
pub use error::{Error, IntoError, OptimisticLockVersionMismatch};

pub mod migration;

pub mod schema;
pub use schema::Registry;

pub mod stmt;

/// A Result type alias that uses Keel's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

pub use async_trait::async_trait;
