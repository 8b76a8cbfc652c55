#[macro_use]
mod macros;

mod db_test;
pub use db_test::DbTest;

mod exec_log;
pub use exec_log::ExecLog;

pub mod fixtures;

mod logging_driver;
pub use logging_driver::{DriverOp, LoggingDriver};

pub mod prelude;

mod scripted;
pub use scripted::{Responses, ScriptedDriver};

pub use keel::Capability;
pub use std_util::*;
