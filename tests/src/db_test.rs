use crate::{
    logging_driver::{DriverOp, LoggingDriver},
    ExecLog, Responses, ScriptedDriver,
};

use keel::{db::Builder, Capability, Db, Error, Result, Row};

use std::sync::{Arc, Mutex, Once};

/// One test's database: a scripted driver for the given dialect, wrapped
/// so every runner operation lands in the log.
pub struct DbTest {
    capability: &'static Capability,
    responses: Responses,
    ops_log: Arc<Mutex<Vec<DriverOp>>>,
}

impl DbTest {
    pub fn new(capability: &'static Capability) -> Self {
        init_tracing();

        Self {
            capability,
            responses: Responses::default(),
            ops_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn capability(&self) -> &'static Capability {
        self.capability
    }

    pub fn try_setup_db(&mut self, mut builder: Builder) -> Result<Db> {
        let driver = ScriptedDriver::new(self.capability, self.responses.clone());

        let logging_driver = LoggingDriver::new(Box::new(driver));
        self.ops_log = logging_driver.ops_log_handle();

        builder.build(logging_driver)
    }

    pub fn setup_db(&mut self, builder: Builder) -> Db {
        self.try_setup_db(builder).unwrap()
    }

    pub fn log(&self) -> ExecLog {
        ExecLog::new(self.ops_log.clone())
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.responses.push_rows(rows);
    }

    pub fn push_affected(&self, affected: u64) {
        self.responses.push_affected(affected);
    }

    /// The next statement fails with `err`.
    pub fn push_error(&self, err: Error) {
        self.responses.push_error(err);
    }
}

/// `RUST_LOG=keel=debug cargo test` shows what the builders emit.
fn init_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
