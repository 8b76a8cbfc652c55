use crate::logging_driver::DriverOp;
use keel::Value;
use std::sync::{Arc, Mutex};

/// A view over the operations log for assertions.
#[derive(Clone)]
pub struct ExecLog {
    ops: Arc<Mutex<Vec<DriverOp>>>,
}

impl ExecLog {
    pub(crate) fn new(ops: Arc<Mutex<Vec<DriverOp>>>) -> Self {
        Self { ops }
    }

    pub fn len(&self) -> usize {
        self.ops.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.lock().unwrap().is_empty()
    }

    /// Every logged operation, in order.
    pub fn ops(&self) -> Vec<DriverOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&DriverOp) -> bool,
    {
        self.ops.lock().unwrap().iter().filter(|op| predicate(op)).count()
    }

    /// Statement text of every query, in order.
    pub fn sql(&self) -> Vec<String> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(DriverOp::sql)
            .map(str::to_string)
            .collect()
    }

    /// Parameters bound to the `index`th query.
    pub fn params(&self, index: usize) -> Vec<Value> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                DriverOp::Query { params, .. } => Some(params.clone()),
                _ => None,
            })
            .nth(index)
            .unwrap_or_else(|| panic!("no query #{index} in the log"))
    }

    pub fn queries(&self) -> usize {
        self.count(DriverOp::is_query)
    }

    pub fn connects(&self) -> usize {
        self.count(|op| matches!(op, DriverOp::Connect))
    }

    pub fn releases(&self) -> usize {
        self.count(|op| matches!(op, DriverOp::Release))
    }

    /// Operations other than queries, in order.
    pub fn lifecycle(&self) -> Vec<DriverOp> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| !op.is_query())
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.ops.lock().unwrap().clear();
    }
}
