//! Common imports for test files: `use tests::prelude::*;`

pub use crate::fixtures;
pub use crate::{DbTest, DriverOp, ExecLog};

pub use crate::{entities, tests};

pub use keel::prelude::*;
pub use keel::{Capability, Entity, Error, LockMode};
pub use std_util::prelude::*;
