//! Apply-once schema migrations.
//!
//! Callers group [`Step`]s into ordered [`Flow`]s, give them IDs with
//! [`make_id`], and hand them to a [`Runner`] at startup. The runner applies
//! every step not yet recorded in its tracking table, in registration order,
//! one transaction per step.

pub mod database;
pub mod dialect;
pub mod id;
pub mod logger;
pub mod migrations;
pub mod runner;
pub mod sqlite;
pub mod tracking;

pub use database::{Database, Executor, Transaction};
pub use dialect::Dialect;
pub use id::{FLOW_NUM_LIMIT, STEP_NUM_LIMIT, make_id};
pub use logger::{Fields, Logger, TracingLogger};
pub use migrations::{Flow, Step};
pub use runner::{Runner, StepStatus};
pub use tracking::{AppliedRecord, DEFAULT_TRACKING_TABLE, TrackingTable};
