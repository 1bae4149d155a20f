//! asof - point-in-time reads over synthetic MVCC snapshots
//!
//! A snapshot exported earlier as `xmin:xmax:xip1,xip2,...` can be turned
//! back into a visibility snapshot, so queries see the database exactly as
//! it was at that moment.
//!
//! # Quick Start
//!
//! ```ignore
//! use asof::{Session, IsolationLevel};
//! use serde_json::json;
//!
//! let mut session = Session::load(host);
//!
//! // One query, no transaction requirements
//! let rows = session.exec_as_of("100:200:150", "SELECT * FROM accounts", &json!([]))?;
//!
//! // Whole transaction: inside BEGIN ISOLATION LEVEL REPEATABLE READ
//! session.set_snapshot_variable("100:200:150")?;
//! ```
//!
//! # Architecture
//!
//! The host database is reached only through the traits in `asof-core`;
//! `asof-engine` provides an in-memory host for tests.

// Re-export the public API from asof-executor
pub use asof_executor::*;
