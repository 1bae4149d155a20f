//! # asof executor
//!
//! Point-in-time reads over synthetic MVCC snapshots.
//!
//! Given a snapshot descriptor `xmin:xmax:xip1,xip2,...` captured earlier,
//! queries can see the database exactly as a transaction holding that
//! snapshot saw it. Two ways in:
//!
//! | Path | Scope | Requirements |
//! |------|-------|--------------|
//! | [`Session::set_snapshot_variable`] | rest of the transaction | REPEATABLE READ or SERIALIZABLE block, top level, before the first query |
//! | [`exec_as_of`] / [`Session::exec_as_of`] | one read-only query | none |
//!
//! The host engine is reached only through the traits in [`asof_core`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod args;
pub mod config;
pub mod query;
pub mod scoped;
pub mod session;

pub use args::json_to_params;
pub use config::{AsOfConfig, CONFIG_FILE_NAME, DEFAULT_VARIABLE};
pub use query::{ensure_read_only, is_read_only_query, wrap_query};
pub use scoped::{exec_as_of, exec_as_of_bounded, ScopedSnapshot};
pub use session::Session;

pub use asof_concurrency::{GuardrailState, SyntheticSnapshot};
pub use asof_core::{
    AsOfError, HookKind, HostEngine, HostError, IsolationLevel, Result, SnapshotDescriptor, TxnId,
    VisibilitySnapshot, XactEvent,
};
