//! In-memory reference host
//!
//! A small MVCC engine that implements every host trait of `asof-core`:
//! - MemoryDatabase: shared heap of tables with per-tuple `xmin`/`xmax` and
//!   a commit log
//! - MemorySession: one connection with transaction blocks, savepoints, an
//!   active snapshot stack and a read-only SQL subset
//!
//! It exists so the snapshot machinery can be exercised end to end without a
//! real database.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod session;
pub mod sql;

pub use memory::{MemoryDatabase, Tuple, XidStatus};
pub use session::{Fault, MemorySession};
pub use sql::{AGG_PREFIX, AGG_SUFFIX};
