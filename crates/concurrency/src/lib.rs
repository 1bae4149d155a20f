//! Snapshot installation layer
//!
//! This crate turns parsed snapshot text into something the host can use,
//! and decides when it may be used:
//! - `snapshot`: SyntheticSnapshot construction over a host base snapshot
//! - `guardrail`: the four conditions for installing as transaction snapshot
//! - `lifecycle`: per-session staged installation cleared at transaction end

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod guardrail;
pub mod lifecycle;
pub mod snapshot;

pub use guardrail::{ensure_installable, GuardrailState};
pub use lifecycle::PendingInstallation;
pub use snapshot::{build, SyntheticSnapshot};
