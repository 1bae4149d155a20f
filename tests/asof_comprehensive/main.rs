//! asof Comprehensive Integration Tests
//!
//! End-to-end behavior against the in-memory host.
//!
//! ## Test Categories
//!
//! 1. **exec_as_of** - single-call reads under a synthetic snapshot
//! 2. **Session variable** - staging at set time, installation at query start
//! 3. **Guardrails** - when installation is refused, and in what order
//! 4. **Lifecycle** - boundary events, hook registration, session isolation
//! 5. **Config** - `asof.toml` driven behavior
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test asof_comprehensive
//! cargo test --test asof_comprehensive -- --nocapture  # with tracing output
//! ```

#[path = "../common/mod.rs"]
mod common;

mod exec_as_of;
mod lifecycle;
mod session_variable;
