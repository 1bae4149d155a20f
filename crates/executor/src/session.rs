//! Per-session wiring of the snapshot variable and hooks
//!
//! The [`Session`] owns the host connection and the state that must never be
//! shared between sessions: the text of the snapshot variable and the staged
//! installation.
//!
//! # Usage
//!
//! ```ignore
//! use asof::Session;
//!
//! let mut session = Session::load(host);
//!
//! // Inside BEGIN ISOLATION LEVEL REPEATABLE READ, before any query
//! session.set_snapshot_variable("100:200:150")?;
//!
//! // The host calls this before each query; the first call installs
//! session.on_query_start()?;
//!
//! // Single-call form, no transaction requirements
//! let rows = session.exec_as_of("100:200:", "SELECT * FROM t", &json!([]))?;
//! ```
//!
//! Installation is a two step process. Setting the variable validates the
//! text and the guardrails and stages a synthetic snapshot. The query-start
//! hook checks the guardrails again and installs the staged snapshot as the
//! transaction snapshot. A transaction boundary discards anything staged.

use crate::config::AsOfConfig;
use crate::scoped::exec_as_of_bounded;
use asof_concurrency::{build, ensure_installable, GuardrailState, PendingInstallation};
use asof_core::{AsOfError, HookKind, HostEngine, Result, SnapshotDescriptor, XactEvent};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

/// A loaded session: the host plus this session's snapshot state
pub struct Session<H: HostEngine> {
    host: H,
    config: AsOfConfig,
    variable: String,
    pending: PendingInstallation,
}

impl<H: HostEngine> Session<H> {
    /// Register the query-start hook and the transaction callback with
    /// `host`, using the default config.
    pub fn load(host: H) -> Self {
        Self::load_with_config(host, AsOfConfig::default())
    }

    /// [`load`](Self::load) with an explicit config
    pub fn load_with_config(mut host: H, config: AsOfConfig) -> Self {
        host.register_hook(HookKind::QueryStart);
        host.register_hook(HookKind::TransactionCallback);
        info!(
            target: "asof::txn",
            variable = %config.variable,
            session_variable = config.session_variable,
            "Registered query-start hook and transaction callback"
        );
        Session {
            host,
            config,
            variable: String::new(),
            pending: PendingInstallation::new(),
        }
    }

    /// Deregister both hooks, discard staged state and return the host
    pub fn unload(mut self) -> H {
        self.pending.clear();
        self.host.unregister_hook(HookKind::QueryStart);
        self.host.unregister_hook(HookKind::TransactionCallback);
        info!(target: "asof::txn", "Unregistered query-start hook and transaction callback");
        self.host
    }

    /// The host
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Active config
    pub fn config(&self) -> &AsOfConfig {
        &self.config
    }

    /// Current text of the snapshot variable; empty when unset
    pub fn snapshot_variable(&self) -> &str {
        &self.variable
    }

    /// Returns true if a snapshot is staged for installation
    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    /// Set the snapshot variable.
    ///
    /// An empty value discards any staged snapshot. Otherwise the text is
    /// parsed, the guardrails are checked and the synthetic snapshot is
    /// staged, all before returning. On error the previous value and any
    /// previously staged snapshot stay in place.
    pub fn set_snapshot_variable(&mut self, value: &str) -> Result<()> {
        if !self.config.session_variable {
            return Err(AsOfError::config(format!(
                "setting \"{}\" is disabled by configuration",
                self.config.variable
            )));
        }

        if value.is_empty() {
            self.pending.clear();
            self.variable.clear();
            return Ok(());
        }

        let descriptor = SnapshotDescriptor::parse_bounded(value, self.config.max_in_progress)?;
        let base = ensure_installable(&self.host)?;
        let synthetic = build(Some(&base), &descriptor)?;
        self.pending.stage(synthetic);
        self.variable = value.to_string();
        Ok(())
    }

    /// Set a configuration parameter by name.
    ///
    /// Only the configured snapshot variable is recognized.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.require_variable(name)?;
        self.set_snapshot_variable(value)
    }

    /// Current value of a configuration parameter by name
    pub fn show(&self, name: &str) -> Result<&str> {
        self.require_variable(name)?;
        Ok(self.snapshot_variable())
    }

    fn require_variable(&self, name: &str) -> Result<()> {
        if name.eq_ignore_ascii_case(&self.config.variable) {
            Ok(())
        } else {
            Err(AsOfError::invalid_argument(format!(
                "unrecognized configuration parameter \"{}\"",
                name
            )))
        }
    }

    /// Query-start hook.
    ///
    /// With a snapshot staged, re-checks the guardrails and installs it as
    /// the transaction snapshot. If the guardrails no longer hold the staged
    /// snapshot is discarded and the error returned. Without one, does
    /// nothing.
    pub fn on_query_start(&mut self) -> Result<()> {
        if !self.pending.is_pending() {
            return Ok(());
        }

        let state = GuardrailState::observe(&self.host);
        if let Err(e) = state.check() {
            warn!(
                target: "asof::guardrail",
                ?state,
                error = %e,
                "Staged snapshot no longer installable"
            );
            self.pending.clear();
            return Err(e);
        }

        let Some(synthetic) = self.pending.take() else {
            return Ok(());
        };
        let snapshot = synthetic.into_snapshot();
        let (xmin, xmax, xcnt) = (snapshot.xmin, snapshot.xmax, snapshot.xcnt());
        self.host.install_transaction_snapshot(snapshot)?;
        info!(target: "asof::txn", %xmin, %xmax, xcnt, "Installed synthetic transaction snapshot");
        Ok(())
    }

    /// Transaction callback
    pub fn on_transaction_event(&mut self, event: XactEvent) {
        self.pending.on_transaction_event(event);
    }

    /// Run `sql` as of `snapshot_text`; see [`exec_as_of`](crate::exec_as_of)
    ///
    /// The call is itself a query, so a staged snapshot is installed first
    /// and becomes the base the descriptor is overlaid on.
    pub fn exec_as_of(
        &mut self,
        snapshot_text: &str,
        sql: &str,
        args: &JsonValue,
    ) -> Result<JsonValue> {
        self.on_query_start()?;
        exec_as_of_bounded(
            &mut self.host,
            snapshot_text,
            sql,
            args,
            self.config.max_in_progress,
        )
    }
}
