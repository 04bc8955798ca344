//! Cleanup of host state installed during a session.
//!
//! Each resource a session installs comes with a [`Teardown`] that undoes it. Teardowns run at
//! most once; [`TeardownStack::unwind`] runs them in reverse order of registration and keeps going
//! when one of them fails.

use alloy_primitives::Address;
use tracing::{trace, warn};

use crate::{
    host::{BindingId, ScriptHost, ScriptId},
    ScriptError,
};

/// The cleanup a [`Teardown`] performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownAction {
    /// Remove a precompile binding.
    RemovePrecompile {
        /// The address the precompile was installed at
        address: Address,
        /// The binding to remove
        binding: BindingId,
    },
    /// Unload a script.
    UnloadScript {
        /// The loaded script
        script: ScriptId,
    },
    /// Drop a deployment label nothing consumed.
    ForgetLabel {
        /// The label
        label: String,
        /// The source unit of the symbol
        source_unit: String,
        /// The symbol
        symbol: String,
    },
}

impl TeardownAction {
    fn apply<H: ScriptHost + ?Sized>(self, host: &mut H) -> Result<(), ScriptError> {
        match self {
            Self::RemovePrecompile { address, binding } => {
                if !host.remove_precompile(address, binding)? {
                    trace!(target: "script_host::teardown", %address, %binding, "binding already gone");
                }
            }
            Self::UnloadScript { script } => {
                if !host.unload_script(script)? {
                    trace!(target: "script_host::teardown", %script, "script already unloaded");
                }
            }
            Self::ForgetLabel { label, source_unit, symbol } => {
                if !host.forget_label(&label, &source_unit, &symbol)? {
                    trace!(target: "script_host::teardown", %label, "label already applied");
                }
            }
        }
        Ok(())
    }
}

/// A pending cleanup action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teardown {
    label: String,
    action: Option<TeardownAction>,
}

impl Teardown {
    /// Creates a teardown described by `label`.
    pub fn new(label: impl Into<String>, action: TeardownAction) -> Self {
        Self { label: label.into(), action: Some(action) }
    }

    /// The description of the action.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the action already ran.
    pub const fn is_done(&self) -> bool {
        self.action.is_none()
    }

    /// Runs the action. Calls after the first one do nothing, whatever the first outcome was.
    pub fn run<H: ScriptHost + ?Sized>(&mut self, host: &mut H) -> Result<(), ScriptError> {
        let Some(action) = self.action.take() else {
            return Ok(());
        };
        action.apply(host).map_err(|err| ScriptError::TeardownFailure {
            action: self.label.clone(),
            source: Box::new(err),
        })
    }
}

/// Teardowns registered during a session, unwound last-in first-out.
#[derive(Debug, Default)]
pub struct TeardownStack {
    pending: Vec<Teardown>,
}

impl TeardownStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a teardown.
    pub fn push(&mut self, teardown: Teardown) {
        self.pending.push(teardown);
    }

    /// Number of pending teardowns.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no teardown is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Runs every pending teardown, most recent first. Failures are collected and do not stop the
    /// remaining teardowns.
    pub fn unwind<H: ScriptHost + ?Sized>(&mut self, host: &mut H) -> Vec<ScriptError> {
        let mut failures = Vec::new();
        while let Some(mut teardown) = self.pending.pop() {
            trace!(target: "script_host::teardown", action = teardown.label(), "running teardown");
            if let Err(err) = teardown.run(host) {
                warn!(target: "script_host::teardown", %err, "teardown failed");
                failures.push(err);
            }
        }
        failures
    }
}
