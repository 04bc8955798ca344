//! Human-readable names for addresses.

use std::collections::HashMap;

use alloy_primitives::Address;

/// Labels attached to addresses, plus labels waiting for a deployment to happen.
#[derive(Debug, Clone, Default)]
pub struct LabelRegistry {
    labels: HashMap<Address, String>,
    /// `(source unit, symbol)` to label.
    pending: HashMap<(String, String), String>,
}

impl LabelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels `address`, replacing any earlier label.
    pub fn label(&mut self, address: Address, label: impl Into<String>) {
        self.labels.insert(address, label.into());
    }

    /// The label of `address`.
    pub fn name_of(&self, address: &Address) -> Option<&str> {
        self.labels.get(address).map(String::as_str)
    }

    /// Remembers that the next deployment of `symbol` from `source_unit` should be labelled.
    pub fn remember(&mut self, label: impl Into<String>, source_unit: &str, symbol: &str) {
        self.pending.insert((source_unit.to_string(), symbol.to_string()), label.into());
    }

    /// Drops the label waiting for `symbol` of `source_unit` if it is `label`.
    pub fn forget(&mut self, label: &str, source_unit: &str, symbol: &str) -> bool {
        let key = (source_unit.to_string(), symbol.to_string());
        if self.pending.get(&key).is_some_and(|pending| pending == label) {
            self.pending.remove(&key);
            return true;
        }
        false
    }

    /// The label waiting for `symbol` of `source_unit`.
    pub fn pending_for(&self, source_unit: &str, symbol: &str) -> Option<&str> {
        self.pending.get(&(source_unit.to_string(), symbol.to_string())).map(String::as_str)
    }

    /// Records a deployment of `symbol` at `address`, labelling it if a label was remembered.
    /// Returns the label applied.
    pub fn on_deploy(&mut self, source_unit: &str, symbol: &str, address: Address) -> Option<&str> {
        let label = self.pending.remove(&(source_unit.to_string(), symbol.to_string()))?;
        self.labels.insert(address, label);
        self.name_of(&address)
    }

    /// Formats `address` as its label when one exists.
    pub fn display(&self, address: &Address) -> String {
        match self.name_of(address) {
            Some(label) => format!("{label} [{address}]"),
            None => address.to_string(),
        }
    }

    /// Returns an iterator over the labelled addresses.
    pub fn labels(&self) -> impl Iterator<Item = (&Address, &str)> {
        self.labels.iter().map(|(address, label)| (address, label.as_str()))
    }
}
