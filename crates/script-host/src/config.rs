//! Configuration of the in-memory host.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::constants::host::{
    DEFAULT_ADDRESS_NAMESPACE, DEFAULT_CALL_GAS_LIMIT, DEFAULT_MAX_CALL_DEPTH, DEFAULT_SENDER,
};

/// Settings of a [`MemoryHost`](crate::MemoryHost).
///
/// Every field is optional when deserializing; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// Caller of top-level script calls.
    pub sender: Address,
    /// Gas handed to each precompile call.
    pub call_gas_limit: u64,
    /// Maximum nesting of script calls.
    pub max_call_depth: usize,
    /// Namespace mixed into derived addresses. Hosts with different namespaces never hand out
    /// the same address sequence.
    pub address_namespace: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sender: DEFAULT_SENDER,
            call_gas_limit: DEFAULT_CALL_GAS_LIMIT,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            address_namespace: DEFAULT_ADDRESS_NAMESPACE.to_string(),
        }
    }
}

impl HostConfig {
    /// Sets the sender.
    pub const fn with_sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    /// Sets the gas limit of precompile calls.
    pub const fn with_call_gas_limit(mut self, gas: u64) -> Self {
        self.call_gas_limit = gas;
        self
    }

    /// Sets the maximum call depth.
    pub const fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Sets the address namespace.
    pub fn with_address_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.address_namespace = namespace.into();
        self
    }
}
