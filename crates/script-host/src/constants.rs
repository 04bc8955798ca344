//! Constants for the script host.
//!
//! It groups the constants by the component that uses them.

/// Constants for the record precompiles.
pub mod precompile {
    /// Base gas charged for every call to a record precompile.
    pub const RECORD_CALL_BASE_GAS: u64 = 100;
    /// Gas charged per 32-byte word of calldata sent to a record precompile.
    pub const RECORD_CALL_WORD_GAS: u64 = 3;
}

/// Constants for scripts.
pub mod script {
    /// Name of the function every deployment script exposes.
    pub const ENTRY_FUNCTION: &str = "run";
}

/// Defaults of the in-memory host.
pub mod host {
    use alloy_primitives::{address, Address};

    /// Default gas handed to each precompile call.
    pub const DEFAULT_CALL_GAS_LIMIT: u64 = 30_000_000;
    /// Default maximum nesting of script calls.
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;
    /// Default namespace mixed into derived script addresses.
    pub const DEFAULT_ADDRESS_NAMESPACE: &str = "script-host";
    /// Default sender of top-level script calls.
    pub const DEFAULT_SENDER: Address = address!("0x1804c8ab1f12e6bbf3894d4083f33e07309d1f38");
}
