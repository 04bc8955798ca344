//! Typed precompile bridge and runner for deployment scripts.
//!
//! The host exchanges structured records with a script through precompiles installed at fresh
//! addresses: the input record is served read-only, the output record is written by the script
//! field by field. A [`ScriptSession`] drives one run from address allocation to teardown.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod error;
pub use error::*;

mod record;
pub use record::*;

pub mod codec;
pub use codec::{decode_patch, decode_record, encode_patch, encode_record, RecordCall};

mod precompiles;
pub use precompiles::*;

mod binding;
pub use binding::*;

mod host;
pub use host::*;

mod teardown;
pub use teardown::*;

mod script;
pub use script::*;

mod label;
pub use label::*;

mod config;
pub use config::*;

mod session;
pub use session::*;

pub mod memory;
pub use memory::MemoryHost;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[doc(hidden)]
pub mod __private {
    pub use alloy_dyn_abi::DynSolValue;
    pub use once_cell::sync::OnceCell;
    pub use std::sync::Arc;
}
