//! Deployment of the OP contracts manager implementations through the script host.
//!
//! [`deploy_implementations`] runs the `DeployImplementations` script (or its interop flavour)
//! with a [`DeployImplementationsInput`] and returns the [`DeployImplementationsOutput`] it
//! reports.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod implementations;
pub use implementations::*;

pub mod release;
