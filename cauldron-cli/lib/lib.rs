//! `cauldron-cli` provides the command line interface of the cauldron engine.
//!
//! The `cauldron` binary can:
//! - run a JavaScript file and stream its output
//! - grade a file against a challenge from the catalog
//! - list the catalog
//! - serve the JSON-RPC portal
//! - act as the worker process used by process isolation

#![warn(missing_docs)]

mod args;
mod error;
mod styles;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use args::*;
pub use error::*;
pub use styles::*;
