//! Cauldron Portal - JSON-RPC access to the execution engine and the challenge catalog.
//!
//! The portal serves a browser editor. It exposes:
//! - `engine.*` methods to run, cancel, clear and observe the shared coordinator
//! - `engine.runTests` to grade arbitrary code against ad hoc tests
//! - `challenge.*` methods to browse the catalog and validate submissions

#![warn(missing_docs)]

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

pub mod error;
pub mod handler;
pub mod middleware;
pub mod payload;
pub mod route;
pub mod state;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use error::*;
pub use handler::*;
pub use payload::*;
pub use route::*;
pub use state::*;
