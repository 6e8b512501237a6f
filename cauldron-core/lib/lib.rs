//! `cauldron-core` runs and grades learner-submitted JavaScript for the cauldron code editor.
//!
//! # Overview
//!
//! The engine takes untrusted source code written by a learner and:
//! - runs it in a disposable interpreter, streaming its console output back to the host
//! - lets the host supersede or cancel a run at any moment
//! - grades it against a declarative list of test cases for a named function
//!
//! # Architecture
//!
//! - **Sink**: the ordered log of output messages shown to the learner
//! - **Script**: the JavaScript harness wrapped around every submission
//! - **Unit**: isolated execution units (dedicated thread or worker process)
//! - **Coordinator**: owns the live unit and the sink, one run at a time
//! - **Grader**: extracts the target function and runs each test case
//! - **Challenge**: challenge content, the bundled catalog and the validate flow
//!
//! # Modules
//!
//! - [`config`] - Engine configuration and environment loading
//! - [`coordinator`] - Single point of control for running code
//! - [`challenge`] - Challenge catalog and grading session
//! - [`grader`] - Test runner
//! - [`script`] - Interpreter harness shared by every backend
//! - [`sink`] - Output messages and the output sink
//! - [`unit`] - Isolated execution units

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod challenge;
pub mod config;
pub mod coordinator;
pub mod grader;
pub mod script;
pub mod sink;
pub mod unit;

pub use error::*;
