//! Isolated execution units.
//!
//! A unit runs exactly one submission inside its own interpreter and reports back through a
//! bounded channel of [`UnitEvent`]s. Every run ends with exactly one terminal event (`Done` or
//! `Fault`) unless the unit is terminated first, in which case nothing else is delivered.
//!
//! Two backends implement [`Isolate`]:
//! - [`ThreadIsolate`]: a fresh interpreter on a dedicated OS thread
//! - [`ProcessIsolate`]: a fresh interpreter inside a worker subprocess that is killed on
//!   termination

mod process;
mod protocol;
mod thread;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::{EngineConfig, IsolationMode},
    sink::OutputMessage,
    CauldronResult,
};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use process::*;
pub use protocol::*;
pub use thread::*;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A request to run one submission.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Unique identifier of the run
    pub id: Uuid,

    /// The learner's source code
    pub source_code: String,
}

/// Events posted by a unit to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    /// A message produced by the submission or by the harness around it.
    Output(OutputMessage),

    /// The run finished. Always the last event of a healthy run.
    Done,

    /// The isolation boundary failed. Always the last event of a broken run.
    Fault(String),
}

/// Terminates a unit. Cheap to clone, idempotent.
#[derive(Debug, Clone, Default)]
pub struct Terminator {
    token: CancellationToken,
}

/// The owner's side of a live unit.
#[derive(Debug)]
pub struct UnitHandle {
    id: Uuid,
    events: mpsc::Receiver<UnitEvent>,
    terminator: Terminator,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A backend able to start isolated execution units.
pub trait Isolate: Send + Sync {
    /// Starts a unit for `request` and returns its handle.
    ///
    /// Must be called from within a Tokio runtime.
    fn spawn(&self, request: ExecutionRequest) -> CauldronResult<UnitHandle>;

    /// The isolation mode this backend provides.
    fn mode(&self) -> IsolationMode;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExecutionRequest {
    /// Creates a request with a fresh id.
    pub fn new(source_code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_code: source_code.into(),
        }
    }
}

impl Terminator {
    /// Stops the unit. Calling it again, or after the unit finished, does nothing.
    pub fn terminate(&self) {
        self.token.cancel();
    }

    /// Whether [`terminate`](Self::terminate) has been called.
    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the unit has been terminated.
    pub async fn terminated(&self) {
        self.token.cancelled().await
    }
}

impl UnitHandle {
    /// Assembles a handle from the parts a backend created.
    pub fn new(id: Uuid, events: mpsc::Receiver<UnitEvent>, terminator: Terminator) -> Self {
        Self {
            id,
            events,
            terminator,
        }
    }

    /// The id of the run.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// A terminator for this unit.
    pub fn terminator(&self) -> Terminator {
        self.terminator.clone()
    }

    /// Receives the next event. `None` once the unit is gone.
    pub async fn recv(&mut self) -> Option<UnitEvent> {
        self.events.recv().await
    }

    /// Terminates the unit and closes the event stream, so nothing else is delivered.
    pub fn terminate(&mut self) {
        self.terminator.terminate();
        self.events.close();
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates the isolation backend selected by `config`.
pub fn create_isolate(config: Arc<EngineConfig>) -> Arc<dyn Isolate> {
    match config.get_isolation() {
        IsolationMode::Thread => Arc::new(ThreadIsolate::new(config)),
        IsolationMode::Process => Arc::new(ProcessIsolate::new(config)),
    }
}
