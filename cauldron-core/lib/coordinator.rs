//! Execution coordinator: the single point of control for "run this code now".
//!
//! The coordinator owns the output sink and at most one live execution unit. It:
//! - Terminates the live unit before starting a new one (the newest run always wins)
//! - Relays unit events into the sink on a background task
//! - Discards every event of a unit that is no longer live
//! - Publishes an [`EngineStatus`] on a watch channel whenever its state changes
//!
//! Every relayed event is checked against the generation of the live unit while the state lock
//! is held, so once [`Coordinator::run`] or [`Coordinator::cancel`] returns nothing from the
//! previous unit can reach the sink again.

use std::{
    future,
    ops::ControlFlow,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::Serialize;
use tokio::{runtime::Handle, sync::watch};
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    sink::{MessageKind, OutputCursor, OutputMessage, OutputSink},
    unit::{self, ExecutionRequest, Isolate, Terminator, UnitEvent, UnitHandle},
    CauldronError, CauldronResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Notice appended when the learner stops a run
pub const CANCELLED_MESSAGE: &str = "Ejecución cancelada por el usuario";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Runs one submission at a time and collects its output.
pub struct Coordinator {
    config: Arc<EngineConfig>,
    isolate: Arc<dyn Isolate>,
    runtime: Handle,
    shared: Arc<Shared>,
}

/// Observable state of a coordinator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    /// Whether a unit is live
    pub running: bool,

    /// Number of runs started so far
    pub generation: u64,

    /// Bumped on every state change, including each appended message
    pub revision: u64,
}

/// A consistent copy of the coordinator's output and running flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    /// The output sink in display order
    pub output_messages: Vec<OutputMessage>,

    /// Whether a unit is live
    pub is_running: bool,
}

/// State shared with the relay tasks
struct Shared {
    state: Mutex<State>,
    status_tx: watch::Sender<EngineStatus>,
}

struct State {
    sink: OutputSink,
    live: Option<LiveUnit>,
    generation: u64,
    revision: u64,
}

/// The coordinator's record of the live unit
struct LiveUnit {
    generation: u64,
    id: Uuid,
    terminator: Terminator,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Coordinator {
    /// Creates a coordinator using the isolation backend selected by `config`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: EngineConfig) -> CauldronResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let isolate = unit::create_isolate(Arc::clone(&config));
        let runtime = Handle::try_current().map_err(|e| {
            CauldronError::Boundary(format!("the coordinator needs a Tokio runtime: {}", e))
        })?;

        Ok(Self::with_isolate(config, isolate, runtime))
    }

    /// Creates a coordinator with an explicit isolation backend and runtime.
    pub fn with_isolate(config: Arc<EngineConfig>, isolate: Arc<dyn Isolate>, runtime: Handle) -> Self {
        let (status_tx, _) = watch::channel(EngineStatus::default());

        Self {
            config,
            isolate,
            runtime,
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    sink: OutputSink::new(),
                    live: None,
                    generation: 0,
                    revision: 0,
                }),
                status_tx,
            }),
        }
    }

    /// Starts running `source_code`, superseding any live run, and returns the run id.
    ///
    /// Returns immediately; progress is observed through [`subscribe`](Self::subscribe) and
    /// [`messages`](Self::messages).
    pub fn run(&self, source_code: impl Into<String>) -> Uuid {
        let request = ExecutionRequest::new(source_code);
        let id = request.id;

        let mut state = self.shared.lock();
        if let Some(previous) = state.live.take() {
            tracing::debug!(previous = %previous.id, next = %id, "superseding live unit");
            previous.terminator.terminate();
        }

        state.generation += 1;
        let generation = state.generation;
        state.sink.clear();

        let _guard = self.runtime.enter();
        match self.isolate.spawn(request) {
            Ok(handle) => {
                tracing::info!(%id, mode = ?self.isolate.mode(), "execution started");
                state.live = Some(LiveUnit {
                    generation,
                    id,
                    terminator: handle.terminator(),
                });
                self.runtime.spawn(relay(
                    Arc::clone(&self.shared),
                    generation,
                    handle,
                    *self.config.get_timeout(),
                ));
            }
            Err(e) => {
                tracing::error!(%id, "failed to start execution unit: {}", e);
                state.sink.push(OutputMessage::error(format!(
                    "Error: no se pudo iniciar la ejecución ({})",
                    e
                )));
            }
        }

        self.shared.publish(&mut state);
        id
    }

    /// Stops the live run, if any, and notes the cancellation in the output.
    ///
    /// Returns whether a run was cancelled. Nothing from the stopped unit is delivered afterwards.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.lock();
        let Some(live) = state.live.take() else {
            return false;
        };

        live.terminator.terminate();
        tracing::info!(id = %live.id, "execution cancelled by user");

        state.sink.push(OutputMessage::info(CANCELLED_MESSAGE));
        self.shared.publish(&mut state);
        true
    }

    /// Empties the output. A live run keeps running and keeps appending.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        state.sink.clear();
        self.shared.publish(&mut state);
    }

    /// Appends a host message, e.g. grading notices.
    pub fn announce(&self, kind: MessageKind, text: impl Into<String>) {
        let mut state = self.shared.lock();
        state.sink.push(OutputMessage::new(kind, text));
        self.shared.publish(&mut state);
    }

    /// Whether a unit is live.
    pub fn is_running(&self) -> bool {
        self.shared.lock().live.is_some()
    }

    /// A copy of the output in display order.
    pub fn messages(&self) -> Vec<OutputMessage> {
        self.shared.lock().sink.as_slice().to_vec()
    }

    /// Messages appended after `cursor`, and the cursor to resume from.
    ///
    /// A cursor taken before the output was cleared, or before a new run started, yields the
    /// whole current output. See [`OutputSink::since`].
    pub fn messages_since(&self, cursor: OutputCursor) -> (Vec<OutputMessage>, OutputCursor) {
        let state = self.shared.lock();
        (state.sink.since(cursor).to_vec(), state.sink.cursor())
    }

    /// The output as plain text, one message per line.
    pub fn transcript(&self) -> String {
        self.shared.lock().sink.transcript()
    }

    /// Output and running flag read under one lock.
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.shared.lock();
        EngineSnapshot {
            output_messages: state.sink.as_slice().to_vec(),
            is_running: state.live.is_some(),
        }
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Waits until no unit is live.
    pub async fn wait_until_idle(&self) {
        let mut status = self.subscribe();
        let _ = status.wait_for(|status| !status.running).await;
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut State) {
        state.revision += 1;
        self.status_tx.send_replace(EngineStatus {
            running: state.live.is_some(),
            generation: state.generation,
            revision: state.revision,
        });
    }

    /// Applies one unit event if its unit is still live.
    fn deliver(&self, generation: u64, event: UnitEvent) -> ControlFlow<()> {
        let mut state = self.lock();
        if !state.is_live(generation) {
            return ControlFlow::Break(());
        }

        let flow = match event {
            UnitEvent::Output(message) => {
                state.sink.push(message);
                ControlFlow::Continue(())
            }
            UnitEvent::Done => {
                if let Some(live) = state.live.take() {
                    tracing::info!(id = %live.id, "execution finished");
                }
                ControlFlow::Break(())
            }
            UnitEvent::Fault(reason) => {
                if let Some(live) = state.live.take() {
                    tracing::error!(id = %live.id, "execution unit failed: {}", reason);
                    live.terminator.terminate();
                }
                state.sink.push(OutputMessage::error(format!(
                    "Error: el entorno de ejecución falló ({})",
                    reason
                )));
                ControlFlow::Break(())
            }
        };

        self.publish(&mut state);
        flow
    }

    /// Stops a unit that ran out of time.
    fn expire(&self, generation: u64, timeout: Duration) {
        let mut state = self.lock();
        if !state.is_live(generation) {
            return;
        }

        if let Some(live) = state.live.take() {
            tracing::warn!(id = %live.id, ?timeout, "execution timed out");
            live.terminator.terminate();
        }

        state.sink.push(OutputMessage::error(format!(
            "Error: tiempo de ejecución agotado ({} ms)",
            timeout.as_millis()
        )));
        self.publish(&mut state);
    }
}

impl State {
    fn is_live(&self, generation: u64) -> bool {
        matches!(&self.live, Some(live) if live.generation == generation)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(live) = self.shared.lock().live.take() {
            live.terminator.terminate();
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Moves events of one unit into the sink until the unit finishes, is stopped or times out.
async fn relay(shared: Arc<Shared>, generation: u64, mut handle: UnitHandle, timeout: Option<Duration>) {
    let terminator = handle.terminator();
    let deadline = async move {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;

            _ = terminator.terminated() => {
                handle.terminate();
                return;
            }
            _ = &mut deadline => {
                if let Some(timeout) = timeout {
                    shared.expire(generation, timeout);
                }
                handle.terminate();
                return;
            }
            event = handle.recv() => {
                let event = event.unwrap_or_else(|| {
                    UnitEvent::Fault("the unit closed its channel without finishing".to_string())
                });

                if shared.deliver(generation, event).is_break() {
                    return;
                }
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
