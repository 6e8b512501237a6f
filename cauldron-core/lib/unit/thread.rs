//! In-process isolation on a dedicated OS thread.
//!
//! Every run gets its own thread and its own interpreter context, so nothing the submission
//! defines survives the run and nothing of the host is reachable from it. The interpreter
//! context is `!Send`, so it is created on the worker thread and never leaves it.
//!
//! Termination closes the event channel: the console bridge notices at the next console call and
//! aborts the script. A loop that never calls `console` keeps its thread busy until the loop
//! iteration limit trips, which is why a limit is configured by default; use
//! [`ProcessIsolate`](super::ProcessIsolate) when such code must be stopped immediately.

use std::{
    any::Any,
    ops::ControlFlow,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use tokio::sync::mpsc;

use super::{ExecutionRequest, Isolate, Terminator, UnitEvent, UnitHandle};
use crate::{
    config::{EngineConfig, IsolationMode},
    script::{self, Completion},
    CauldronError, CauldronResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Runs each submission on a fresh thread with a fresh interpreter.
#[derive(Debug, Clone)]
pub struct ThreadIsolate {
    config: Arc<EngineConfig>,
    active: Arc<AtomicUsize>,
}

/// Counts a unit thread as active until dropped
struct ActiveUnit(Arc<AtomicUsize>);

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ThreadIsolate {
    /// Creates a new thread isolate
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of unit threads of this isolate that have not returned yet.
    ///
    /// A terminated unit stays active until its interpreter actually stops.
    pub fn active_units(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl ActiveUnit {
    fn new(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(active))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Isolate for ThreadIsolate {
    fn spawn(&self, request: ExecutionRequest) -> CauldronResult<UnitHandle> {
        let (events_tx, events_rx) = mpsc::channel::<UnitEvent>(*self.config.get_channel_capacity());
        let terminator = Terminator::default();
        let limits = self.config.script_limits();

        let ExecutionRequest { id, source_code } = request;
        let unit_terminator = terminator.clone();
        let active = ActiveUnit::new(&self.active);

        thread::Builder::new()
            .name(format!("cauldron-unit-{}", id.simple()))
            .spawn(move || {
                let _active = active;
                let emit_tx = events_tx.clone();
                let emit_terminator = unit_terminator.clone();

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    script::execute(&source_code, limits, move |message| {
                        if emit_terminator.is_terminated() {
                            return ControlFlow::Break(());
                        }

                        match emit_tx.blocking_send(UnitEvent::Output(message)) {
                            Ok(()) => ControlFlow::Continue(()),
                            Err(_) => ControlFlow::Break(()),
                        }
                    })
                }));

                if unit_terminator.is_terminated() {
                    tracing::debug!(%id, "unit terminated before completion");
                    return;
                }

                let last = match outcome {
                    Ok(Completion::Finished) => UnitEvent::Done,
                    Ok(Completion::Halted) => return,
                    Ok(Completion::Faulted(reason)) => UnitEvent::Fault(reason),
                    Err(payload) => UnitEvent::Fault(format!(
                        "interpreter panicked: {}",
                        panic_message(payload.as_ref())
                    )),
                };

                let _ = events_tx.blocking_send(last);
            })
            .map_err(|e| CauldronError::Boundary(format!("failed to start unit thread: {}", e)))?;

        tracing::debug!(%id, "spawned thread unit");

        Ok(UnitHandle::new(id, events_rx, terminator))
    }

    fn mode(&self) -> IsolationMode {
        IsolationMode::Thread
    }
}

impl Drop for ActiveUnit {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sink::MessageKind;

    async fn collect(mut handle: UnitHandle) -> Vec<UnitEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.recv().await {
            events.push(event);
        }
        events
    }

    fn isolate() -> ThreadIsolate {
        ThreadIsolate::new(Arc::new(EngineConfig::default()))
    }

    #[tokio::test]
    async fn test_output_then_done() {
        let handle = isolate()
            .spawn(ExecutionRequest::new("console.log('hola'); return 42;"))
            .unwrap();
        let events = collect(handle).await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], UnitEvent::Output(m) if m.text == "hola"));
        assert!(
            matches!(&events[1], UnitEvent::Output(m) if m.kind == MessageKind::Success && m.text == "→ 42")
        );
        assert_eq!(events[2], UnitEvent::Done);
    }

    #[tokio::test]
    async fn test_runtime_error_still_ends_with_done() {
        let handle = isolate()
            .spawn(ExecutionRequest::new("null.property;"))
            .unwrap();
        let events = collect(handle).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], UnitEvent::Output(m) if m.kind == MessageKind::Error));
        assert_eq!(events[1], UnitEvent::Done);
    }

    #[tokio::test]
    async fn test_terminate_stops_chatty_unit() {
        let mut handle = isolate()
            .spawn(ExecutionRequest::new("while (true) { console.log('tick'); }"))
            .unwrap();

        // Wait for the unit to start talking, then pull the plug.
        let first = handle.recv().await;
        assert!(matches!(first, Some(UnitEvent::Output(_))));

        let terminator = handle.terminator();
        handle.terminate();
        assert!(terminator.is_terminated());

        // Terminating twice is harmless.
        handle.terminate();

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while handle.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }

    #[tokio::test]
    async fn test_terminated_silent_loop_releases_its_thread() {
        let config = EngineConfig::builder().loop_iteration_limit(1_000_000).build();
        let isolate = ThreadIsolate::new(Arc::new(config));

        let mut handle = isolate
            .spawn(ExecutionRequest::new("while (true) {}"))
            .unwrap();
        assert_eq!(isolate.active_units(), 1);

        handle.terminate();

        let released = tokio::time::timeout(Duration::from_secs(30), async {
            while isolate.active_units() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(released.is_ok());
        assert!(handle.recv().await.is_none());
    }
}
