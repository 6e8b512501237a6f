//! Wire protocol between a [`ProcessIsolate`](super::ProcessIsolate) and its worker process.
//!
//! The host writes the submission to the worker's stdin and closes it. The worker answers with
//! newline-delimited JSON frames on stdout:
//!
//! ```text
//! {"type":"output","message":{"text":"hola","kind":"log","timestamp":1700000000000}}
//! {"type":"done"}
//! ```
//!
//! A worker that exits without writing `done` has failed at the boundary.

use std::io::{self, Read, Write};
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::{
    config::ScriptLimits,
    script::{self, Completion},
    sink::OutputMessage,
    CauldronError, CauldronResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One line written by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerFrame {
    /// An output message.
    Output {
        /// The message
        message: OutputMessage,
    },

    /// The run finished.
    Done,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl WorkerFrame {
    /// Parses one line of worker output.
    pub fn parse(line: &str) -> CauldronResult<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Encodes the frame as one line, without the trailing newline.
    pub fn encode(&self) -> CauldronResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Worker entry point: reads a submission from stdin, runs it and streams frames to stdout.
///
/// Limits come from the environment set up by the host. Nothing but frames may be written to
/// stdout while this runs.
pub fn serve_stdio() -> CauldronResult<()> {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source)?;

    let limits = ScriptLimits::from_env();
    let completion = script::execute(&source, limits, |message| {
        match write_frame(&WorkerFrame::Output { message }) {
            Ok(()) => ControlFlow::Continue(()),
            // The host closed the pipe, nobody is listening.
            Err(_) => ControlFlow::Break(()),
        }
    });

    match completion {
        Completion::Finished => write_frame(&WorkerFrame::Done),
        Completion::Halted => Ok(()),
        Completion::Faulted(reason) => Err(CauldronError::Boundary(reason)),
    }
}

fn write_frame(frame: &WorkerFrame) -> CauldronResult<()> {
    let line = frame.encode()?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(line.as_bytes())?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MessageKind;

    #[test]
    fn test_frames_are_tagged() {
        let frame = WorkerFrame::Output {
            message: OutputMessage {
                text: "hola".to_string(),
                kind: MessageKind::Log,
                timestamp: 7,
            },
        };
        assert_eq!(
            frame.encode().unwrap(),
            r#"{"type":"output","message":{"text":"hola","kind":"log","timestamp":7}}"#
        );
        assert_eq!(WorkerFrame::Done.encode().unwrap(), r#"{"type":"done"}"#);
    }

    #[test]
    fn test_parse_accepts_trailing_whitespace() {
        let frame = WorkerFrame::parse("{\"type\":\"done\"}\r\n").unwrap();
        assert_eq!(frame, WorkerFrame::Done);
    }

    #[test]
    fn test_parse_rejects_unknown_frames() {
        assert!(WorkerFrame::parse(r#"{"type":"exit"}"#).is_err());
        assert!(WorkerFrame::parse("Error: boom").is_err());
    }
}
