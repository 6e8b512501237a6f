//! JavaScript harness shared by every isolation backend.
//!
//! This module evaluates one submission in a brand new `boa_engine` context:
//! - the submission is compiled as a function body through the `Function` constructor, so a
//!   top-level `return` is allowed and syntax errors surface as catchable errors
//! - a local `console` substitute is the only way for the submission to produce output
//! - every console call, the returned value and any failure become [`OutputMessage`]s handed to
//!   the caller's emitter as they happen
//!
//! The emitter is the only bridge between the interpreter and the host. It is registered as a
//! global function and removed from the global object before the submission runs.

use std::{cell::Cell, ops::ControlFlow, rc::Rc};

use boa_engine::{Context, JsArgs, JsError, JsNativeError, JsString, JsValue, NativeFunction, Source};

use crate::{
    config::ScriptLimits,
    sink::{MessageKind, OutputMessage},
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Global binding through which the harness posts messages to the host.
pub const EMIT_BINDING: &str = "__cauldron_emit";

/// Text of the error thrown inside the interpreter once the host stops listening.
const HALT_MESSAGE: &str = "execution terminated by host";

/// Serialization helpers shared by the run and grading harnesses.
pub(crate) const SHARED_JS: &str = r#"
  function show(value) {
    if (typeof value === "object" && value !== null) {
      try {
        return JSON.stringify(value, null, 2);
      } catch (_) {
        return "[Circular Object]";
      }
    }
    return String(value);
  }

  function describe(error) {
    if (error !== null && typeof error === "object" && "message" in error) {
      return String(error.message);
    }
    return show(error);
  }
"#;

const RUN_HARNESS: &str = r#"
  var emit = globalThis.__cauldron_emit;
  delete globalThis.__cauldron_emit;

  function render(args) {
    var parts = [];
    for (var i = 0; i < args.length; i++) {
      parts.push(show(args[i]));
    }
    return parts.join(" ");
  }

  var console = Object.freeze({
    log: function () { emit("log", render(arguments)); },
    error: function () { emit("error", render(arguments)); },
    warn: function () { emit("warn", render(arguments)); },
    info: function () { emit("info", render(arguments)); }
  });

  var result;
  try {
    result = new Function("console", source)(console);
  } catch (error) {
    emit("error", "Error: " + describe(error));
    return;
  }

  if (result !== undefined) {
    emit("success", "→ " + show(result));
  }
"#;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// How a script evaluation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The submission ran to completion, successfully or not. Every message was emitted.
    Finished,

    /// The emitter asked to stop. No further messages were emitted.
    Halted,

    /// The interpreter could not be prepared.
    Faulted(String),
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Runs `source` in a fresh interpreter, handing every produced message to `emit` in order.
///
/// `emit` returns [`ControlFlow::Break`] when nobody listens anymore; the interpreter then
/// aborts at the next console call and nothing else is emitted.
///
/// ## Example
/// ```
/// use std::{cell::RefCell, ops::ControlFlow, rc::Rc};
/// use cauldron_core::{config::ScriptLimits, script::{self, Completion}};
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// let completion = script::execute("console.log('hola'); return 1 + 2;", ScriptLimits::default(), move |m| {
///     sink.borrow_mut().push(m.text);
///     ControlFlow::Continue(())
/// });
///
/// assert_eq!(completion, Completion::Finished);
/// assert_eq!(*seen.borrow(), vec!["hola".to_string(), "→ 3".to_string()]);
/// ```
pub fn execute<F>(source: &str, limits: ScriptLimits, emit: F) -> Completion
where
    F: Fn(OutputMessage) -> ControlFlow<()> + 'static,
{
    let emit = Rc::new(emit);
    let halted = Rc::new(Cell::new(false));
    let mut context = new_context(limits);

    let bridge = {
        let emit = Rc::clone(&emit);
        let halted = Rc::clone(&halted);

        // SAFETY: the closure only captures host values (an `Rc<Cell<bool>>` and the emitter),
        // none of which hold garbage-collected interpreter objects.
        unsafe {
            NativeFunction::from_closure(move |_this, args, ctx| {
                if halted.get() {
                    return Err(halt_error());
                }

                let method = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
                let text = args.get_or_undefined(1).to_string(ctx)?.to_std_string_escaped();
                let kind = MessageKind::from_console_method(&method).unwrap_or(MessageKind::Log);

                match emit(OutputMessage::new(kind, text)) {
                    ControlFlow::Continue(()) => Ok(JsValue::undefined()),
                    ControlFlow::Break(()) => {
                        halted.set(true);
                        Err(halt_error())
                    }
                }
            })
        }
    };

    if let Err(e) = context.register_global_callable(JsString::from(EMIT_BINDING), 2, bridge) {
        return Completion::Faulted(format!("failed to install console bridge: {}", e));
    }

    let script = format!(
        "(function (source) {{{}{}}})({});",
        SHARED_JS,
        RUN_HARNESS,
        js_string_literal(source)
    );

    let outcome = context.eval(Source::from_bytes(&script));
    let _ = context.run_jobs();

    if halted.get() {
        return Completion::Halted;
    }

    if let Err(e) = outcome {
        // Only failures JavaScript cannot catch get here, e.g. exceeded runtime limits.
        tracing::debug!("uncatchable failure in submission: {}", e);
        if emit(OutputMessage::error(format!("Error: {}", e))).is_break() {
            return Completion::Halted;
        }
    }

    Completion::Finished
}

/// Creates a fresh interpreter context with the given limits applied.
pub(crate) fn new_context(limits: ScriptLimits) -> Context {
    let mut context = Context::default();

    if let Some(limit) = limits.loop_iteration_limit {
        context.runtime_limits_mut().set_loop_iteration_limit(limit);
    }

    if let Some(limit) = limits.recursion_limit {
        context.runtime_limits_mut().set_recursion_limit(limit);
    }

    context
}

/// Quotes `text` as a JavaScript string literal.
pub(crate) fn js_string_literal(text: &str) -> String {
    serde_json::Value::String(text.to_owned()).to_string()
}

fn halt_error() -> JsError {
    JsNativeError::error().with_message(HALT_MESSAGE).into()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn run(source: &str) -> (Completion, Vec<OutputMessage>) {
        run_with(source, ScriptLimits::default())
    }

    fn run_with(source: &str, limits: ScriptLimits) -> (Completion, Vec<OutputMessage>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let completion = execute(source, limits, move |message| {
            sink.borrow_mut().push(message);
            ControlFlow::Continue(())
        });
        let messages = seen.borrow().clone();
        (completion, messages)
    }

    fn texts(messages: &[OutputMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn test_console_methods_map_to_kinds() {
        let (completion, messages) = run(
            "console.log('a', 1, true); console.error('b'); console.warn('c'); console.info('d');",
        );

        assert_eq!(completion, Completion::Finished);
        assert_eq!(texts(&messages), vec!["a 1 true", "b", "c", "d"]);
        let kinds: Vec<_> = messages.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MessageKind::Log, MessageKind::Error, MessageKind::Warn, MessageKind::Info]
        );
    }

    #[test]
    fn test_objects_are_pretty_printed() {
        let (_, messages) = run("console.log({ a: 1, b: [1, 2] });");
        assert_eq!(
            messages[0].text,
            "{\n  \"a\": 1,\n  \"b\": [\n    1,\n    2\n  ]\n}"
        );
    }

    #[test]
    fn test_circular_values_use_placeholder() {
        let (_, messages) = run("const o = {}; o.self = o; console.log('x', o);");
        assert_eq!(texts(&messages), vec!["x [Circular Object]"]);
    }

    #[test]
    fn test_return_value_is_reported_last() {
        let (_, messages) = run("console.log('uno'); console.log('dos'); return 1 + 2;");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].kind, MessageKind::Success);
        assert_eq!(messages[2].text, "→ 3");
    }

    #[test]
    fn test_undefined_return_is_not_reported() {
        let (_, messages) = run("let x = 1;");
        assert!(messages.is_empty());
    }

    #[test]
    fn test_thrown_error_becomes_single_error_message() {
        let (completion, messages) = run("console.log('antes'); throw new Error('x');");
        assert_eq!(completion, Completion::Finished);
        assert_eq!(texts(&messages), vec!["antes", "Error: x"]);
        assert_eq!(messages[1].kind, MessageKind::Error);
    }

    #[test]
    fn test_syntax_error_is_caught() {
        let (completion, messages) = run("function (");
        assert_eq!(completion, Completion::Finished);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::Error);
        assert!(messages[0].text.starts_with("Error: "));
    }

    #[test]
    fn test_source_cannot_break_out_of_wrapper() {
        let (_, messages) = run("})(); console.log('escaped'); (function(){");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::Error);
    }

    #[test]
    fn test_bridge_is_hidden_from_submission() {
        let (_, messages) = run("return typeof __cauldron_emit;");
        assert_eq!(texts(&messages), vec!["→ undefined"]);
    }

    #[test]
    fn test_halt_stops_emission() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let completion = execute(
            "for (let i = 0; i < 10; i++) { try { console.log(i); } catch (_) {} } return 'fin';",
            ScriptLimits::default(),
            move |message| {
                sink.borrow_mut().push(message);
                ControlFlow::Break(())
            },
        );

        assert_eq!(completion, Completion::Halted);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_loop_limit_aborts_runaway_code() {
        let limits = ScriptLimits {
            loop_iteration_limit: Some(10_000),
            recursion_limit: None,
        };
        let (completion, messages) = run_with("while (true) {}", limits);
        assert_eq!(completion, Completion::Finished);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::Error);
    }

    #[test]
    fn test_fresh_context_per_run() {
        let (_, _) = run("globalThis.leak = 1;");
        let (_, messages) = run("return typeof leak;");
        assert_eq!(texts(&messages), vec!["→ undefined"]);
    }
}
