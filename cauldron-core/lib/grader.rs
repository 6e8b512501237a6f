//! Test runner for challenge submissions.
//!
//! Grading evaluates the submission once in a fresh interpreter, looks up the function under
//! test and calls it once per test case. Each case is compared by the textual equality of
//! `JSON.stringify` of the actual and expected values, both computed by the interpreter.
//!
//! Every case is a separate call from the host, so a case that trips an interpreter limit,
//! which JavaScript cannot catch, fails on its own and the remaining cases still run.
//!
//! Grading is synchronous. Callers on an async runtime should move it to a blocking task.

use boa_engine::{Context, JsObject, JsResult, JsString, JsValue, Source};
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::{
    config::{EngineConfig, KeyOrder, ScriptLimits},
    script::{self, js_string_literal},
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const GRADE_HARNESS: &str = r#"
(function (source, functionName, normalize) {
  function describe(error) {
    if (error !== null && typeof error === "object" && "message" in error) {
      return String(error.message);
    }
    return String(error);
  }

  function sortKeys(value) {
    if (value !== null && typeof value === "object" && typeof value.toJSON === "function") {
      value = value.toJSON();
    }
    if (Array.isArray(value)) {
      return value.map(sortKeys);
    }
    if (value !== null && typeof value === "object") {
      var sorted = {};
      Object.keys(value).sort().forEach(function (key) {
        sorted[key] = sortKeys(value[key]);
      });
      return sorted;
    }
    return value;
  }

  function json(value) {
    return String(JSON.stringify(value));
  }

  function canonical(value) {
    return json(normalize ? sortKeys(value) : value);
  }

  function noop() {}
  var silent = Object.freeze({ log: noop, error: noop, warn: noop, info: noop });

  function failure(message) {
    return JSON.stringify({ passed: false, message: message });
  }

  function isIdentifier(name) {
    if (!/^[A-Za-z_$][\w$]*$/.test(name)) {
      return false;
    }
    try {
      new Function("var " + name + ";");
      return true;
    } catch (_) {
      return false;
    }
  }

  var lookup = isIdentifier(functionName)
    ? "return typeof " + functionName + " === \"undefined\" ? undefined : " + functionName + ";"
    : "return undefined;";

  var fn;
  try {
    fn = new Function("console", source + "\n;" + lookup)(silent);
  } catch (error) {
    return failure("Error de sintaxis: " + describe(error));
  }

  if (typeof fn !== "function") {
    return failure(functionName + " no es una función");
  }

  return function (caseJson) {
    var test = JSON.parse(caseJson);
    try {
      var actual = fn.apply(undefined, test.input);
      var passed = canonical(actual) === canonical(test.expected);
      return JSON.stringify({
        passed: passed,
        message: passed
          ? "✓ " + json(test.input) + " → " + json(actual)
          : "✗ Esperado: " + json(test.expected) + ", Recibido: " + json(actual)
      });
    } catch (error) {
      return failure("Error: " + describe(error));
    }
  };
})
"#;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One graded test: arguments for the function under test and the expected return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Arguments, spread positionally
    pub input: Vec<Value>,

    /// Expected return value
    pub expected: Value,
}

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Whether the test passed
    pub passed: bool,

    /// Human readable description of the outcome
    pub message: String,
}

/// Grades submissions against declarative test suites.
#[derive(Debug, Default, Clone, Getters, TypedBuilder)]
#[getset(get = "pub with_prefix")]
pub struct Grader {
    /// How object keys are ordered before comparison
    #[builder(default)]
    key_order: KeyOrder,

    /// Interpreter limits for the grading context
    #[builder(default)]
    limits: ScriptLimits,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TestResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

impl Grader {
    /// Creates a grader using the key order and limits of `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            key_order: *config.get_key_order(),
            limits: config.script_limits(),
        }
    }

    /// Runs `tests` against `function_name` as defined by `source`.
    ///
    /// Returns one result per test in order, or a single failing result when the function cannot
    /// be obtained. Never panics on account of the submission.
    pub fn run_tests(&self, source: &str, tests: &[TestCase], function_name: &str) -> Vec<TestResult> {
        let script = format!(
            "{}({}, {}, {});",
            GRADE_HARNESS,
            js_string_literal(source),
            js_string_literal(function_name),
            self.key_order == KeyOrder::Normalized
        );

        let mut context = script::new_context(self.limits);
        let prepared = context.eval(Source::from_bytes(&script));
        let _ = context.run_jobs();

        let grade = match prepared {
            Ok(value) => match value.as_callable() {
                Some(grade) => grade.clone(),
                // The harness reports why there is nothing to call.
                None => return vec![read_result(value.to_string(&mut context))],
            },
            Err(e) => {
                tracing::debug!(function_name, "extraction aborted by the interpreter: {}", e);
                return vec![TestResult::failed(format!("Error: {}", e))];
            }
        };

        tests
            .iter()
            .map(|test| grade_case(&grade, test, &mut context))
            .collect()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Grades `source` with the default grader (strict key order, default limits).
pub fn run_tests(source: &str, tests: &[TestCase], function_name: &str) -> Vec<TestResult> {
    Grader::default().run_tests(source, tests, function_name)
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Runs one test case through the prepared grading function.
fn grade_case(grade: &JsObject, test: &TestCase, context: &mut Context) -> TestResult {
    let case_json = match serde_json::to_string(test) {
        Ok(json) => json,
        Err(e) => return TestResult::failed(format!("Error: {}", e)),
    };

    let outcome = grade
        .call(
            &JsValue::undefined(),
            &[JsValue::from(JsString::from(case_json.as_str()))],
            context,
        )
        .and_then(|value| value.to_string(context));
    let _ = context.run_jobs();

    read_result(outcome)
}

/// Reads a result serialized by the harness. Interpreter failures fail the case.
fn read_result(outcome: JsResult<JsString>) -> TestResult {
    let raw = match outcome {
        Ok(raw) => raw.to_std_string_escaped(),
        Err(e) => {
            tracing::debug!("test case aborted by the interpreter: {}", e);
            return TestResult::failed(format!("Error: {}", e));
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!("grading harness produced an unreadable result: {}", e);
        TestResult::failed(format!("Error: {}", e))
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
