//! JSON-RPC payload structures for the cauldron portal.

use cauldron_core::{
    challenge::{Challenge, Language, Level, Validation},
    grader::{TestCase, TestResult},
    sink::OutputMessage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// JSON-RPC version - always "2.0"
pub const JSONRPC_VERSION: &str = "2.0";

//--------------------------------------------------------------------------------------------------
// Types: JSON-RPC Structures
//--------------------------------------------------------------------------------------------------

/// JSON-RPC request structure
#[derive(Debug, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version, must be "2.0"
    pub jsonrpc: String,

    /// Method name
    pub method: String,

    /// Optional parameters for the method
    #[serde(default)]
    pub params: Value,

    /// Request ID
    #[serde(default)]
    pub id: Value,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version, always "2.0"
    pub jsonrpc: String,

    /// Result of the method execution (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error details (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,

    /// Response ID (same as request ID)
    pub id: Value,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize, Serialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,

    /// Error message
    pub message: String,

    /// Optional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

//--------------------------------------------------------------------------------------------------
// Types: Method Params
//--------------------------------------------------------------------------------------------------

/// Params of `engine.run`
#[derive(Debug, Deserialize, Serialize)]
pub struct EngineRunParams {
    /// Code to run
    pub code: String,
}

/// Params of `engine.runTests`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRunTestsParams {
    /// Code defining the function under test
    pub code: String,

    /// Tests to run
    pub tests: Vec<TestCase>,

    /// Name of the function under test
    pub function_name: String,
}

/// Params of `challenge.list`
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChallengeListParams {
    /// Only challenges in this language
    #[serde(default)]
    pub language: Option<Language>,

    /// Only challenges of this level
    #[serde(default)]
    pub level: Option<Level>,
}

/// Params of `challenge.get`
#[derive(Debug, Deserialize, Serialize)]
pub struct ChallengeGetParams {
    /// Challenge id
    pub id: String,
}

/// Params of `challenge.validate`
#[derive(Debug, Deserialize, Serialize)]
pub struct ChallengeValidateParams {
    /// Challenge id
    pub id: String,

    /// The learner's submission
    pub code: String,
}

//--------------------------------------------------------------------------------------------------
// Types: Method Results
//--------------------------------------------------------------------------------------------------

/// Plain message response
#[derive(Debug, Deserialize, Serialize)]
pub struct RegularMessageResponse {
    /// The message
    pub message: String,
}

/// Result of `engine.run`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStartedResponse {
    /// Id of the run that was started
    pub run_id: Uuid,
}

/// Result of `engine.cancel`
#[derive(Debug, Deserialize, Serialize)]
pub struct CancelResponse {
    /// Whether a live run was cancelled
    pub cancelled: bool,
}

/// Result of `engine.runTests`
#[derive(Debug, Deserialize, Serialize)]
pub struct RunTestsResponse {
    /// One result per test
    pub results: Vec<TestResult>,
}

/// One entry of `challenge.list`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSummary {
    /// Challenge id
    pub id: String,

    /// Display title
    pub title: String,

    /// Difficulty tier
    pub level: Level,

    /// Icon of the tier
    pub level_icon: String,

    /// Language of the challenge
    pub language: Language,

    /// Whether the challenge was completed in this session
    pub completed: bool,
}

/// Result of `challenge.validate`
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    /// `noTests`, `noFunction` or `graded`
    pub outcome: String,

    /// Test results, empty unless graded
    pub results: Vec<TestResult>,

    /// Whether every test passed
    pub all_passed: bool,

    /// Whether this validation completed the challenge
    pub newly_completed: bool,

    /// The engine output after validation, including any announcements
    pub output_messages: Vec<OutputMessage>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

impl JsonRpcResponse {
    /// Create a new successful JSON-RPC response
    pub fn success(result: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create a new error JSON-RPC response
    pub fn error(error: JsonRpcError, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

impl ChallengeSummary {
    /// Summarizes `challenge` for listings.
    pub fn new(challenge: &Challenge, completed: bool) -> Self {
        Self {
            id: challenge.id.clone(),
            title: challenge.title.clone(),
            level: challenge.level,
            level_icon: challenge.level.icon().to_string(),
            language: challenge.language,
            completed,
        }
    }
}

impl ValidateResponse {
    /// Builds the response for a validation outcome and the output that followed it.
    pub fn new(validation: Validation, output_messages: Vec<OutputMessage>) -> Self {
        match validation {
            Validation::NoTests => Self::empty("noTests", output_messages),
            Validation::NoFunction => Self::empty("noFunction", output_messages),
            Validation::Graded {
                results,
                all_passed,
                newly_completed,
            } => Self {
                outcome: "graded".to_string(),
                results,
                all_passed,
                newly_completed,
                output_messages,
            },
        }
    }

    fn empty(outcome: &str, output_messages: Vec<OutputMessage>) -> Self {
        Self {
            outcome: outcome.to_string(),
            results: Vec::new(),
            all_passed: false,
            newly_completed: false,
            output_messages,
        }
    }
}
