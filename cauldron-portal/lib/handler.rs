//! Request handlers for the cauldron portal.
//!
//! This module implements:
//! - The health endpoint
//! - The JSON-RPC endpoint and its method dispatch
//!
//! Grading is synchronous and CPU bound, so `engine.runTests` and `challenge.validate` run on
//! the blocking thread pool.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use cauldron_core::{challenge::ChallengeSession, CauldronError};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{PortalError, PortalResult},
    payload::{
        CancelResponse, ChallengeGetParams, ChallengeListParams, ChallengeSummary,
        ChallengeValidateParams, EngineRunParams, EngineRunTestsParams, JsonRpcRequest,
        JsonRpcResponse, RegularMessageResponse, RunStartedResponse, RunTestsResponse,
        ValidateResponse, JSONRPC_VERSION,
    },
    state::AppState,
};

//--------------------------------------------------------------------------------------------------
// Functions: REST API Handlers
//--------------------------------------------------------------------------------------------------

/// Handler for health check
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(RegularMessageResponse {
            message: "Service is healthy".to_string(),
        }),
    )
}

//--------------------------------------------------------------------------------------------------
// Functions: JSON-RPC Handlers
//--------------------------------------------------------------------------------------------------

/// Main JSON-RPC handler that dispatches to the appropriate method
pub async fn json_rpc_handler(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let id = payload.get("id").cloned().unwrap_or(Value::Null);

    let response = match parse_request(payload) {
        Ok(request) => {
            let id = request.id.clone();
            match dispatch(&state, request).await {
                Ok(result) => JsonRpcResponse::success(result, id),
                Err(e) => {
                    tracing::warn!("JSON-RPC call failed: {}", e);
                    JsonRpcResponse::error(e.into(), id)
                }
            }
        }
        Err(e) => JsonRpcResponse::error(e.into(), id),
    };

    (StatusCode::OK, Json(response))
}

/// Runs one JSON-RPC method against the portal state.
pub async fn dispatch(state: &AppState, request: JsonRpcRequest) -> PortalResult<Value> {
    tracing::debug!(method = %request.method, "dispatching JSON-RPC call");

    match request.method.as_str() {
        "engine.run" => {
            let params: EngineRunParams = parse_params(&request.method, request.params)?;
            let run_id = state.get_coordinator().run(params.code);
            Ok(serde_json::to_value(RunStartedResponse { run_id })?)
        }
        "engine.cancel" => {
            let cancelled = state.get_coordinator().cancel();
            Ok(serde_json::to_value(CancelResponse { cancelled })?)
        }
        "engine.clear" => {
            state.get_coordinator().clear();
            Ok(Value::Null)
        }
        "engine.state" => Ok(serde_json::to_value(state.get_coordinator().snapshot())?),
        "engine.runTests" => {
            let params: EngineRunTestsParams = parse_params(&request.method, request.params)?;
            let results = run_tests_impl(state.clone(), params).await?;
            Ok(serde_json::to_value(RunTestsResponse { results })?)
        }
        "challenge.list" => {
            let params: ChallengeListParams = parse_params(&request.method, request.params)?;
            Ok(serde_json::to_value(challenge_list_impl(state, params))?)
        }
        "challenge.get" => {
            let params: ChallengeGetParams = parse_params(&request.method, request.params)?;
            let challenge = state.get_catalog().find(&params.id)?;
            Ok(serde_json::to_value(challenge)?)
        }
        "challenge.validate" => {
            let params: ChallengeValidateParams = parse_params(&request.method, request.params)?;
            let response = challenge_validate_impl(state.clone(), params).await?;
            Ok(serde_json::to_value(response)?)
        }
        other => Err(PortalError::MethodNotFound(other.to_string())),
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Method Implementations
//--------------------------------------------------------------------------------------------------

async fn run_tests_impl(
    state: AppState,
    params: EngineRunTestsParams,
) -> PortalResult<Vec<cauldron_core::grader::TestResult>> {
    tokio::task::spawn_blocking(move || {
        state
            .get_grader()
            .run_tests(&params.code, &params.tests, &params.function_name)
    })
    .await
    .map_err(|e| PortalError::Internal(format!("grading task failed: {}", e)))
}

fn challenge_list_impl(state: &AppState, params: ChallengeListParams) -> Vec<ChallengeSummary> {
    let session = state.session();
    let catalog = state.get_catalog();

    let candidates = match params.language {
        Some(language) => catalog.by_language(language),
        None => catalog.iter().collect(),
    };

    candidates
        .into_iter()
        .filter(|c| params.level.map_or(true, |level| c.level == level))
        .map(|c| ChallengeSummary::new(c, session.is_completed(&c.id)))
        .collect()
}

async fn challenge_validate_impl(
    state: AppState,
    params: ChallengeValidateParams,
) -> PortalResult<ValidateResponse> {
    tokio::task::spawn_blocking(move || -> Result<ValidateResponse, CauldronError> {
        let challenge = state.get_catalog().find(&params.id)?;
        let coordinator = state.get_coordinator();

        // The session is only locked to record the outcome, never while grading.
        let graded =
            ChallengeSession::grade(coordinator, state.get_grader(), challenge, &params.code)?;
        let validation = state.session().record(coordinator, challenge, graded);

        Ok(ValidateResponse::new(validation, coordinator.messages()))
    })
    .await
    .map_err(|e| PortalError::Internal(format!("validation task failed: {}", e)))?
    .map_err(PortalError::from)
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn parse_request(payload: Value) -> PortalResult<JsonRpcRequest> {
    if payload.get("jsonrpc").and_then(|v| v.as_str()) != Some(JSONRPC_VERSION) {
        return Err(PortalError::InvalidRequest(
            "Invalid or missing jsonrpc version field".to_string(),
        ));
    }

    serde_json::from_value(payload).map_err(|e| PortalError::InvalidRequest(e.to_string()))
}

fn parse_params<T: DeserializeOwned>(method: &str, params: Value) -> PortalResult<T> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        params => params,
    };

    serde_json::from_value(params)
        .map_err(|e| PortalError::InvalidParams(format!("Invalid params for {}: {}", method, e)))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
