//! Error types for the cauldron portal.

use cauldron_core::CauldronError;
use thiserror::Error;

use crate::payload::JsonRpcError;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The JSON sent is not a valid request object
pub const INVALID_REQUEST: i32 = -32600;

/// The method does not exist
pub const METHOD_NOT_FOUND: i32 = -32601;

/// Invalid method parameters
pub const INVALID_PARAMS: i32 = -32602;

/// Internal JSON-RPC error
pub const INTERNAL_ERROR: i32 = -32603;

/// The requested challenge does not exist
pub const CHALLENGE_NOT_FOUND: i32 = -32004;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a portal operation.
pub type PortalResult<T> = Result<T, PortalError>;

/// An error raised while serving a JSON-RPC request.
#[derive(pretty_error_debug::Debug, Error)]
pub enum PortalError {
    /// The request is not a valid JSON-RPC 2.0 request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The method is unknown.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The params do not match the method.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The engine failed.
    #[error(transparent)]
    Engine(#[from] CauldronError),

    /// Anything else that went wrong inside the portal.
    #[error("internal error: {0}")]
    Internal(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PortalError {
    /// The JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            PortalError::InvalidRequest(_) => INVALID_REQUEST,
            PortalError::MethodNotFound(_) => METHOD_NOT_FOUND,
            PortalError::InvalidParams(_) => INVALID_PARAMS,
            PortalError::Engine(CauldronError::ChallengeNotFound(_)) => CHALLENGE_NOT_FOUND,
            PortalError::Engine(CauldronError::UnsupportedLanguage(_)) => INVALID_PARAMS,
            PortalError::Engine(_) | PortalError::Internal(_) => INTERNAL_ERROR,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<PortalError> for JsonRpcError {
    fn from(error: PortalError) -> Self {
        JsonRpcError {
            code: error.code(),
            message: error.to_string(),
            data: None,
        }
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(error: serde_json::Error) -> Self {
        PortalError::Internal(format!("JSON serialization error: {}", error))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PortalError::MethodNotFound("x".into()).code(), METHOD_NOT_FOUND);
        assert_eq!(
            PortalError::from(CauldronError::ChallengeNotFound("x".into())).code(),
            CHALLENGE_NOT_FOUND
        );
        assert_eq!(
            PortalError::from(CauldronError::Boundary("x".into())).code(),
            INTERNAL_ERROR
        );

        let rpc = JsonRpcError::from(PortalError::InvalidParams("missing code".into()));
        assert_eq!(rpc.code, INVALID_PARAMS);
        assert_eq!(rpc.message, "invalid params: missing code");
    }
}
