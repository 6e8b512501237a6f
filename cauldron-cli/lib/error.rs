use cauldron_core::CauldronError;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a CLI operation.
pub type CauldronCliResult<T> = Result<T, CauldronCliError>;

/// An error that occurred while running a CLI command.
#[derive(pretty_error_debug::Debug, Error)]
pub enum CauldronCliError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the engine.
    #[error(transparent)]
    Core(#[from] CauldronError),

    /// The submission did not pass every test.
    #[error("{passed} of {total} tests passed")]
    TestsFailed {
        /// Number of passing tests
        passed: usize,

        /// Number of results
        total: usize,
    },
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_errors_render_their_source() {
        let core: CauldronCliError = CauldronError::ChallengeNotFound("x".to_string()).into();
        assert!(matches!(core, CauldronCliError::Core(_)));
        assert_eq!(
            core.to_string(),
            CauldronError::ChallengeNotFound("x".to_string()).to_string()
        );

        let failed = CauldronCliError::TestsFailed {
            passed: 2,
            total: 3,
        };
        assert_eq!(failed.to_string(), "2 of 3 tests passed");
    }
}
