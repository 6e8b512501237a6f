//! Challenge validation flow and in-memory completion tracking.

use crate::{
    coordinator::Coordinator,
    grader::{Grader, TestResult},
    sink::MessageKind,
    CauldronError, CauldronResult,
};

use super::Challenge;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Notice for challenges without graded tests
pub const NO_TESTS_MESSAGE: &str = "No hay tests disponibles para este reto";

/// Notice for starter code without a function declaration
pub const NO_FUNCTION_MESSAGE: &str = "No se encontró una función para testear";

/// Notice for the first fully passing submission of a challenge
pub const COMPLETED_MESSAGE: &str = "¡Todos los tests pasaron! Reto completado.";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Outcome of validating a submission against a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The challenge has no tests. Nothing was graded.
    NoTests,

    /// No function to test could be found in the starter code. Nothing was graded.
    NoFunction,

    /// The submission was graded.
    Graded {
        /// One result per test, or a single result if the function could not be obtained
        results: Vec<TestResult>,

        /// Whether every result passed
        all_passed: bool,

        /// Whether this validation completed the challenge for the first time
        newly_completed: bool,
    },
}

/// Tracks which challenges were completed during this session. Nothing is persisted.
#[derive(Debug, Default, Clone)]
pub struct ChallengeSession {
    completed: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ChallengeSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grades `source` against `challenge` and records a first completion.
    ///
    /// Equivalent to [`grade`](Self::grade) followed by [`record`](Self::record). Fails only for
    /// challenges whose language cannot be executed.
    pub fn validate(
        &mut self,
        coordinator: &Coordinator,
        grader: &Grader,
        challenge: &Challenge,
        source: &str,
    ) -> CauldronResult<Validation> {
        let validation = Self::grade(coordinator, grader, challenge, source)?;
        Ok(self.record(coordinator, challenge, validation))
    }

    /// Grades `source` against `challenge` without touching any session.
    ///
    /// Announces missing tests or a missing function through `coordinator`. A graded outcome
    /// always has `newly_completed` unset; pass it to [`record`](Self::record) to complete the
    /// challenge. Grading can take as long as the submission runs, so callers sharing a session
    /// should not hold it meanwhile.
    pub fn grade(
        coordinator: &Coordinator,
        grader: &Grader,
        challenge: &Challenge,
        source: &str,
    ) -> CauldronResult<Validation> {
        if !challenge.language.is_executable() {
            return Err(CauldronError::UnsupportedLanguage(challenge.language.to_string()));
        }

        if !challenge.has_tests() {
            coordinator.announce(MessageKind::Info, NO_TESTS_MESSAGE);
            return Ok(Validation::NoTests);
        }

        let Some(function_name) = challenge.function_name() else {
            coordinator.announce(MessageKind::Error, NO_FUNCTION_MESSAGE);
            return Ok(Validation::NoFunction);
        };

        let results = grader.run_tests(source, &challenge.tests, function_name);
        let all_passed = results.iter().all(|r| r.passed);

        tracing::info!(
            challenge = %challenge.id,
            passed = results.iter().filter(|r| r.passed).count(),
            total = results.len(),
            "graded submission"
        );

        Ok(Validation::Graded {
            results,
            all_passed,
            newly_completed: false,
        })
    }

    /// Records the outcome of [`grade`](Self::grade), completing `challenge` the first time all
    /// of its tests pass.
    pub fn record(
        &mut self,
        coordinator: &Coordinator,
        challenge: &Challenge,
        validation: Validation,
    ) -> Validation {
        let (results, all_passed) = match validation {
            Validation::Graded {
                results,
                all_passed,
                ..
            } => (results, all_passed),
            other => return other,
        };

        let newly_completed = all_passed && !self.is_completed(&challenge.id);
        if newly_completed {
            self.completed.push(challenge.id.clone());
            coordinator.announce(MessageKind::Success, COMPLETED_MESSAGE);
        }

        Validation::Graded {
            results,
            all_passed,
            newly_completed,
        }
    }

    /// Ids of completed challenges, in completion order.
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    /// Whether `id` was completed during this session.
    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.iter().any(|c| c == id)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{challenge::Catalog, config::EngineConfig};

    fn coordinator() -> Coordinator {
        Coordinator::new(EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_passing_submission_completes_once() {
        let catalog = Catalog::bundled().unwrap();
        let challenge = catalog.get("js-novato-003").unwrap();
        let coordinator = coordinator();
        let grader = Grader::default();
        let mut session = ChallengeSession::new();

        let first = session
            .validate(&coordinator, &grader, challenge, &challenge.solution)
            .unwrap();
        assert!(matches!(
            first,
            Validation::Graded { all_passed: true, newly_completed: true, .. }
        ));
        assert!(session.is_completed("js-novato-003"));

        let messages = coordinator.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::Success);
        assert_eq!(messages[0].text, COMPLETED_MESSAGE);

        let second = session
            .validate(&coordinator, &grader, challenge, &challenge.solution)
            .unwrap();
        assert!(matches!(
            second,
            Validation::Graded { all_passed: true, newly_completed: false, .. }
        ));
        assert_eq!(coordinator.messages().len(), 1);
        assert_eq!(session.completed(), ["js-novato-003".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_submission_is_not_completed() {
        let catalog = Catalog::bundled().unwrap();
        let challenge = catalog.get("js-novato-001").unwrap();
        let coordinator = coordinator();
        let mut session = ChallengeSession::new();

        let outcome = session
            .validate(&coordinator, &Grader::default(), challenge, &challenge.starter_code)
            .unwrap();

        let Validation::Graded { results, all_passed, .. } = outcome else {
            panic!("expected a graded outcome");
        };
        assert!(!all_passed);
        assert_eq!(results.len(), challenge.tests.len());
        assert!(session.completed().is_empty());
        assert!(coordinator.messages().is_empty());
    }

    #[tokio::test]
    async fn test_challenge_without_tests() {
        let catalog = Catalog::bundled().unwrap();
        let challenge = catalog
            .by_language(crate::challenge::Language::Javascript)
            .into_iter()
            .find(|c| !c.has_tests())
            .unwrap();
        let coordinator = coordinator();

        let outcome = ChallengeSession::new()
            .validate(&coordinator, &Grader::default(), challenge, "")
            .unwrap();

        assert_eq!(outcome, Validation::NoTests);
        let messages = coordinator.messages();
        assert_eq!(messages[0].kind, MessageKind::Info);
        assert_eq!(messages[0].text, NO_TESTS_MESSAGE);
    }

    #[tokio::test]
    async fn test_starter_without_function() {
        let catalog = Catalog::bundled().unwrap();
        let mut challenge = catalog.get("js-novato-001").unwrap().clone();
        challenge.starter_code = "const f = (x) => x;".to_string();
        let coordinator = coordinator();

        let outcome = ChallengeSession::new()
            .validate(&coordinator, &Grader::default(), &challenge, "")
            .unwrap();

        assert_eq!(outcome, Validation::NoFunction);
        assert_eq!(coordinator.messages()[0].text, NO_FUNCTION_MESSAGE);
    }

    #[tokio::test]
    async fn test_grade_then_record() {
        let catalog = Catalog::bundled().unwrap();
        let challenge = catalog.get("js-novato-003").unwrap();
        let coordinator = coordinator();
        let mut session = ChallengeSession::new();

        let graded =
            ChallengeSession::grade(&coordinator, &Grader::default(), challenge, &challenge.solution)
                .unwrap();
        assert!(matches!(
            graded,
            Validation::Graded { all_passed: true, newly_completed: false, .. }
        ));
        assert!(coordinator.messages().is_empty());
        assert!(!session.is_completed("js-novato-003"));

        let recorded = session.record(&coordinator, challenge, graded.clone());
        assert!(matches!(recorded, Validation::Graded { newly_completed: true, .. }));
        assert_eq!(coordinator.messages()[0].text, COMPLETED_MESSAGE);

        let again = session.record(&coordinator, challenge, graded);
        assert!(matches!(again, Validation::Graded { newly_completed: false, .. }));
        assert_eq!(coordinator.messages().len(), 1);

        assert_eq!(
            session.record(&coordinator, challenge, Validation::NoTests),
            Validation::NoTests
        );
    }

    #[tokio::test]
    async fn test_markup_challenges_are_rejected() {
        let catalog = Catalog::bundled().unwrap();
        let challenge = catalog.get("html-novato-001").unwrap();

        let result =
            ChallengeSession::new().validate(&coordinator(), &Grader::default(), challenge, "");
        assert!(matches!(result, Err(CauldronError::UnsupportedLanguage(_))));
    }
}
