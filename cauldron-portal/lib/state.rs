//! Application state shared by the portal handlers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cauldron_core::{
    challenge::{Catalog, ChallengeSession},
    coordinator::Coordinator,
    grader::Grader,
};
use getset::Getters;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Application state structure
#[derive(Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct AppState {
    /// The coordinator shared by every client of this portal
    coordinator: Arc<Coordinator>,

    /// Grader configured like the coordinator
    grader: Arc<Grader>,

    /// The challenge catalog
    catalog: Arc<Catalog>,

    /// Completed challenges of this session
    #[getset(skip)]
    session: Arc<Mutex<ChallengeSession>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AppState {
    /// Create a new application state instance
    pub fn new(coordinator: Coordinator, catalog: Catalog) -> Self {
        let grader = Grader::from_config(coordinator.config());

        Self {
            coordinator: Arc::new(coordinator),
            grader: Arc::new(grader),
            catalog: Arc::new(catalog),
            session: Arc::new(Mutex::new(ChallengeSession::new())),
        }
    }

    /// Locks the challenge session.
    pub fn session(&self) -> MutexGuard<'_, ChallengeSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
