// Application state module
// Shared between all connections

use std::sync::Arc;

use super::types::Config;
use crate::ledger::Ledger;

/// Application state
pub struct AppState {
    pub config: Config,

    /// `None` when the node could not be reached at startup
    pub ledger: Option<Arc<dyn Ledger>>,
}

impl AppState {
    pub fn new(config: Config, ledger: Option<Arc<dyn Ledger>>) -> Self {
        Self { config, ledger }
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }

    /// The ledger, only if its contract is usable
    pub fn registry(&self) -> Option<&Arc<dyn Ledger>> {
        self.ledger.as_ref().filter(|ledger| ledger.contract_loaded())
    }
}
