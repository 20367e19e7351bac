use crate::jobs::JobQuery;
use crate::menu::MenuMachine;
use crate::prompts::PromptCatalog;
use crate::store::SessionStore;

use std::sync::Arc;

/// Shared by every request.  Nothing about a call is kept here between requests; the store is
/// the only place a conversation lives.
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub jobs: Arc<dyn JobQuery>,
    pub catalog: PromptCatalog,
    pub machine: MenuMachine,
    pub history_limit: u32,
    pub gather_timeout_secs: u16,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        jobs: Arc<dyn JobQuery>,
        catalog: PromptCatalog,
        history_limit: u32,
        gather_timeout_secs: u16,
    ) -> Self {
        let machine = MenuMachine::from_catalog(&catalog);
        Self {
            store,
            jobs,
            catalog,
            machine,
            history_limit,
            gather_timeout_secs,
        }
    }
}
