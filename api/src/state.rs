use airyra_core::repository::StoreManager;
use std::sync::Arc;

/// Shared application state: the one piece of process-wide data every
/// handler needs to reach a project's repositories.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreManager>,
}

impl AppState {
    pub fn new(store: Arc<dyn StoreManager>) -> Self {
        Self { store }
    }
}
