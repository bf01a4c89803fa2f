//! Shared dependency bundle threaded explicitly through the engine's public
//! API, instead of reaching for global/singleton state.

use crate::config::Settings;
use crate::storage::DocumentIndex;
use std::sync::Arc;

/// Bundles the pieces every component needs: configuration and a handle to
/// the storage layer. Cloning an `IndexContext` is cheap — it only clones
/// `Arc`s.
#[derive(Clone)]
pub struct IndexContext {
    pub settings: Arc<Settings>,
    pub storage: Arc<DocumentIndex>,
}

impl IndexContext {
    pub fn new(settings: Settings, storage: DocumentIndex) -> Self {
        Self {
            settings: Arc::new(settings),
            storage: Arc::new(storage),
        }
    }
}
