//! Shared application state for the HTTP API.

use std::sync::Arc;

use akari_engine::Engine;
use akari_storage::MemoryStore;

/// State shared across request handlers.
///
/// The store is held concretely so the ingest and history endpoints can
/// use it directly; the engine reads the same store through the
/// `StateStore` contract.
pub(crate) struct AppState {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) engine: Arc<Engine>,
}
