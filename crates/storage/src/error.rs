/// Errors a `StateStore` implementation can return from `record`.
///
/// Reads never fail: absence is not an error. The engine does not retry
/// failed writes; the failure is surfaced to the ingesting caller.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An event with this `(uid, version)` pair was already recorded.
    /// Versions are unique per uid within a store.
    #[error("duplicate version {version} for resource {uid}")]
    DuplicateVersion { uid: String, version: String },

    /// A backend-specific failure (connection loss, serialization, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}
