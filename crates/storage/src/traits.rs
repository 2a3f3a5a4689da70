use akari_core::StateEvent;

use crate::error::StorageError;

/// The storage contract the evaluation engine reads from and the ingest
/// path writes to.
///
/// ## Latest-wins semantics
///
/// The *latest* event for a uid is the one with the greatest observed
/// timestamp; ties are broken by insertion order (a later insert with an
/// equal timestamp replaces the latest pointer, an older timestamp does
/// not). History is append-only: an update never rewrites a recorded
/// event, it records a new one and moves the pointer.
///
/// ## Concurrency
///
/// `record` calls are serialised per uid; cross-uid ordering is
/// unspecified. Readers observe a consistent per-uid latest snapshot but
/// not a consistent cross-uid snapshot -- evaluation tolerates reads and
/// writes to different uids interleaving.
///
/// ## Failure model
///
/// `record` may fail (transient backend errors, duplicate versions).
/// Reads cannot fail; absence is expressed as `None` or an empty vec.
pub trait StateStore: Send + Sync + 'static {
    /// Persist one observed resource revision.
    fn record(&self, event: StateEvent) -> Result<(), StorageError>;

    /// The latest event for every uid currently known for this kind.
    /// Exactly one event per uid; no ordering guarantee.
    fn get_latest_by_kind(&self, kind: &str) -> Vec<StateEvent>;

    /// The latest observed event for a uid, if any.
    fn get_by_uid(&self, uid: &str) -> Option<StateEvent>;
}
