//! Local draft persistence for in-progress, not-yet-durable state.
//!
//! Drafts are scoped to the device: they survive a reload of the host
//! process but never travel between devices. The state machines depend on
//! the [`DraftStore`] trait, not a concrete backend.

/// File-backed draft store.
pub mod file;
/// In-memory draft store for tests.
pub mod memory;

pub use file::FileDraftStore;
pub use memory::MemoryDraftStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Draft key holding the mirrored timer tuple (config + runtime + draft).
pub const TIMER_MIRROR_KEY: &str = "timer.active";
/// Draft key holding the unsynced question pool.
pub const QUESTION_POOL_KEY: &str = "questions.pool";
/// Draft key holding the unsynced flashcard collection.
pub const CARD_COLLECTION_KEY: &str = "cards.collection";

/// Result alias for draft store operations.
pub type DraftResult<T> = Result<T, DraftError>;

/// Error raised by draft store backends.
#[derive(Debug, Error)]
pub enum DraftError {
    /// The backing medium failed.
    #[error("draft store io failure for key `{key}`")]
    Io {
        /// Key the operation targeted.
        key: String,
        /// Underlying io error.
        #[source]
        source: std::io::Error,
    },
    /// The payload could not be encoded or decoded.
    #[error("draft payload for key `{key}` is not valid JSON")]
    Codec {
        /// Key the operation targeted.
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value persistence of in-progress state, injected into the services.
pub trait DraftStore: Send + Sync {
    /// Persist a value under a key, overwriting any previous value.
    fn save(&self, key: &str, value: &serde_json::Value) -> DraftResult<()>;
    /// Load the value stored under a key, if any.
    fn load(&self, key: &str) -> DraftResult<Option<serde_json::Value>>;
    /// Remove the value stored under a key. Clearing an absent key is a no-op.
    fn clear(&self, key: &str) -> DraftResult<()>;
}

/// Serialize a typed value and persist it under the given key.
pub fn save_json<T: Serialize>(store: &dyn DraftStore, key: &str, value: &T) -> DraftResult<()> {
    let value = serde_json::to_value(value).map_err(|source| DraftError::Codec {
        key: key.into(),
        source,
    })?;
    store.save(key, &value)
}

/// Load and deserialize the typed value stored under the given key.
pub fn load_json<T: DeserializeOwned>(store: &dyn DraftStore, key: &str) -> DraftResult<Option<T>> {
    let Some(value) = store.load(key)? else {
        return Ok(None);
    };
    let typed = serde_json::from_value(value).map_err(|source| DraftError::Codec {
        key: key.into(),
        source,
    })?;
    Ok(Some(typed))
}
