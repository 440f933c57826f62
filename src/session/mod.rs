//! Session store: keyed editing sessions, persistence and age-based eviction

pub mod model;
pub mod storage;
pub mod store;

pub use model::{Session, SessionMetadata, SessionStats};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
pub use store::{SessionStore, StoreEvent, SESSION_MAX_AGE_MS};
