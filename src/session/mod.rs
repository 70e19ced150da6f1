//! Auth / Session
//!
//! - [`SessionStore`]: login, register, logout and cookie recovery
//! - [`SessionStorage`]: durable copy of the session across restarts

mod storage;
mod store;

pub use storage::{
    FileSessionStorage, MemorySessionStorage, PersistedSession, SessionStorage, StorageError,
    SESSION_KEY,
};
pub use store::{Session, SessionError, SessionPhase, SessionStore};
