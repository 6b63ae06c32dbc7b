//! Credential handling and the session lifecycle.
//!
//! - [`storage`]: durable key/value slots for the credential
//! - [`token`]: credential decoding, expiry checks and persistence
//! - [`session`]: login, logout, refresh and startup restore

pub mod session;
pub mod storage;
pub mod token;

pub use session::{Session, SessionEvent, SessionManager, SessionPhase};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage, StorageError};
pub use token::TokenStore;
