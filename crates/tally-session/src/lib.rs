//! Authentication session lifecycle for Tally.
//!
//! This crate owns the answer to "who is logged in, and with what token":
//!
//! 1. **Session state**: an immutable [`Session`] snapshot with a
//!    [`SessionStatus`] state machine
//! 2. **Session store**: [`SessionStore`], the only writer: restore,
//!    login, register, refresh, logout, lazy expiry
//! 3. **Distribution**: [`AuthContext`], read-only handles that see every
//!    committed transition
//! 4. **Persistence**: [`CredentialStore`] over a [`Storage`] backend
//!
//! # How it fits in the stack
//!
//! ```text
//! Route Guard / Query Cache (above)  ← read the session, react to logout
//!     ↕
//! Session Layer (this crate)  ← owns authentication state
//!     ↕
//! API Layer (below)  ← AuthApi contract, Principal, TokenGrant
//! ```

mod clock;
mod context;
mod error;
mod session;
mod storage;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::AuthContext;
pub use error::{ErrorKind, SessionError};
pub use session::{Session, SessionConfig, SessionStatus};
pub use storage::{
    CREDENTIAL_KEY, CredentialRecord, CredentialStore, FileStorage, MemoryStorage, Storage,
    StorageError,
};
pub use store::SessionStore;
