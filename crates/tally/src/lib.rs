//! # Tally
//!
//! Client core of the Tally budget tracker: who is logged in, which views
//! they may see, and the data those views fetch.
//!
//! The core is split into layers, each its own crate:
//!
//! ```text
//! tally (this crate)  ← AppContext, config, logging, TallyError
//!     ↕
//! tally-route   ← route guard, route table, router
//! tally-query   ← principal-scoped cache with retry and coalescing
//!     ↕
//! tally-session ← session store, auth context, credential storage
//!     ↕
//! tally-api     ← wire types, API contract, HTTP and in-memory servers
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tally::prelude::*;
//!
//! # async fn run() -> Result<(), TallyError> {
//! let config = AppConfig::load()?;
//! tally::logging::init(&config.log.filter);
//! let app = AppContext::from_config(&config)?;
//! app.start("/transactions").await?;
//! # Ok(())
//! # }
//! ```


mod app;
pub mod config;
mod error;
pub mod logging;

pub use app::AppContext;
pub use config::{AppConfig, ConfigError};
pub use error::TallyError;

pub use tally_api as api;
pub use tally_query as query;
pub use tally_route as route;
pub use tally_session as session;

/// The types most applications need.
pub mod prelude {
    pub use crate::{AppConfig, AppContext, TallyError};
    pub use tally_api::{Credentials, DevApi, Principal, PrincipalId, Registration, Resource};
    pub use tally_query::{QueryClient, QueryConfig, QueryError};
    pub use tally_route::{Outcome, Page, Rendered, Visibility};
    pub use tally_session::{
        AuthContext, ErrorKind, Session, SessionError, SessionStatus, SessionStore,
    };
}
