//! Route protection and navigation for Tally.
//!
//! - **Guard** ([`decide`]): a pure function from path, visibility, and
//!   session to a [`GuardDecision`]
//! - **Table** ([`RouteTable`]): the ordered `(pattern, visibility, view)`
//!   declarations, with [`RouteTable::standard`] for the budget app
//! - **Router** ([`Router`]): applies the guard before building a view
//!   and follows redirects (bounded by [`MAX_REDIRECTS`])
//!
//! # How it fits in the stack
//!
//! ```text
//! AppContext (above)  ← navigates on user intent and session changes
//!     ↕
//! Route Layer (this crate)  ← decides what may be rendered
//!     ↕
//! Session Layer (below)  ← provides the Session snapshot
//! ```

mod error;
mod guard;
mod route;
mod router;

pub use error::RouteError;
pub use guard::{GuardDecision, decide};
pub use route::{
    LANDING_PATH, LOGIN_PATH, Page, REGISTER_PATH, Route, RouteTable, Visibility, normalize,
};
pub(crate) use route::route_part;
pub use router::{MAX_REDIRECTS, Outcome, Rendered, Router};
