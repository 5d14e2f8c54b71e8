//! Remote API contract for Tally.
//!
//! This crate defines everything the client core knows about the budget
//! API server:
//!
//! - **Types** ([`Principal`], [`Credentials`], [`TokenGrant`], etc.):
//!   the structures that travel on the wire.
//! - **Contract** ([`AuthApi`], [`ResourceApi`]): the operations the
//!   session store and the query cache call.
//! - **Resources** ([`Resource`]): the data endpoints pages consume.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how persisted records
//!   are converted to/from bytes.
//! - **Implementations**: [`HttpApi`] (feature `http`) talks to the real
//!   server; [`DevApi`] is a scripted in-memory server for demos and tests.
//!
//! # Architecture
//!
//! ```text
//! Session Store / Query Cache (above)  ← call the contract traits
//!     ↕
//! API layer (this crate)  ← types, contract, transport
//!     ↕
//! Budget API server (external)
//! ```

#![allow(async_fn_in_trait)]

mod client;
mod codec;
#[cfg(feature = "json")]
mod dev;
mod endpoints;
mod error;
#[cfg(feature = "http")]
mod http;
mod types;

pub use client::AuthApi;
#[cfg(feature = "json")]
pub use client::ResourceApi;
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
#[cfg(feature = "json")]
pub use dev::DevApi;
pub use endpoints::Resource;
pub use error::{ApiError, CodecError};
#[cfg(feature = "http")]
pub use http::HttpApi;
pub use types::{
    Credentials, FieldErrors, Principal, PrincipalId, RefreshGrant,
    Registration, Timestamp, TokenGrant,
};
