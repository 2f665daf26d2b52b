//! ShareDB-style collaborative WebSocket layer, spec §4.10/§4.11/§6.
//!
//! This crate is transport only: it decodes/encodes the wire protocol,
//! manages per-connection subscriptions, and relays accepted ops onto
//! the cross-instance [`gridbase_domain::ports::PubSubBroker`]. Every
//! piece of business logic — validation, optimistic locking, virtual
//! field recomputation, event staging — lives in
//! [`gridbase_application::RecordService`]/[`gridbase_application::LinkFieldService`]
//! and is only ever called into, never reimplemented here.
//!
//! [`router::collaboration_router`] returns a bare `axum::Router`
//! meant to be mounted behind an external gateway's own auth
//! middleware; [`auth::AuthVerifier`] is this crate's own hook for an
//! additional, optional layer of token verification.

pub mod auth;
pub mod connection;
pub mod protocol;
pub mod router;
pub mod state;

pub use auth::{AuthVerifier, DenyAllAuthVerifier, NoopAuthVerifier};
pub use router::collaboration_router;
pub use state::AppState;
