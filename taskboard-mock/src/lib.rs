//! `Taskboard` mock backend library.
//!
//! An in-memory implementation of the Taskboard REST API: accounts with
//! email verification, short-lived bearer credentials with an HttpOnly
//! refresh cookie, and per-user tasks and lists. Used by the client's
//! integration tests and for running the CLI without a real backend.

pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod tokens;
