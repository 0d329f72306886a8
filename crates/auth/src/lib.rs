//! `stockwatch-auth` — credential checks for the query API.
//!
//! Decoupled from HTTP: the API crate extracts the header, this crate parses
//! and validates it.

pub mod basic;

pub use basic::{AuthError, CredentialValidator, Credentials, StaticCredentialValidator};
