//! Persistence backend client, shared between the sync engine and the CLI.
//!
//! This crate is the single source of truth for the REST side of the wire
//! contract: check-and-load, save (create), rename, rollback, and the saved
//! credentials that authorize them.
//!
//! No retries. A failed call is reported to the caller, who decides.

mod auth;
mod client;

pub use auth::{
    AuthCredentials, auth_file_path, delete_auth, load_auth, load_auth_from, save_auth,
    save_auth_to,
};
pub use client::{HubClient, HubError};
