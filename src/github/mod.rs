//! GitHub App authentication.
//!
//! GitHub Apps authenticate in two steps: a short-lived JWT signed with the
//! app's private key, then an exchange of that JWT for an installation
//! access token scoped to a single installation.

pub mod token_manager;

pub use token_manager::CredentialProvider;
