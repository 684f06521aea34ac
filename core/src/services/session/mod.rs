//! Session service module
//!
//! This module handles the session lifecycle end to end:
//! - Login (atomic get-or-create per user/platform/device triple)
//! - Refresh token chain creation with multi-factor pre-authorization
//! - Access/refresh token derivation and signing
//! - Plugin claim attachment
//! - Revocation, visible to every subsequent refresh

mod service;

#[cfg(test)]
mod tests;

pub use service::SessionService;
