//! # AuthMesh Core
//!
//! Session/token lifecycle and multi-factor verification core for the
//! AuthMesh identity platform. This crate contains the compact-token
//! engine, lifecycle entities, verifier state machines, repository
//! interfaces, and the services that tie them together.

pub mod domain;
pub mod errors;
pub mod jwt;
pub mod plugins;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::*;
pub use errors::*;
pub use jwt::*;
pub use repositories::*;
pub use services::*;
