//! Compact token engine
//!
//! This module handles the signed-token wire format end to end:
//! - Claim sets and the configurable claim-name registry
//! - Pure claim validation (temporal and identity rules)
//! - Encode/decode over a pluggable signing backend
//! - The typed access/refresh token view

mod claims;
mod codec;
mod token;
mod validator;

pub use claims::ClaimSet;
pub use codec::{TokenBackend, TokenCodec};
pub use token::{SessionToken, TokenKind};
pub use validator::{ClaimValidator, Expectations, ValidationOptions};
