//! Value objects shared across the domain.

pub mod platform;
pub mod token_pair;

pub use platform::{Platform, PlatformKind};
pub use token_pair::TokenPair;
