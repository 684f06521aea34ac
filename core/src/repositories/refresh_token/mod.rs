//! Refresh token persistence port.

mod mock;
mod r#trait;

pub use mock::MockRefreshTokenRepository;
pub use r#trait::RefreshTokenRepository;
