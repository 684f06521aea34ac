//! Persistence ports and their in-memory test doubles.

pub mod otp;
pub mod refresh_token;
pub mod session;

pub use otp::{MockOtpDeviceRepository, OtpDevice, OtpDeviceRepository};
pub use refresh_token::{MockRefreshTokenRepository, RefreshTokenRepository};
pub use session::{MockSessionRepository, SessionRepository};
