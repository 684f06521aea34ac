//! Domain entities representing core lifecycle objects.

pub mod backup_code;
pub mod email_otp;
pub mod mobile_otp;
pub mod pin;
pub mod pin_challenge;
pub mod refresh_token;
pub mod security_code;
pub mod session;
pub mod throttle;
pub mod totp;

// Re-export commonly used types
pub use backup_code::BackupCodeSet;
pub use email_otp::EmailOtp;
pub use mobile_otp::MobileOtp;
pub use pin::HashedPin;
pub use pin_challenge::PinChallenge;
pub use refresh_token::{AttachedPlugin, RefreshTokenRecord};
pub use security_code::SecurityCode;
pub use session::Session;
pub use throttle::ThrottleState;
pub use totp::{hotp, TotpAuthenticator};
