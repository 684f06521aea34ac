//! Verifier-device persistence port.

mod mock;
mod r#trait;

pub use mock::MockOtpDeviceRepository;
pub use r#trait::{OtpDevice, OtpDeviceRepository};
