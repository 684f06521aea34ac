//! Session persistence port.

mod mock;
mod r#trait;

pub use mock::MockSessionRepository;
pub use r#trait::SessionRepository;
