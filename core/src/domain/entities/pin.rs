//! Salted pin hashing
//!
//! Pins are hashed with bcrypt at generation time and only the hash is
//! kept. Comparison goes through the library's verifier, which re-derives
//! the hash from the embedded salt.

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::errors::OtpError;

/// A bcrypt-hashed pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedPin(String);

impl HashedPin {
    /// Hashes a plaintext pin
    pub fn new(plain: &str, cost: u32) -> Result<Self, OtpError> {
        let hash = bcrypt::hash(plain, cost).map_err(|_| OtpError::HashingFailed)?;
        Ok(Self(hash))
    }

    /// Whether a candidate pin matches the stored hash
    pub fn matches(&self, candidate: &str) -> bool {
        bcrypt::verify(candidate, &self.0).unwrap_or(false)
    }
}

/// Generates a random numeric pin of the given length
///
/// Drawn from the OS CSPRNG. The modulo bias over a 64-bit draw is
/// negligible for pin lengths up to 9.
pub fn generate_pin(length: u32) -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    let num = u64::from_le_bytes(bytes);
    let modulus = 10u64.pow(length);
    format!("{:0width$}", num % modulus, width = length as usize)
}
