//! One-time pickup codes.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

const OTP_DIGITS: usize = 4;

/// The code shown to the rider and entered by the captain to start a ride.
///
/// `verified` flips to true only when a matching code is submitted on the
/// `arrived → started` transition.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeCode {
    value: String,
    verified: bool,
}

impl OneTimeCode {
    /// Generate a random four-digit code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value: String = (0..OTP_DIGITS)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self {
            value,
            verified: false,
        }
    }

    /// Construct a code with a known value (tests, fixtures).
    pub fn from_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            verified: false,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Compare without short-circuiting on the first differing byte.
    pub fn matches(&self, submitted: &str) -> bool {
        let a = self.value.as_bytes();
        let b = submitted.trim().as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }

    pub(crate) fn mark_verified(&mut self) {
        self.verified = true;
    }

    pub(crate) fn reset(&mut self) {
        self.verified = false;
    }
}

// The value is never printed in logs.
impl fmt::Debug for OneTimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneTimeCode")
            .field("value", &"****")
            .field("verified", &self.verified)
            .finish()
    }
}
