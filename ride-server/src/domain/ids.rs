//! Identifier types.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::DomainError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map($name)
                    .map_err(|_| DomainError::InvalidId {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

numeric_id!(
    /// Identity of a rider, issued by the external identity service.
    RiderId,
    "rider"
);
numeric_id!(
    /// Identity of a captain (driver).
    CaptainId,
    "captain"
);
numeric_id!(
    /// Identity of an operator acting with admin rights.
    AdminId,
    "admin"
);
numeric_id!(
    /// Internal ride identifier, assigned by the store.
    RideId,
    "ride"
);

/// Alphabet for public ride codes. Omits 0/O and 1/I to avoid misreads.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const CODE_PREFIX: &str = "RD-";
const CODE_LEN: usize = 6;

/// Public ride code shown to riders and support staff, e.g. `RD-7KQ2MX`.
///
/// Always [`CODE_LEN`] characters from [`CODE_ALPHABET`] after the prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RideCode([u8; CODE_LEN]);

impl RideCode {
    /// Generate a fresh random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; CODE_LEN];
        for b in &mut bytes {
            *b = CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())];
        }
        RideCode(bytes)
    }

    /// Parse a code of the form `RD-XXXXXX`.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let body = s
            .strip_prefix(CODE_PREFIX)
            .ok_or(DomainError::InvalidRideCode("missing RD- prefix"))?;
        let bytes = body.as_bytes();
        if bytes.len() != CODE_LEN {
            return Err(DomainError::InvalidRideCode("must have 6 characters"));
        }
        let mut out = [0u8; CODE_LEN];
        for (slot, &b) in out.iter_mut().zip(bytes) {
            if !CODE_ALPHABET.contains(&b) {
                return Err(DomainError::InvalidRideCode("unexpected character"));
            }
            *slot = b;
        }
        Ok(RideCode(out))
    }
}

impl fmt::Display for RideCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(CODE_PREFIX)?;
        for &b in &self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RideCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RideCode({self})")
    }
}

impl TryFrom<String> for RideCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RideCode::parse(&value)
    }
}

impl From<RideCode> for String {
    fn from(code: RideCode) -> Self {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn numeric_ids_parse_and_display() {
        let id: CaptainId = "42".parse().unwrap();
        assert_eq!(id, CaptainId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<RiderId>().is_err());
        assert!("-3".parse::<RideId>().is_err());
    }

    #[test]
    fn generated_codes_parse_back() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let code = RideCode::generate(&mut rng);
            let text = code.to_string();
            assert!(text.starts_with("RD-"));
            assert_eq!(RideCode::parse(&text).unwrap(), code);
        }
    }

    #[test]
    fn reject_malformed_codes() {
        assert!(RideCode::parse("7KQ2MX").is_err());
        assert!(RideCode::parse("RD-7KQ2M").is_err());
        assert!(RideCode::parse("RD-7KQ2MXX").is_err());
        // ambiguous characters are never issued
        assert!(RideCode::parse("RD-0KQ2MX").is_err());
        assert!(RideCode::parse("RD-7kq2mx").is_err());
    }

    #[test]
    fn code_serializes_as_string() {
        let code = RideCode::parse("RD-7KQ2MX").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"RD-7KQ2MX\"");
        let back: RideCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
