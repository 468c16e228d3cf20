//! Password hashing (PBKDF2-HMAC-SHA256).
//!
//! Stored form is `hex(salt):hex(hash)`.

use pbkdf2::pbkdf2_hmac;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const SALT_LEN: usize = 16;
pub const HASH_LEN: usize = 32;
pub const DEFAULT_ITERATIONS: u32 = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("stored password hash is malformed")]
    Malformed,
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let mut hash = [0u8; HASH_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, self.iterations, &mut hash);

        format!("{}:{}", hex::encode(salt), hex::encode(hash))
    }

    /// Check `password` against a stored `salt:hash` in constant time.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, PasswordError> {
        let (salt, expected) = stored.split_once(':').ok_or(PasswordError::Malformed)?;
        let salt = hex::decode(salt).map_err(|_| PasswordError::Malformed)?;
        let expected = hex::decode(expected).map_err(|_| PasswordError::Malformed)?;
        if salt.is_empty() || expected.is_empty() {
            return Err(PasswordError::Malformed);
        }

        let mut actual = vec![0u8; expected.len()];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, self.iterations, &mut actual);

        Ok(actual.ct_eq(&expected).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Low iteration count keeps the suite fast; the format is the same.
    fn hasher() -> PasswordHasher {
        PasswordHasher::new(64)
    }

    #[test]
    fn hash_then_verify() {
        let stored = hasher().hash("Admin123!");
        assert!(hasher().verify("Admin123!", &stored).unwrap());
        assert!(!hasher().verify("admin123!", &stored).unwrap());
    }

    #[test]
    fn stored_form_is_hex_salt_and_hash() {
        let stored = hasher().hash("pw");
        let (salt, hash) = stored.split_once(':').unwrap();
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert_eq!(hash.len(), HASH_LEN * 2);
        assert!(stored.chars().all(|c| c == ':' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hasher().hash("pw"), hasher().hash("pw"));
    }

    #[test]
    fn malformed_hashes_are_rejected() {
        for stored in ["", "nocolon", "zz:00", "abc:00", ":00", "00:", "é0:00", "00:0g"] {
            assert_eq!(hasher().verify("pw", stored), Err(PasswordError::Malformed), "{stored}");
        }
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let stored = hasher().hash("pw").to_uppercase();
        assert!(hasher().verify("pw", &stored).unwrap());
    }

    #[test]
    fn iteration_count_is_part_of_the_hash() {
        let stored = PasswordHasher::new(10).hash("pw");
        assert!(!PasswordHasher::new(11).verify("pw", &stored).unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn only_the_hashed_password_verifies(password in ".{1,32}", other in ".{1,32}") {
            let hasher = PasswordHasher::new(2);
            let stored = hasher.hash(&password);
            prop_assert!(hasher.verify(&password, &stored).unwrap());
            prop_assert_eq!(hasher.verify(&other, &stored).unwrap(), other == password);
        }
    }
}
