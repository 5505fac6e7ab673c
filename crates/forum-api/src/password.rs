use argon2::{
    Algorithm, Argon2, Params, PasswordHash, Version,
    PasswordHasher as _, PasswordVerifier as _,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::warn;

/// Argon2id work factors.
///
/// The defaults are argon2's own and suit development; production raises
/// them through configuration.
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Salted one-way password hashing.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    /// Hash of a throwaway password, verified against when the account does
    /// not exist so unknown emails cost as much as wrong passwords.
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: HashCost) -> anyhow::Result<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {}", e))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(b"not-a-real-password", &salt)
            .map_err(|e| anyhow::anyhow!("argon2 self-test failed: {}", e))?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    /// PHC-format hash with a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
        Ok(hash.to_string())
    }

    /// A mismatch is `false`, not an error. So is a stored hash that
    /// cannot be parsed.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Unparsable stored password hash: {}", e);
                return false;
            }
        };

        // Parameters are read from the stored hash, so hashes made under an
        // older cost still verify.
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    pub fn verify_dummy(&self, plaintext: &str) {
        let _ = self.verify(plaintext, &self.dummy_hash);
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::new(HashCost {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_hash() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("Passw0rd").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("Passw0rd", &hash));
        assert!(!hasher.verify("passw0rd", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let hasher = cheap_hasher();
        let a = hasher.hash("Passw0rd").unwrap();
        let b = hasher.hash("Passw0rd").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("Passw0rd", &b));
    }

    #[test]
    fn garbage_hash_is_a_mismatch() {
        let hasher = cheap_hasher();
        assert!(!hasher.verify("Passw0rd", "not a phc string"));
    }

    #[test]
    fn hash_from_other_cost_still_verifies() {
        let strong = PasswordHasher::new(HashCost {
            memory_kib: 512,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash("Passw0rd").unwrap();
        assert!(cheap_hasher().verify("Passw0rd", &hash));
    }

    #[test]
    fn rejects_invalid_cost() {
        assert!(
            PasswordHasher::new(HashCost {
                memory_kib: 1,
                iterations: 0,
                parallelism: 1,
            })
            .is_err()
        );
    }
}
