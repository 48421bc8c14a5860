// Password hashing and verification
// New hashes use Argon2id; bcrypt hashes imported from the legacy platform still verify

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{distributions::Uniform, Rng};
use thiserror::Error;

/// Errors that can occur during password operations
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingError(String),

    #[error("Failed to verify password: {0}")]
    VerificationError(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Argon2id parameters
pub struct PasswordConfig {
    /// Memory cost in KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub output_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // OWASP minimum for Argon2id: 19 MiB, 2 iterations, 1 lane
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
            output_length: 32,
        }
    }
}

impl PasswordConfig {
    fn build_hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.output_length),
        )
        .map_err(|e| PasswordError::HashingError(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a password using Argon2id with the default parameters.
/// Returns the PHC string (`$argon2id$v=19$m=19456,t=2,p=1$...`).
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_config(password, &PasswordConfig::default())
}

pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let argon2 = config.build_hasher()?;
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingError(e.to_string()))?;

    Ok(password_hash.to_string())
}

fn is_bcrypt_hash(hash: &str) -> bool {
    hash.starts_with("$2a$") || hash.starts_with("$2b$") || hash.starts_with("$2y$")
}

/// Verify a password against a stored hash (Argon2 PHC string or legacy bcrypt)
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    if is_bcrypt_hash(hash) {
        return bcrypt::verify(password, hash)
            .map_err(|e| PasswordError::VerificationError(e.to_string()));
    }

    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    // Params are read back from the PHC string
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationError(e.to_string())),
    }
}

/// True when the stored hash should be replaced after a successful login
pub fn needs_rehash(hash: &str) -> bool {
    if is_bcrypt_hash(hash) {
        return true;
    }
    match PasswordHash::new(hash) {
        Ok(parsed) => parsed.algorithm != Algorithm::Argon2id.ident(),
        Err(_) => true,
    }
}

const TEMP_PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";

/// Random password handed to prospects created by an apporteur.
/// Ambiguous glyphs (0/O, 1/l/I) are excluded.
pub fn generate_temporary_password(length: usize) -> String {
    let length = length.max(8);
    let dist = Uniform::from(0..TEMP_PASSWORD_ALPHABET.len());
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| TEMP_PASSWORD_ALPHABET[rng.sample(dist)] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
            output_length: 32,
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let password = "MySecureP@ssw0rd123!";
        let hash = hash_password(password).expect("Failed to hash password");

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).expect("Failed to verify password"));
        assert!(!verify_password("WrongPassword", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = "TestPassword123!";
        let hash1 = hash_password_with_config(password, &fast_config()).unwrap();
        let hash2 = hash_password_with_config(password, &fast_config()).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password(password, &hash1).unwrap());
        assert!(verify_password(password, &hash2).unwrap());
    }

    #[test]
    fn test_legacy_bcrypt_hash_verifies() {
        let legacy = bcrypt::hash("ancien-mot-de-passe", 4).unwrap();

        assert!(verify_password("ancien-mot-de-passe", &legacy).unwrap());
        assert!(!verify_password("autre", &legacy).unwrap());
        assert!(needs_rehash(&legacy));
    }

    #[test]
    fn test_argon2id_hash_does_not_need_rehash() {
        let hash = hash_password_with_config("whatever-123", &fast_config()).unwrap();
        assert!(!needs_rehash(&hash));
        assert!(needs_rehash("garbage"));
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("password", "not_a_valid_hash");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_temporary_password() {
        let pwd = generate_temporary_password(12);
        assert_eq!(pwd.len(), 12);
        assert!(pwd.bytes().all(|b| TEMP_PASSWORD_ALPHABET.contains(&b)));

        // Never shorter than 8
        assert_eq!(generate_temporary_password(3).len(), 8);
        assert_ne!(generate_temporary_password(16), generate_temporary_password(16));
    }
}
