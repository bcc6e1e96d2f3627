use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::config::PasswordConfig;

/// Argon2id hashing with a configurable work factor.
///
/// Also keeps a digest of a random secret, built with the same parameters,
/// to verify against when there is no stored hash to check.
#[derive(Clone)]
pub struct PasswordHashing {
    params: Params,
    decoy_hash: Arc<str>,
    verifications: Arc<AtomicU64>,
}

impl PasswordHashing {
    pub fn new(cfg: PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, 1, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        let mut hashing = Self {
            params,
            decoy_hash: Arc::from(""),
            verifications: Arc::new(AtomicU64::new(0)),
        };
        let secret = SaltString::generate(&mut OsRng);
        hashing.decoy_hash = Arc::from(hashing.hash_password(secret.as_str())?);
        Ok(hashing)
    }

    /// Number of password verifications run so far, decoys included.
    pub fn verifications(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_password(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// A digest that does not parse never matches.
    pub fn verify_password(&self, plain: &str, hash: &str) -> bool {
        self.verifications.fetch_add(1, Ordering::Relaxed);
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "stored password hash is malformed");
                return false;
            }
        };
        // parameters come from the PHC string, not from self
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    pub async fn hash_async(&self, plain: String) -> anyhow::Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_password(&plain))
            .await
            .map_err(|e| anyhow::anyhow!("hash task join error: {e}"))?
    }

    pub async fn verify_async(&self, plain: String, hash: String) -> anyhow::Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_password(&plain, &hash))
            .await
            .map_err(|e| anyhow::anyhow!("verify task join error: {e}"))
    }

    /// Runs a full verification against the decoy digest and discards the
    /// result, so a missing account costs as much as a wrong password.
    pub async fn verify_decoy_async(&self, plain: String) -> anyhow::Result<()> {
        self.verify_async(plain, self.decoy_hash.to_string()).await?;
        Ok(())
    }
}
