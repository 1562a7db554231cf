// AES-256-GCM encryption for stored datasource passwords
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; 32],
}

impl SecretCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Build from a base64-encoded 32 byte key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = STANDARD
            .decode(encoded.trim())
            .context("secret key is not valid base64")?;
        let key: [u8; 32] = decoded
            .try_into()
            .map_err(|bytes: Vec<u8>| anyhow::anyhow!("secret key must be 32 bytes, got {}", bytes.len()))?;
        Ok(Self::new(key))
    }

    #[cfg(test)]
    pub fn generate() -> Self {
        Self::new(rand::random())
    }

    /// Returns base64 of `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let encrypted = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("encryption failed: {}", e))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + encrypted.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&encrypted);
        Ok(STANDARD.encode(payload))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let payload = STANDARD
            .decode(encoded)
            .context("encrypted secret is not valid base64")?;
        if payload.len() < NONCE_LEN {
            anyhow::bail!("encrypted secret is truncated");
        }
        let (nonce_bytes, encrypted) = payload.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let decrypted = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
            .map_err(|e| anyhow::anyhow!("decryption failed: {}", e))?;
        String::from_utf8(decrypted).context("decrypted secret is not utf-8")
    }
}
