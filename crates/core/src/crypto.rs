//! Symmetric encryption for credentials and captured sessions.
//!
//! Uses AES-256-GCM keyed by the SHA-256 digest of the process-wide secret.
//! Every encryption draws a fresh random 96-bit nonce, so equal plaintexts
//! produce different ciphertexts.
//!
//! Encoded form: `v1:` followed by standard base64 of `nonce || ciphertext || tag`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

use crate::error::{Error, Result};

const PREFIX: &str = "v1:";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Ciphertext could not be turned back into plaintext.
///
/// Never carries partial plaintext: a wrong key and a tampered ciphertext both
/// fail authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptionError {
	#[error("Decryption failed: malformed ciphertext ({0})")]
	Malformed(String),

	#[error("Decryption failed: wrong key or tampered data")]
	AuthenticationFailed,

	#[error("Decryption failed: plaintext is not valid UTF-8")]
	InvalidUtf8,
}

/// AES-256-GCM cipher bound to one secret.
pub struct Cipher {
	key: [u8; 32],
}

impl Cipher {
	/// Derives the key from `secret`. Empty secrets are rejected.
	pub fn from_secret(secret: &str) -> Result<Self> {
		if secret.is_empty() {
			return Err(Error::Config("encryption secret must not be empty".into()));
		}
		Ok(Self {
			key: Sha256::digest(secret.as_bytes()).into(),
		})
	}

	pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
		let cipher = Aes256Gcm::new((&self.key).into());
		let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
		let sealed = cipher
			.encrypt(&nonce, plaintext)
			.map_err(|e| Error::Encryption(e.to_string()))?;

		let mut framed = Vec::with_capacity(NONCE_LEN + sealed.len());
		framed.extend_from_slice(nonce.as_slice());
		framed.extend_from_slice(&sealed);
		Ok(format!("{PREFIX}{}", STANDARD.encode(framed)))
	}

	pub fn decrypt(&self, encoded: &str) -> std::result::Result<Vec<u8>, DecryptionError> {
		let body = encoded
			.strip_prefix(PREFIX)
			.ok_or_else(|| DecryptionError::Malformed("missing version prefix".into()))?;
		let framed = STANDARD
			.decode(body.trim())
			.map_err(|e| DecryptionError::Malformed(e.to_string()))?;
		if framed.len() < NONCE_LEN + TAG_LEN {
			return Err(DecryptionError::Malformed("ciphertext too short".into()));
		}

		let (nonce, sealed) = framed.split_at(NONCE_LEN);
		let cipher = Aes256Gcm::new((&self.key).into());
		cipher
			.decrypt(Nonce::from_slice(nonce), sealed)
			.map_err(|_| DecryptionError::AuthenticationFailed)
	}

	pub fn encrypt_str(&self, plaintext: &str) -> Result<String> {
		self.encrypt(plaintext.as_bytes())
	}

	pub fn decrypt_str(&self, encoded: &str) -> std::result::Result<String, DecryptionError> {
		String::from_utf8(self.decrypt(encoded)?).map_err(|_| DecryptionError::InvalidUtf8)
	}
}

impl Drop for Cipher {
	fn drop(&mut self) {
		self.key.zeroize();
	}
}

impl std::fmt::Debug for Cipher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Cipher").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn string_roundtrip() {
		let cipher = Cipher::from_secret("test-secret").unwrap();
		let encrypted = cipher.encrypt_str("hunter2").unwrap();
		assert!(encrypted.starts_with("v1:"));
		assert_eq!(cipher.decrypt_str(&encrypted).unwrap(), "hunter2");
	}

	#[test]
	fn same_plaintext_encrypts_differently() {
		let cipher = Cipher::from_secret("test-secret").unwrap();
		let a = cipher.encrypt_str("same").unwrap();
		let b = cipher.encrypt_str("same").unwrap();
		assert_ne!(a, b);
		assert_eq!(cipher.decrypt_str(&a).unwrap(), cipher.decrypt_str(&b).unwrap());
	}

	#[test]
	fn wrong_key_fails_authentication() {
		let encrypted = Cipher::from_secret("one").unwrap().encrypt_str("secret").unwrap();
		let err = Cipher::from_secret("two").unwrap().decrypt_str(&encrypted).unwrap_err();
		assert_eq!(err, DecryptionError::AuthenticationFailed);
	}

	#[test]
	fn tampering_is_detected() {
		let cipher = Cipher::from_secret("k").unwrap();
		let encrypted = cipher.encrypt_str("original").unwrap();
		let mut bytes = STANDARD.decode(&encrypted[PREFIX.len()..]).unwrap();
		let last = bytes.len() - 1;
		bytes[last] ^= 0xFF;
		let tampered = format!("{PREFIX}{}", STANDARD.encode(bytes));
		assert_eq!(cipher.decrypt_str(&tampered).unwrap_err(), DecryptionError::AuthenticationFailed);
	}

	#[test]
	fn malformed_input_is_typed() {
		let cipher = Cipher::from_secret("k").unwrap();
		assert!(matches!(cipher.decrypt_str("plaintext"), Err(DecryptionError::Malformed(_))));
		assert!(matches!(cipher.decrypt_str("v1:!!!"), Err(DecryptionError::Malformed(_))));
		assert!(matches!(cipher.decrypt_str("v1:AAAA"), Err(DecryptionError::Malformed(_))));
	}

	#[test]
	fn empty_secret_is_rejected() {
		assert!(Cipher::from_secret("").is_err());
	}
}
