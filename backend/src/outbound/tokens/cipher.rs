//! AES-256-GCM decryption of stored platform credentials.
//!
//! Credentials are stored as `iv:authTag:ciphertext`, each part hex-encoded,
//! written by the OAuth-connect flow with a 12-byte IV and a 16-byte
//! authentication tag. The AEAD here consumes ciphertext with the tag
//! appended, so the parts are reassembled before decryption. Error messages
//! deliberately carry no key, token, or ciphertext material.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use zeroize::Zeroizing;

use crate::domain::model::AccessToken;

/// Expected IV length in bytes.
const IV_LEN: usize = 12;

/// Expected authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Errors produced while decrypting a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// The stored blob does not have the `iv:authTag:ciphertext` shape.
    #[error("stored credential is malformed: {message}")]
    Format { message: String },
    /// Authenticated decryption failed (wrong key or tampered blob).
    #[error("credential decryption failed")]
    Decrypt,
}

impl CipherError {
    fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }
}

/// Decrypts `iv:authTag:ciphertext` blobs with a fixed 32-byte key.
pub struct TokenCipher {
    key: Key<Aes256Gcm>,
}

impl TokenCipher {
    /// Build a cipher from a 64-character hex key.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Format` when the key is not exactly 32 bytes of
    /// valid hex.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, CipherError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_key).map_err(|_| CipherError::format("key is not valid hex"))?,
        );
        if bytes.len() != 32 {
            return Err(CipherError::format(format!(
                "key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            key: *Key::<Aes256Gcm>::from_slice(&bytes),
        })
    }

    /// Decrypt a stored credential blob into a usable bearer token.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Format` for a malformed blob and
    /// `CipherError::Decrypt` when authentication fails.
    pub fn decrypt(&self, blob: &str) -> Result<AccessToken, CipherError> {
        let mut parts = blob.splitn(3, ':');
        let (Some(iv_hex), Some(tag_hex), Some(ciphertext_hex)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CipherError::format(
                "expected three colon-separated hex parts",
            ));
        };

        let iv = hex::decode(iv_hex).map_err(|_| CipherError::format("iv is not valid hex"))?;
        if iv.len() != IV_LEN {
            return Err(CipherError::format(format!(
                "iv must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        let tag = hex::decode(tag_hex).map_err(|_| CipherError::format("tag is not valid hex"))?;
        if tag.len() != TAG_LEN {
            return Err(CipherError::format(format!(
                "tag must be {TAG_LEN} bytes, got {}",
                tag.len()
            )));
        }
        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|_| CipherError::format("ciphertext is not valid hex"))?;

        // The AEAD expects ciphertext with the tag appended.
        let mut sealed = Zeroizing::new(Vec::with_capacity(ciphertext.len() + tag.len()));
        sealed.extend_from_slice(&ciphertext);
        sealed.extend_from_slice(&tag);

        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
                .map_err(|_| CipherError::Decrypt)?,
        );
        let token = core::str::from_utf8(&plaintext).map_err(|_| CipherError::Decrypt)?;
        Ok(AccessToken::new(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::AeadCore;
    use aes_gcm::aead::OsRng;
    use rstest::rstest;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    /// Produce a blob in the stored `iv:authTag:ciphertext` shape.
    fn seal(cipher_key: &str, plaintext: &str) -> String {
        let cipher = TokenCipher::from_hex_key(cipher_key).expect("valid key");
        let aead = Aes256Gcm::new(&cipher.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = aead
            .encrypt(&nonce, plaintext.as_bytes())
            .expect("encryption succeeds");
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        format!(
            "{}:{}:{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(ciphertext)
        )
    }

    #[test]
    fn round_trips_a_sealed_token() {
        let blob = seal(KEY_HEX, "ya29.secret-bearer");
        let cipher = TokenCipher::from_hex_key(KEY_HEX).expect("valid key");

        let token = cipher.decrypt(&blob).expect("decryption succeeds");
        assert_eq!(token.as_str(), "ya29.secret-bearer");
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let blob = seal(KEY_HEX, "ya29.secret-bearer");
        let other_key = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";
        let cipher = TokenCipher::from_hex_key(other_key).expect("valid key");

        assert!(matches!(cipher.decrypt(&blob), Err(CipherError::Decrypt)));
    }

    #[rstest]
    #[case("only-two:parts")]
    #[case("zz:aabb:ccdd")]
    #[case("aabb:aabb:ccdd")]
    #[case("")]
    fn malformed_blobs_are_format_errors(#[case] blob: &str) {
        let cipher = TokenCipher::from_hex_key(KEY_HEX).expect("valid key");

        assert!(matches!(
            cipher.decrypt(blob),
            Err(CipherError::Format { .. })
        ));
    }

    #[test]
    fn errors_never_echo_the_blob() {
        let cipher = TokenCipher::from_hex_key(KEY_HEX).expect("valid key");
        let blob = seal(KEY_HEX, "ya29.secret-bearer");
        let truncated = &blob[..blob.len() - 2];

        let error = cipher.decrypt(truncated).expect_err("tampered blob fails");
        assert!(!error.to_string().contains("ya29"));
        assert!(!error.to_string().contains(truncated));
    }

    #[rstest]
    #[case("short")]
    #[case("zz0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f")]
    fn bad_keys_are_rejected(#[case] key: &str) {
        assert!(matches!(
            TokenCipher::from_hex_key(key),
            Err(CipherError::Format { .. })
        ));
    }
}
