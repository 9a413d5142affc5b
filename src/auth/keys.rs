//! RS256 key material: loading, public-key derivation, key ids and generation.

use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{DecodingKey, EncodingKey};
use parking_lot::Mutex;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::auth::config::KeySource;
use crate::auth::{AuthError, AuthResult};

const KID_FINGERPRINT_BYTES: usize = 12;
pub const MIN_RSA_BITS: usize = 2048;

/// A loaded signing keypair.
pub struct KeyPair {
    pub(crate) encoding_key: EncodingKey,
    pub(crate) decoding_key: DecodingKey,
    kid: String,
    public_key_pem: String,
}

impl KeyPair {
    pub fn load(source: &KeySource, kid_override: Option<&str>) -> AuthResult<Self> {
        let (private_pem, public_pem) = match source {
            KeySource::Files {
                private_key,
                public_key,
            } => (
                read_pem(private_key)?,
                public_key.as_deref().map(read_pem).transpose()?,
            ),
            KeySource::Pem {
                private_key,
                public_key,
            } => (private_key.clone(), public_key.clone()),
        };

        Self::from_pem(&private_pem, public_pem.as_deref(), kid_override)
    }

    pub fn from_pem(
        private_pem: &str,
        public_pem: Option<&str>,
        kid_override: Option<&str>,
    ) -> AuthResult<Self> {
        let private_key = parse_private_key(private_pem)?;
        let derived = private_key.to_public_key();
        let public_key = match public_pem {
            Some(pem) => {
                let configured = parse_public_key(pem)?;
                if configured != derived {
                    return Err(AuthError::Config(
                        "configured public key does not match the private key".into(),
                    ));
                }
                configured
            }
            None => derived,
        };

        let public_key_pem = public_key.to_public_key_pem(LineEnding::LF)?;
        let kid = match kid_override {
            Some(kid) => kid.to_string(),
            None => fingerprint(&public_key)?,
        };

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|err| AuthError::Config(format!("unusable RSA private key: {err}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|err| AuthError::Config(format!("unusable RSA public key: {err}")))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            kid,
            public_key_pem,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }
}

/// Keypair loaded on first use and cached for the life of the process.
///
/// Concurrent first callers serialize on the init lock, so the key files are
/// read at most once per successful load and nobody sees a half-built key.
/// A failed load is not cached.
pub struct SigningKeys {
    source: KeySource,
    kid_override: Option<String>,
    loaded: OnceLock<Arc<KeyPair>>,
    init_lock: Mutex<()>,
}

impl SigningKeys {
    pub fn new(source: KeySource, kid_override: Option<String>) -> Self {
        Self {
            source,
            kid_override,
            loaded: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> AuthResult<Arc<KeyPair>> {
        if let Some(keys) = self.loaded.get() {
            return Ok(Arc::clone(keys));
        }

        let _guard = self.init_lock.lock();
        if let Some(keys) = self.loaded.get() {
            return Ok(Arc::clone(keys));
        }

        let keys = Arc::new(KeyPair::load(&self.source, self.kid_override.as_deref())?);
        log::info!("loaded RS256 signing key (kid {})", keys.kid());
        let _ = self.loaded.set(Arc::clone(&keys));
        Ok(keys)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }
}

/// PEM-encoded keypair produced by [`generate_rsa_pem`].
pub struct GeneratedKeyPair {
    pub private_pem: String,
    pub public_pem: String,
    pub kid: String,
}

pub fn generate_rsa_pem(bits: usize) -> AuthResult<GeneratedKeyPair> {
    if bits < MIN_RSA_BITS {
        return Err(AuthError::Config(format!(
            "RSA keys must be at least {MIN_RSA_BITS} bits, got {bits}"
        )));
    }

    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|err| AuthError::Rsa(err.to_string()))?;
    let public_key = private_key.to_public_key();

    Ok(GeneratedKeyPair {
        private_pem: private_key.to_pkcs8_pem(LineEnding::LF)?.to_string(),
        public_pem: public_key.to_public_key_pem(LineEnding::LF)?,
        kid: fingerprint(&public_key)?,
    })
}

fn read_pem(path: &Path) -> AuthResult<String> {
    fs::read_to_string(path).map_err(|err| {
        AuthError::Config(format!("failed to read key file {}: {err}", path.display()))
    })
}

fn parse_private_key(pem: &str) -> AuthResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|err| AuthError::Config(format!("invalid RSA private key: {err}")))
}

fn parse_public_key(pem: &str) -> AuthResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|err| AuthError::Config(format!("invalid RSA public key: {err}")))
}

/// Key id: truncated SHA-256 over the SPKI DER encoding of the public key.
fn fingerprint(public_key: &RsaPublicKey) -> AuthResult<String> {
    let der = public_key.to_public_key_der()?;
    let digest = Sha256::digest(der.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(&digest[..KID_FINGERPRINT_BYTES]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FOREIGN_PRIVATE_KEY_PEM, TEST_PRIVATE_KEY_PEM, TEST_PUBLIC_KEY_PEM};

    #[test]
    fn derived_and_configured_public_keys_agree() {
        let derived = KeyPair::from_pem(TEST_PRIVATE_KEY_PEM, None, None).expect("derived");
        let configured = KeyPair::from_pem(TEST_PRIVATE_KEY_PEM, Some(TEST_PUBLIC_KEY_PEM), None)
            .expect("configured");
        assert_eq!(derived.kid(), configured.kid());
        assert!(derived.public_key_pem().starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn rejects_mismatched_public_key() {
        let result = KeyPair::from_pem(FOREIGN_PRIVATE_KEY_PEM, Some(TEST_PUBLIC_KEY_PEM), None);
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn rejects_garbage_key_material() {
        let result = KeyPair::from_pem("not a key", None, None);
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn honours_kid_override() {
        let keys = KeyPair::from_pem(TEST_PRIVATE_KEY_PEM, None, Some("2026-10")).expect("keys");
        assert_eq!(keys.kid(), "2026-10");
    }

    #[test]
    fn loads_lazily_and_once_across_threads() {
        let keys = Arc::new(SigningKeys::new(
            KeySource::Pem {
                private_key: TEST_PRIVATE_KEY_PEM.into(),
                public_key: None,
            },
            None,
        ));
        assert!(!keys.is_loaded());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let keys = Arc::clone(&keys);
                std::thread::spawn(move || keys.get().expect("load"))
            })
            .collect();
        let loaded: Vec<Arc<KeyPair>> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect();

        assert!(keys.is_loaded());
        for pair in loaded.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }

    #[test]
    fn missing_key_file_is_a_config_error() {
        let keys = SigningKeys::new(
            KeySource::Files {
                private_key: "/nonexistent/identity/private.pem".into(),
                public_key: None,
            },
            None,
        );
        assert!(matches!(keys.get(), Err(AuthError::Config(_))));
        assert!(!keys.is_loaded());
    }
}
