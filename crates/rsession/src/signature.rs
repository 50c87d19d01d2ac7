//! Cookie value signing.
//!
//! Signed values use the `cookie-signature` layout: the value, a `.`, then
//! the unpadded standard base64 of `HMAC-SHA256(secret, value)`. Cookies
//! issued by other implementations of that layout verify here unchanged.
//!
//! # Security
//!
//! Signature comparison is constant-time.

use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::SessionConfig;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies session ids.
///
/// New values are always signed with the primary secret. Verification also
/// accepts fallback secrets so a secret can be rotated without logging
/// every client out.
#[derive(Clone)]
pub struct Signer {
    primary: String,
    fallbacks: Vec<String>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("primary", &"<redacted>")
            .field("fallbacks", &self.fallbacks.len())
            .finish()
    }
}

impl Signer {
    /// Create a signer for a single secret.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let primary = secret.into();
        if primary.is_empty() {
            return Err(Error::Configuration("secret must not be empty".to_string()));
        }
        Ok(Self {
            primary,
            fallbacks: Vec::new(),
        })
    }

    /// Create a signer from the secrets in a configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let mut signer = Self::new(config.secret.clone())?;
        for secret in &config.fallback_secrets {
            signer = signer.with_fallback(secret.clone())?;
        }
        Ok(signer)
    }

    /// Also accept values signed with `secret`.
    pub fn with_fallback(mut self, secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(Error::Configuration(
                "fallback secret must not be empty".to_string(),
            ));
        }
        self.fallbacks.push(secret);
        Ok(self)
    }

    /// Sign `value` with the primary secret.
    pub fn sign(&self, value: &str) -> String {
        sign(value, &self.primary)
    }

    /// Recover the value from a signed string.
    ///
    /// Returns `None` when the input is malformed or no configured secret
    /// produced its signature. This is an expected outcome, not an error.
    pub fn verify(&self, signed: &str) -> Option<String> {
        std::iter::once(&self.primary)
            .chain(self.fallbacks.iter())
            .find_map(|secret| verify(signed, secret))
    }
}

/// Sign `value` with `secret`.
pub fn sign(value: &str, secret: &str) -> String {
    format!("{}.{}", value, mac(value, secret))
}

/// Recover the value from `signed` if it was signed with `secret`.
pub fn verify(signed: &str, secret: &str) -> Option<String> {
    let (value, _) = signed.rsplit_once('.')?;
    let expected = sign(value, secret);

    if constant_time_eq(expected.as_bytes(), signed.as_bytes()) {
        Some(value.to_string())
    } else {
        None
    }
}

fn mac(value: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(value.as_bytes());
    STANDARD_NO_PAD.encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() == b.len() {
        a.ct_eq(b).into()
    } else {
        let _ = a.ct_eq(a);
        false
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn id() -> impl Strategy<Value = String> {
        prop_oneof![
            any::<String>(),
            "[ -~]{0,48}",
            "[a-z0-9]{0,8}(\\.[a-z0-9+/]{0,8}){1,4}",
        ]
    }

    /// Printable secrets up to one HMAC block, so distinct strings are
    /// distinct keys.
    fn secret() -> impl Strategy<Value = String> {
        "[ -~]{1,32}"
    }

    proptest! {
        #[test]
        fn verify_inverts_sign(id in id(), secret in secret()) {
            let signed = sign(&id, &secret);
            prop_assert_eq!(verify(&signed, &secret), Some(id));
        }

        #[test]
        fn other_secret_is_rejected(id in id(), s1 in secret(), s2 in secret()) {
            prop_assume!(s1 != s2);
            prop_assert_eq!(verify(&sign(&id, &s1), &s2), None);
        }

        #[test]
        fn signer_accepts_only_configured_secrets(
            id in id(),
            primary in secret(),
            fallback in secret(),
            stranger in secret(),
        ) {
            prop_assume!(stranger != primary && stranger != fallback);
            let signer = Signer::new(primary.clone())
                .unwrap()
                .with_fallback(fallback.clone())
                .unwrap();

            prop_assert_eq!(signer.verify(&sign(&id, &primary)), Some(id.clone()));
            prop_assert_eq!(signer.verify(&sign(&id, &fallback)), Some(id.clone()));
            prop_assert_eq!(signer.verify(&sign(&id, &stranger)), None);
        }

        #[test]
        fn verify_never_panics(input in any::<String>(), secret in secret()) {
            let _ = verify(&input, &secret);
        }
    }
}
