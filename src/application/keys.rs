//! Key material for the two signing schemes.
//!
//! Identity tokens are signed with an RSA key pair (RS256), refresh tokens with a
//! shared HMAC secret (HS256). Callers name the [`Scheme`]; the algorithm and key
//! are derived from it here and never from anything carried inside a token.

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, crypto, errors::ErrorKind};
use secrecy::{ExposeSecret, SecretString};

use crate::app_error::{AppError, AppResult};

/// Shortest refresh secret accepted at startup.
pub const MIN_REFRESH_SECRET_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    /// RSA key pair, used for identity tokens.
    Asymmetric,
    /// Shared secret, used for refresh tokens.
    Symmetric,
}

impl Scheme {
    pub fn algorithm(self) -> Algorithm {
        match self {
            Scheme::Asymmetric => Algorithm::RS256,
            Scheme::Symmetric => Algorithm::HS256,
        }
    }
}

/// Process-wide signing material. Built once at startup and shared behind an `Arc`;
/// there is no mutation path.
#[derive(Default)]
pub struct KeyMaterial {
    identity_signing: Option<EncodingKey>,
    identity_verifying: Option<DecodingKey>,
    refresh: Option<(EncodingKey, DecodingKey)>,
}

impl KeyMaterial {
    /// Material with nothing loaded. Every operation fails with `KeyUnavailable`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Full material for an issuing service.
    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        refresh_secret: &SecretString,
    ) -> AppResult<Self> {
        Self::empty()
            .with_identity_keys(Some(private_pem), public_pem)?
            .with_refresh_secret(refresh_secret)
    }

    /// Loads the RSA pair. Passing no private key yields a verify-only provider for
    /// identity tokens.
    pub fn with_identity_keys(
        mut self,
        private_pem: Option<&[u8]>,
        public_pem: &[u8],
    ) -> AppResult<Self> {
        if let Some(pem) = private_pem {
            let key = EncodingKey::from_rsa_pem(pem).map_err(|e| {
                tracing::error!(error = %e, "Failed to parse identity private key");
                AppError::KeyUnavailable
            })?;
            self.identity_signing = Some(key);
        }
        let key = DecodingKey::from_rsa_pem(public_pem).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse identity public key");
            AppError::KeyUnavailable
        })?;
        self.identity_verifying = Some(key);
        Ok(self)
    }

    pub fn with_refresh_secret(mut self, secret: &SecretString) -> AppResult<Self> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.len() < MIN_REFRESH_SECRET_LEN {
            tracing::error!(
                min_len = MIN_REFRESH_SECRET_LEN,
                "Refresh secret is too short"
            );
            return Err(AppError::KeyUnavailable);
        }
        self.refresh = Some((
            EncodingKey::from_secret(bytes),
            DecodingKey::from_secret(bytes),
        ));
        Ok(self)
    }

    pub fn has_scheme(&self, scheme: Scheme) -> bool {
        match scheme {
            Scheme::Asymmetric => self.identity_signing.is_some(),
            Scheme::Symmetric => self.refresh.is_some(),
        }
    }

    /// Signs `payload` and returns the base64url signature.
    pub fn sign(&self, payload: &[u8], scheme: Scheme) -> AppResult<String> {
        let key = match scheme {
            Scheme::Asymmetric => self.identity_signing.as_ref(),
            Scheme::Symmetric => self.refresh.as_ref().map(|(enc, _)| enc),
        }
        .ok_or(AppError::KeyUnavailable)?;

        crypto::sign(payload, key, scheme.algorithm())
            .map_err(|e| AppError::Internal(format!("signing failed: {e}")))
    }

    /// Checks a base64url `signature` over `payload`.
    pub fn verify(&self, payload: &[u8], signature: &str, scheme: Scheme) -> AppResult<bool> {
        let key = match scheme {
            Scheme::Asymmetric => self.identity_verifying.as_ref(),
            Scheme::Symmetric => self.refresh.as_ref().map(|(_, dec)| dec),
        }
        .ok_or(AppError::KeyUnavailable)?;

        crypto::verify(signature, payload, key, scheme.algorithm()).map_err(|e| match e.kind() {
            ErrorKind::Base64(_) => AppError::MalformedToken("invalid signature encoding".into()),
            _ => AppError::SignatureInvalid,
        })
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("identity_signing", &self.identity_signing.is_some())
            .field("identity_verifying", &self.identity_verifying.is_some())
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}
