//! Claims codec: compact JWS encoding of identity and refresh claims.
//!
//! Decoding checks, in order: structure, algorithm/type binding and signature,
//! expiry, then the claim shape. The first failure is returned and no claims
//! escape a failed decode.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::Header;
use serde::{Serialize, de::DeserializeOwned};
use time::{Duration, OffsetDateTime};

use crate::app_error::{AppError, AppResult};
use crate::application::{
    clock::Clock,
    keys::{KeyMaterial, Scheme},
};
use crate::domain::entities::token::{IdentityClaims, RefreshClaims};

/// Tolerated difference between the issuer's and the verifier's clocks.
pub const CLOCK_SKEW_LEEWAY: Duration = Duration::seconds(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Identity,
    Refresh,
}

impl TokenKind {
    pub fn scheme(self) -> Scheme {
        match self {
            TokenKind::Identity => Scheme::Asymmetric,
            TokenKind::Refresh => Scheme::Symmetric,
        }
    }

    /// Value of the `typ` header for this kind.
    pub fn media_type(self) -> &'static str {
        match self {
            TokenKind::Identity => "JWT",
            TokenKind::Refresh => "refresh+jwt",
        }
    }
}

#[derive(Clone)]
pub struct ClaimsCodec {
    keys: Arc<KeyMaterial>,
    clock: Arc<dyn Clock>,
}

impl ClaimsCodec {
    pub fn new(keys: Arc<KeyMaterial>, clock: Arc<dyn Clock>) -> Self {
        Self { keys, clock }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub fn encode_identity(&self, claims: &IdentityClaims) -> AppResult<String> {
        self.encode(TokenKind::Identity, claims)
    }

    pub fn decode_identity(&self, token: &str) -> AppResult<IdentityClaims> {
        self.decode(TokenKind::Identity, token)
    }

    pub fn encode_refresh(&self, claims: &RefreshClaims) -> AppResult<String> {
        self.encode(TokenKind::Refresh, claims)
    }

    pub fn decode_refresh(&self, token: &str) -> AppResult<RefreshClaims> {
        self.decode(TokenKind::Refresh, token)
    }

    fn encode<C: Serialize>(&self, kind: TokenKind, claims: &C) -> AppResult<String> {
        let mut header = Header::new(kind.scheme().algorithm());
        header.typ = Some(kind.media_type().to_string());

        let header = serde_json::to_vec(&header)
            .map_err(|e| AppError::Internal(format!("header serialization failed: {e}")))?;
        let payload = serde_json::to_vec(claims)
            .map_err(|e| AppError::Internal(format!("claims serialization failed: {e}")))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.keys.sign(signing_input.as_bytes(), kind.scheme())?;
        Ok(format!("{signing_input}.{signature}"))
    }

    fn decode<C: DeserializeOwned>(&self, kind: TokenKind, token: &str) -> AppResult<C> {
        let segments = split_segments(token)?;

        let header: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments.header)?)?;
        if header.alg != kind.scheme().algorithm()
            || header.typ.as_deref() != Some(kind.media_type())
        {
            tracing::warn!(
                expected_alg = ?kind.scheme().algorithm(),
                presented_alg = ?header.alg,
                presented_typ = ?header.typ,
                "Rejected token with unexpected algorithm or type"
            );
            return Err(AppError::SignatureInvalid);
        }

        if !self
            .keys
            .verify(segments.signing_input.as_bytes(), segments.signature, kind.scheme())?
        {
            return Err(AppError::SignatureInvalid);
        }

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments.payload)?)?;
        let exp = payload
            .get("exp")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| AppError::MalformedToken("missing exp claim".into()))?;
        ensure_not_expired(exp, self.clock.now())?;

        serde_json::from_value(payload)
            .map_err(|e| AppError::MalformedToken(format!("invalid claims: {e}")))
    }
}

struct Segments<'a> {
    signing_input: &'a str,
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

fn split_segments(token: &str) -> AppResult<Segments<'_>> {
    let malformed = || AppError::MalformedToken("expected three dot-separated segments".into());

    let (signing_input, signature) = token.rsplit_once('.').ok_or_else(malformed)?;
    let (header, payload) = signing_input.split_once('.').ok_or_else(malformed)?;
    if header.is_empty() || payload.is_empty() || signature.is_empty() || payload.contains('.') {
        return Err(malformed());
    }
    URL_SAFE_NO_PAD.decode(signature)?;

    Ok(Segments {
        signing_input,
        header,
        payload,
        signature,
    })
}

/// A token is live while `now < exp + CLOCK_SKEW_LEEWAY`.
fn ensure_not_expired(exp: i64, now: OffsetDateTime) -> AppResult<()> {
    if now.unix_timestamp() >= exp.saturating_add(CLOCK_SKEW_LEEWAY.whole_seconds()) {
        return Err(AppError::TokenExpired);
    }
    Ok(())
}
