//! Opaque session tokens carrying [`SessionClaims`] between flow steps.
//!
//! The default codec produces a compact JWS-style token
//! (`base64url(header).base64url(claims).base64url(mac)`) signed with
//! HMAC-SHA256 under the service secret. Decoding fails closed: malformed
//! input, an unexpected algorithm, a bad signature or an expired token all
//! yield `None`, never a panic or a partial result.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::KycKitError;
use crate::types::SessionClaims;

type HmacSha256 = Hmac<Sha256>;

/// Tamper-evident bijection between [`SessionClaims`] and opaque strings.
///
/// Implementations must guarantee `decode(encode(claims)) == claims` for
/// every value they encode, and `decode` must return `None` (not error, not
/// panic) for anything else, including tokens signed under a different
/// secret. Swapping the codec is also how secret rotation is done.
pub trait SessionCodec: Send + Sync {
    /// Encodes claims into an opaque token.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be serialized.
    fn encode(&self, claims: &SessionClaims) -> Result<String, KycKitError>;

    /// Decodes and verifies a token. `None` on any failure.
    fn decode(&self, token: &str) -> Option<SessionClaims>;
}

const TOKEN_ALG: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Serialize, Deserialize)]
struct TokenEnvelope {
    #[serde(flatten)]
    claims: SessionClaims,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

/// Default [`SessionCodec`]: symmetric HMAC-SHA256 signing under a
/// long-lived service secret.
///
/// Without a TTL the token's useful life is bounded by the provider token
/// embedded in its claims; [`SignedSessionCodec::with_ttl`] additionally
/// stamps `iat`/`exp` and rejects stale tokens at decode time. An `exp`
/// claim is honored regardless of how the codec was constructed.
pub struct SignedSessionCodec {
    secret: SecretString,
    ttl: Option<Duration>,
}

impl SignedSessionCodec {
    /// Creates a codec signing with `secret`, without token expiry.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            ttl: None,
        }
    }

    /// Creates a codec whose tokens expire `ttl` after issuance.
    #[must_use]
    pub fn with_ttl(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            ttl: Some(ttl),
        }
    }

    fn mac(&self, signing_input: &str) -> Option<Vec<u8>> {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()).ok()?;
        mac.update(signing_input.as_bytes());
        Some(mac.finalize().into_bytes().to_vec())
    }
}

impl SessionCodec for SignedSessionCodec {
    fn encode(&self, claims: &SessionClaims) -> Result<String, KycKitError> {
        let header = TokenHeader {
            alg: TOKEN_ALG.to_string(),
            typ: "JWT".to_string(),
        };
        let issued_at = unix_now();
        let envelope = TokenEnvelope {
            claims: claims.clone(),
            iat: self.ttl.map(|_| issued_at),
            exp: self.ttl.map(|ttl| issued_at.saturating_add(ttl.as_secs())),
        };

        let header_b64 = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&header)
                .map_err(|err| KycKitError::TokenEncoding(err.to_string()))?,
        );
        let payload_b64 = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&envelope)
                .map_err(|err| KycKitError::TokenEncoding(err.to_string()))?,
        );

        let signing_input = format!("{header_b64}.{payload_b64}");
        let mac = self.mac(&signing_input).ok_or_else(|| {
            KycKitError::TokenEncoding("signing key rejected".to_string())
        })?;
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(mac)))
    }

    fn decode(&self, token: &str) -> Option<SessionClaims> {
        let mut parts = token.split('.');
        let (header_b64, payload_b64, sig_b64) =
            (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let header: TokenHeader =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64).ok()?).ok()?;
        // No algorithm negotiation: anything but the pinned alg is rejected.
        if header.alg != TOKEN_ALG {
            return None;
        }

        let signing_input = format!("{header_b64}.{payload_b64}");
        let expected = self.mac(&signing_input)?;
        let presented = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;
        if !bool::from(expected.as_slice().ct_eq(presented.as_slice())) {
            return None;
        }

        let envelope: TokenEnvelope =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload_b64).ok()?).ok()?;
        if let Some(exp) = envelope.exp {
            if exp <= unix_now() {
                return None;
            }
        }
        Some(envelope.claims)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProviderToken, RedirectForm, ResubmitInfo};

    fn sample_claims() -> SessionClaims {
        SessionClaims {
            kyc_id: "5ad862240a176722f25fede3".into(),
            provider_token: ProviderToken {
                access_token: "stoc-token".into(),
                expires_at: 1_800_000_000,
                refresh_token: "stoc-refresh".into(),
            },
            session_code: Some("1xxx".into()),
            redirect_form: RedirectForm::Login,
            resubmit_info: None,
        }
    }

    #[test]
    fn round_trip() {
        let codec = SignedSessionCodec::new("unitTest");
        let claims = sample_claims();
        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token), Some(claims));
    }

    #[test]
    fn round_trip_with_resubmit_info() {
        let codec = SignedSessionCodec::new("unitTest");
        let mut claims = sample_claims();
        claims.redirect_form = RedirectForm::Resubmit;
        claims.session_code = None;
        claims.resubmit_info = Some(ResubmitInfo {
            field_list: vec!["phone".into()],
            cert_list: vec![],
        });
        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token), Some(claims));
    }

    #[test]
    fn wrong_secret_fails() {
        let codec = SignedSessionCodec::new("unitTest");
        let token = codec.encode(&sample_claims()).unwrap();
        let other = SignedSessionCodec::new("someone-else");
        assert_eq!(other.decode(&token), None);
    }

    #[test]
    fn tampered_payload_fails() {
        let codec = SignedSessionCodec::new("unitTest");
        let token = codec.encode(&sample_claims()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let mut flipped = parts[1].to_string();
        let replacement = if flipped.starts_with('A') { "B" } else { "A" };
        flipped.replace_range(0..1, replacement);
        parts[1] = &flipped;
        assert_eq!(codec.decode(&parts.join(".")), None);
    }

    #[test]
    fn truncated_and_garbage_fail_without_panicking() {
        let codec = SignedSessionCodec::new("unitTest");
        let token = codec.encode(&sample_claims()).unwrap();
        assert_eq!(codec.decode(&token[..token.len() - 4]), None);
        assert_eq!(codec.decode("wrong"), None);
        assert_eq!(codec.decode(""), None);
        assert_eq!(codec.decode("a.b"), None);
        assert_eq!(codec.decode("a.b.c.d"), None);
        assert_eq!(codec.decode("!!!.@@@.###"), None);
    }

    #[test]
    fn foreign_algorithm_rejected() {
        let codec = SignedSessionCodec::new("unitTest");
        let token = codec.encode(&sample_claims()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        // Same payload, unsigned "none" header: must not be accepted even
        // with an empty signature segment.
        let forged = format!("{header}.{}.", parts[1]);
        assert_eq!(codec.decode(&forged), None);
    }

    #[test]
    fn expired_token_fails() {
        let codec = SignedSessionCodec::new("unitTest");
        // Hand-roll an envelope whose exp is already in the past and sign it
        // with the same key; the codec must refuse it.
        let envelope = TokenEnvelope {
            claims: sample_claims(),
            iat: Some(1),
            exp: Some(2),
        };
        let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload_b64 =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&envelope).unwrap());
        let signing_input = format!("{header_b64}.{payload_b64}");
        let mac = codec.mac(&signing_input).unwrap();
        let token = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(mac));
        assert_eq!(codec.decode(&token), None);
    }

    #[test]
    fn ttl_codec_issues_decodable_tokens() {
        let codec =
            SignedSessionCodec::with_ttl("unitTest", Duration::from_secs(3600));
        let claims = sample_claims();
        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token), Some(claims));
    }
}
