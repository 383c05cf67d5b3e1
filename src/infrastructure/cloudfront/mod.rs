//! CloudFront canned-policy URL signing.
//!
//! Produces `https://{domain}/{key}?Expires=..&Signature=..&Key-Pair-Id=..`
//! URLs. The policy document is serialized in CloudFront's exact field order,
//! signed with SHA1/RSA PKCS#1 v1.5, and base64-encoded with CloudFront's
//! URL-safe substitutions (`+` to `-`, `=` to `_`, `/` to `~`).

use crate::domain::audio::error::SigningError;
use crate::domain::audio::signing::UrlSigner;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::time::Duration;

// Field order matters: CloudFront validates the signature against the exact
// policy bytes, so these structs must serialize in declaration order.
#[derive(Serialize)]
struct CannedPolicy<'a> {
    #[serde(rename = "Statement")]
    statement: [Statement<'a>; 1],
}

#[derive(Serialize)]
struct Statement<'a> {
    #[serde(rename = "Resource")]
    resource: &'a str,

    #[serde(rename = "Condition")]
    condition: Condition,
}

#[derive(Serialize)]
struct Condition {
    #[serde(rename = "DateLessThan")]
    date_less_than: DateLessThan,
}

#[derive(Serialize)]
struct DateLessThan {
    #[serde(rename = "AWS:EpochTime")]
    epoch_time: i64,
}

#[derive(Debug)]
pub struct CloudFrontSigner {
    domain: String,
    key_pair_id: String,
    private_key: RsaPrivateKey,
}

impl CloudFrontSigner {
    /// Build a signer from configuration. `private_key_pem` accepts both
    /// PKCS#8 and PKCS#1 PEM, with literal `\n` sequences from env files
    /// normalized to newlines.
    pub fn from_config(
        domain: &str,
        key_pair_id: &str,
        private_key_pem: &str,
    ) -> Result<Self, SigningError> {
        if domain.is_empty() || key_pair_id.is_empty() || private_key_pem.is_empty() {
            return Err(SigningError::MissingConfig);
        }
        let pem = private_key_pem.replace("\\n", "\n");
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
            .map_err(|_| SigningError::InvalidKey)?;
        Ok(Self {
            domain: domain.trim_end_matches('/').to_string(),
            key_pair_id: key_pair_id.to_string(),
            private_key,
        })
    }

    fn sign_url(&self, key: &str, ttl: Duration) -> Result<String, SigningError> {
        let resource = format!("https://{}/{}", self.domain, key);
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;

        let policy = CannedPolicy {
            statement: [Statement {
                resource: &resource,
                condition: Condition {
                    date_less_than: DateLessThan {
                        epoch_time: expires,
                    },
                },
            }],
        };
        let policy_json =
            serde_json::to_string(&policy).map_err(|_| SigningError::Signing)?;

        let digest = Sha1::digest(policy_json.as_bytes());
        let signature = self
            .private_key
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(|_| SigningError::Signing)?;

        Ok(format!(
            "{resource}?Expires={expires}&Signature={}&Key-Pair-Id={}",
            safe_base64(&signature),
            self.key_pair_id
        ))
    }
}

/// CloudFront's URL-safe base64 alphabet.
fn safe_base64(bytes: &[u8]) -> String {
    STANDARD
        .encode(bytes)
        .replace('+', "-")
        .replace('=', "_")
        .replace('/', "~")
}

#[async_trait::async_trait]
impl UrlSigner for CloudFrontSigner {
    fn name(&self) -> &'static str {
        "cloudfront"
    }

    async fn sign(&self, key: &str, ttl: Duration) -> Result<String, SigningError> {
        self.sign_url(key, ttl)
    }
}
