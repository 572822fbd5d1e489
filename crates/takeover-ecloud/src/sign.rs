//! Request signing for the ecloud open API (`SignatureVersion=V2.0`).
//!
//! ```text
//! canonical    = sorted(key=value), each side escaped, joined by '&'
//! stringToSign = METHOD \n escape(path) \n hex(sha256(canonical))
//! Signature    = hex(hmac_sha1("BC_SIGNATURE&" + secret, stringToSign))
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{EcloudError, EcloudResult};

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_KEY_PREFIX: &str = "BC_SIGNATURE&";
const SIGNATURE_METHOD: &str = "HmacSHA1";
const SIGNATURE_VERSION: &str = "V2.0";

/// Per-request signing values. Regenerated for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub timestamp: String,
    pub nonce: String,
    pub access_key: String,
    pub signature: String,
}

/// Holds the credentials and signs query strings.
#[derive(Clone)]
pub struct Signer {
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Signer {
    pub fn new(access_key: &str, secret_key: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Add the signing parameters and `Signature` to `query`, using the
    /// local clock and a fresh nonce.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        query: &mut BTreeMap<String, String>,
    ) -> EcloudResult<SigningContext> {
        let timestamp = timestamp(&Local::now());
        let nonce = Uuid::new_v4().to_string();
        self.sign_with(method, path, query, &timestamp, &nonce)
    }

    /// Like [`Signer::sign`] with a caller-supplied timestamp and nonce.
    pub fn sign_with(
        &self,
        method: &str,
        path: &str,
        query: &mut BTreeMap<String, String>,
        timestamp: &str,
        nonce: &str,
    ) -> EcloudResult<SigningContext> {
        query.insert("Timestamp".to_string(), timestamp.to_string());
        query.insert("AccessKey".to_string(), self.access_key.clone());
        query.insert("SignatureNonce".to_string(), nonce.to_string());
        query.insert("SignatureMethod".to_string(), SIGNATURE_METHOD.to_string());
        query.insert("SignatureVersion".to_string(), SIGNATURE_VERSION.to_string());

        let signature = self.signature(method, path, query)?;
        query.insert("Signature".to_string(), signature.clone());

        Ok(SigningContext {
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
            access_key: self.access_key.clone(),
            signature,
        })
    }

    /// Hex HMAC-SHA1 of the string-to-sign for this request.
    pub fn signature(
        &self,
        method: &str,
        path: &str,
        query: &BTreeMap<String, String>,
    ) -> EcloudResult<String> {
        let to_sign = string_to_sign(method, path, query);
        let key = format!("{SIGNATURE_KEY_PREFIX}{}", self.secret_key);
        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| EcloudError::Config(format!("signing key: {e}")))?;
        mac.update(to_sign.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// `METHOD\n<escaped path>\n<sha256 of canonical query>`.
pub fn string_to_sign(method: &str, path: &str, query: &BTreeMap<String, String>) -> String {
    let digest = hex::encode(Sha256::digest(canonicalize(query).as_bytes()));
    format!("{method}\n{}\n{digest}", escape(path))
}

/// Sorted `key=value` pairs joined with `&`.
pub fn canonicalize(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Form-escape, then [`percent_encode`].
pub fn escape(s: &str) -> String {
    let form: String = form_urlencoded::byte_serialize(s.as_bytes()).collect();
    percent_encode(&form)
}

/// Turn a form-escaped string into the signature's escaping:
/// `+` → `%20`, `*` → `%2A`, `%7E` → `~`. Nothing else changes.
pub fn percent_encode(s: &str) -> String {
    s.replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// `Timestamp` parameter: local wall clock with a literal `Z`.
pub fn timestamp(now: &DateTime<Local>) -> String {
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
