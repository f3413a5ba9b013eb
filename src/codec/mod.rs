//! Signed URL codec.
//!
//! # Data Flow
//! ```text
//! sign:   url bytes → HMAC-SHA1(key) → encode(digest), encode(url)
//!                                    → "/{digest}/{url}"      (hex)
//!                                    → "/b/{digest}/{url}"    (base64url)
//!
//! verify: path segments → decode(digest), decode(url)
//!                       → HMAC-SHA1(key, url) == digest (constant time)
//!                       → trusted url bytes
//! ```
//!
//! # Design Decisions
//! - Both encodings share one sign/verify path; only the text codec differs
//! - Digests are always compared as raw bytes, never as encoded strings
//! - Every failure is reported through `CodecError`, but callers collapse
//!   them into a single unauthenticated outcome

pub mod path;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

pub use path::{encode_path, SignedPath};

type HmacSha1 = Hmac<Sha1>;

/// Why a signed path failed to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("digest is not valid {0}")]
    DigestEncoding(Encoding),
    #[error("url is not valid {0}")]
    UrlEncoding(Encoding),
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Text encoding used for both path components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Lowercase hex on output, either case accepted on input.
    Hex,
    /// URL-safe base64 with `=` padding stripped on output.
    Base64,
}

impl Encoding {
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Hex => hex::encode(bytes),
            Encoding::Base64 => URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    /// Decode one path component. Padding is optional for base64.
    pub fn decode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Encoding::Hex => hex::decode(text).ok(),
            Encoding::Base64 => URL_SAFE_NO_PAD.decode(text.trim_end_matches('=')).ok(),
        }
    }

    /// Route prefix that selects this encoding.
    pub fn path_prefix(self) -> &'static str {
        match self {
            Encoding::Hex => "",
            Encoding::Base64 => "/b",
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Hex => write!(f, "hex"),
            Encoding::Base64 => write!(f, "base64url"),
        }
    }
}

/// Process-wide HMAC key. Its contents never appear in `Debug` output.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    fn mac(&self) -> HmacSha1 {
        HmacSha1::new_from_slice(&self.0).expect("HMAC can take key of any size")
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// The two path-safe components of a signed target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub digest: String,
    pub encoded_url: String,
}

/// Raw HMAC-SHA1 digest of `url` under `key`.
pub fn digest(key: &SigningKey, url: &[u8]) -> Vec<u8> {
    let mut mac = key.mac();
    mac.update(url);
    mac.finalize().into_bytes().to_vec()
}

/// Sign `url` and encode both the digest and the url.
pub fn sign(key: &SigningKey, url: &[u8], encoding: Encoding) -> SignedUrl {
    SignedUrl {
        digest: encoding.encode(&digest(key, url)),
        encoded_url: encoding.encode(url),
    }
}

/// Decode both components and check the signature.
///
/// Returns the plaintext url bytes only when the digest matches.
pub fn verify(
    key: &SigningKey,
    encoding: Encoding,
    encoded_digest: &str,
    encoded_url: &str,
) -> Result<Vec<u8>, CodecError> {
    let url = encoding
        .decode(encoded_url)
        .ok_or(CodecError::UrlEncoding(encoding))?;
    let provided = encoding
        .decode(encoded_digest)
        .ok_or(CodecError::DigestEncoding(encoding))?;

    let expected = digest(key, &url);
    if !constant_time_equal(&expected, &provided) {
        return Err(CodecError::SignatureMismatch);
    }
    Ok(url)
}

fn constant_time_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    bool::from(a.ct_eq(b))
}
