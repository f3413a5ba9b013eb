//! Proxy-local path layout for signed targets.

use super::{sign, Encoding, SigningKey};

/// A request path split into its signed components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPath<'a> {
    pub encoding: Encoding,
    pub digest: &'a str,
    pub encoded_url: &'a str,
}

impl<'a> SignedPath<'a> {
    /// Split `/{digest}/{url}` or `/b/{digest}/{url}`.
    ///
    /// The `/b` prefix selects base64url; anything else is treated as hex.
    pub fn parse(path: &'a str) -> Option<Self> {
        let path = path.strip_prefix('/')?;
        let (encoding, rest) = match path.strip_prefix("b/") {
            Some(rest) => (Encoding::Base64, rest),
            None => (Encoding::Hex, path),
        };

        let (digest, encoded_url) = rest.split_once('/')?;
        if digest.is_empty() || encoded_url.is_empty() || encoded_url.contains('/') {
            return None;
        }

        Some(Self {
            encoding,
            digest,
            encoded_url,
        })
    }
}

/// Build the full signed path for `url`, including the encoding selector.
pub fn encode_path(key: &SigningKey, url: &str, encoding: Encoding) -> String {
    let signed = sign(key, url.as_bytes(), encoding);
    format!(
        "{}/{}/{}",
        encoding.path_prefix(),
        signed.digest,
        signed.encoded_url
    )
}
