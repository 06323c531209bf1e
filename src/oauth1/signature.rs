//! HMAC-SHA1 request signing (RFC 5849 section 3.4).

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

use crate::error::Error;
use crate::state::random_alphanumeric;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const NONCE_LENGTH: usize = 32;

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~`.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `METHOD&enc(base URI)&enc(normalized parameters)`.
///
/// Query parameters of `url` are folded into `parameters`; the base URI drops
/// the query, the fragment and a default port.
pub fn signature_base_string(
    method: &str,
    url: &str,
    parameters: &[(String, String)],
) -> Result<String, Error> {
    let parsed = Url::parse(url)?;

    let mut base_uri = parsed.clone();
    base_uri.set_query(None);
    base_uri.set_fragment(None);

    let mut encoded: Vec<(String, String)> = parsed
        .query_pairs()
        .into_owned()
        .chain(parameters.iter().cloned())
        .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_uri.as_str()),
        percent_encode(&normalized)
    ))
}

pub fn signing_key(consumer_secret: &str, token_secret: Option<&str>) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or_default())
    )
}

pub fn hmac_sha1_signature(base_string: &str, key: &str) -> Result<String, Error> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|err| Error::Signing(err.to_string()))?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Signs requests on behalf of one consumer (client) key pair.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    consumer_key: String,
    consumer_secret: String,
}

impl RequestSigner {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// Build the `Authorization` header value for a request.
    ///
    /// `token` is the `(identifier, secret)` pair of the temporary or token
    /// credentials, `oauth_extra` holds additional protocol parameters
    /// (`oauth_callback`, `oauth_verifier`) and `body` the form parameters
    /// that are part of the signature.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        token: Option<(&str, &str)>,
        oauth_extra: &[(String, String)],
        body: &[(String, String)],
    ) -> Result<String, Error> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        self.authorization_header_with(
            method,
            url,
            token,
            oauth_extra,
            body,
            &random_alphanumeric(NONCE_LENGTH),
            timestamp,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        token: Option<(&str, &str)>,
        oauth_extra: &[(String, String)],
        body: &[(String, String)],
        nonce: &str,
        timestamp: u64,
    ) -> Result<String, Error> {
        let mut protocol = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                SIGNATURE_METHOD.to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some((identifier, _)) = token {
            protocol.push(("oauth_token".to_string(), identifier.to_string()));
        }
        protocol.extend(oauth_extra.iter().cloned());

        let mut signed = protocol.clone();
        signed.extend(body.iter().cloned());

        let base = signature_base_string(method, url, &signed)?;
        let key = signing_key(&self.consumer_secret, token.map(|(_, secret)| secret));
        protocol.push(("oauth_signature".to_string(), hmac_sha1_signature(&base, &key)?));
        protocol.sort();

        let header = protocol
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {header}"))
    }
}
