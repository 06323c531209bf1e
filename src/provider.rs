use async_trait::async_trait;
use url::Url;

use crate::error::Error;
use crate::http::HttpClient;
use crate::user::{NormalizedUser, RawAttributes};

/// Per-provider knowledge plugged into [`OAuth2Flow`](crate::OAuth2Flow).
///
/// A strategy holds no per-attempt state. Provider-specific settings (a
/// GitLab host, a Facebook app secret) are fixed at construction.
#[async_trait]
pub trait ProviderStrategy: Send + Sync {
    /// Human-readable provider name (e.g. "GitHub").
    fn name(&self) -> &'static str;

    /// Scopes requested on every attempt unless replaced with `set_scopes`.
    fn default_scopes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Separator used to join scopes into the `scope` parameter.
    fn scope_separator(&self) -> &'static str {
        ","
    }

    /// Whether the provider always requires PKCE.
    fn uses_pkce(&self) -> bool {
        false
    }

    /// Whether the token endpoint expects client credentials as HTTP Basic
    /// auth in addition to the form body.
    fn uses_basic_auth(&self) -> bool {
        false
    }

    /// Build the authorization URL from the ordered query fields prepared by
    /// the flow.
    fn authorization_url(&self, fields: &[(String, String)]) -> Result<Url, Error>;

    fn token_url(&self) -> &str;

    /// Fetch the provider's user payload for `access_token`. `scopes` are
    /// the scopes of the attempt, used to decide on scope-gated lookups.
    async fn fetch_raw_user(
        &self,
        http_client: &dyn HttpClient,
        access_token: &str,
        scopes: &[String],
    ) -> Result<RawAttributes, Error>;

    fn map_raw_user(&self, raw: RawAttributes) -> Result<NormalizedUser, Error>;
}

/// Append `fields` to `base` as a query string encoded per RFC 3986
/// (space becomes `%20`, not `+`).
pub fn build_authorization_url(base: &str, fields: &[(String, String)]) -> Result<Url, Error> {
    let mut url = Url::parse(base)?;

    let encoded = fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let query = [url.query().unwrap_or_default(), encoded.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("&");
    url.set_query((!query.is_empty()).then_some(query.as_str()));

    Ok(url)
}

/// Value of a required identifier, with numbers coerced to their string form.
pub(crate) fn required_id(raw: &RawAttributes, key: &'static str) -> Result<String, Error> {
    raw.get_str(key).ok_or(Error::MissingField { field: key })
}

/// Follow a dotted path (`links.avatar.href`) through nested objects and
/// arrays.
pub(crate) fn lookup<'a>(
    value: &'a serde_json::Value,
    path: &str,
) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        other => other.get(segment),
    })
}

pub(crate) fn lookup_str(value: &serde_json::Value, path: &str) -> Option<String> {
    lookup(value, path)
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}
