use async_trait::async_trait;
use url::Url;

use crate::error::Error;
use crate::http::{HttpClient, HttpRequest};
use crate::provider::{ProviderStrategy, build_authorization_url, required_id};
use crate::request::fetch_json;
use crate::user::{NormalizedUser, RawAttributes};

pub const DEFAULT_HOST: &str = "https://gitlab.com";

/// GitLab.com or a self-hosted instance.
pub struct GitLab {
    host: String,
    authorization_endpoint: String,
    token_endpoint: String,
}

impl GitLab {
    pub fn new() -> Self {
        Self::with_host(None)
    }

    /// An empty or absent host falls back to [`DEFAULT_HOST`]; a trailing
    /// `/` is trimmed.
    pub fn with_host(host: Option<&str>) -> Self {
        let host = host
            .map(|h| h.trim_end_matches('/'))
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOST)
            .to_string();

        Self {
            authorization_endpoint: format!("{host}/oauth/authorize"),
            token_endpoint: format!("{host}/oauth/token"),
            host,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Default for GitLab {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderStrategy for GitLab {
    fn name(&self) -> &'static str {
        "GitLab"
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        &["read_user"]
    }

    fn scope_separator(&self) -> &'static str {
        " "
    }

    fn authorization_url(&self, fields: &[(String, String)]) -> Result<Url, Error> {
        build_authorization_url(&self.authorization_endpoint, fields)
    }

    fn token_url(&self) -> &str {
        &self.token_endpoint
    }

    async fn fetch_raw_user(
        &self,
        http_client: &dyn HttpClient,
        access_token: &str,
        _scopes: &[String],
    ) -> Result<RawAttributes, Error> {
        let request = HttpRequest::get(format!(
            "{}/api/v3/user?access_token={}",
            self.host,
            urlencoding::encode(access_token)
        ))
        .header("Accept", "application/json");

        RawAttributes::try_from(fetch_json(http_client, request).await?)
    }

    fn map_raw_user(&self, raw: RawAttributes) -> Result<NormalizedUser, Error> {
        let id = required_id(&raw, "id")?;

        Ok(NormalizedUser::new(id, raw.clone())
            .with_nickname(raw.get_str("username"))
            .with_name(raw.get_str("name"))
            .with_email(raw.get_str("email"))
            .with_avatar(raw.get_str("avatar_url")))
    }
}
