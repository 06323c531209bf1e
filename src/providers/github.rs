use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::error::Error;
use crate::http::{HttpClient, HttpRequest};
use crate::provider::{ProviderStrategy, build_authorization_url, required_id};
use crate::request::fetch_json;
use crate::user::{NormalizedUser, RawAttributes};

const AUTHORIZATION_ENDPOINT: &str = "https://github.com/login/oauth/authorize";
const TOKEN_ENDPOINT: &str = "https://github.com/login/oauth/access_token";
const API_BASE: &str = "https://api.github.com";

const EMAIL_SCOPE: &str = "user:email";

pub struct GitHub {
    authorization_endpoint: String,
    token_endpoint: String,
    api_base: String,
}

impl GitHub {
    pub fn new() -> Self {
        Self::with_endpoints(AUTHORIZATION_ENDPOINT, TOKEN_ENDPOINT, API_BASE)
    }

    pub fn with_endpoints(authorization_endpoint: &str, token_endpoint: &str, api_base: &str) -> Self {
        Self {
            authorization_endpoint: authorization_endpoint.to_string(),
            token_endpoint: token_endpoint.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn api_request(&self, path: &str, token: &str) -> HttpRequest {
        HttpRequest::get(format!("{}{path}", self.api_base))
            .header("Accept", "application/vnd.github.v3+json")
            .header("Authorization", format!("token {token}"))
    }

    /// Primary verified address from `/user/emails`.
    async fn email_by_token(
        &self,
        http_client: &dyn HttpClient,
        token: &str,
    ) -> Result<Option<String>, Error> {
        let emails = fetch_json(http_client, self.api_request("/user/emails", token)).await?;

        Ok(emails.as_array().and_then(|entries| {
            entries
                .iter()
                .find(|e| is_true(e, "primary") && is_true(e, "verified"))
                .and_then(|e| e["email"].as_str())
                .map(String::from)
        }))
    }
}

impl Default for GitHub {
    fn default() -> Self {
        Self::new()
    }
}

fn is_true(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[async_trait]
impl ProviderStrategy for GitHub {
    fn name(&self) -> &'static str {
        "GitHub"
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        &[EMAIL_SCOPE]
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
        scopes: &[String],
    ) -> Result<RawAttributes, Error> {
        let user = fetch_json(http_client, self.api_request("/user", access_token)).await?;
        let mut raw = RawAttributes::try_from(user)?;

        if scopes.iter().any(|s| s == EMAIL_SCOPE) {
            let email = match self.email_by_token(http_client, access_token).await {
                Ok(email) => email,
                Err(err) => {
                    warn!(provider = "GitHub", error = %err, "email lookup failed");
                    None
                }
            };
            raw.set("email", email.map_or(Value::Null, Value::String));
        }

        Ok(raw)
    }

    fn map_raw_user(&self, raw: RawAttributes) -> Result<NormalizedUser, Error> {
        let id = required_id(&raw, "id")?;

        Ok(NormalizedUser::new(id, raw.clone())
            .with_nickname(raw.get_str("login"))
            .with_name(raw.get_str("name"))
            .with_email(raw.get_str("email"))
            .with_avatar(raw.get_str("avatar_url")))
    }
}
