use async_trait::async_trait;
use url::Url;

use crate::error::Error;
use crate::http::{HttpClient, HttpRequest};
use crate::provider::{ProviderStrategy, build_authorization_url, required_id};
use crate::request::fetch_json;
use crate::user::{NormalizedUser, RawAttributes};

const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v4/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

pub struct Google {
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
}

impl Google {
    pub fn new() -> Self {
        Self::with_endpoints(AUTHORIZATION_ENDPOINT, TOKEN_ENDPOINT, USERINFO_ENDPOINT)
    }

    pub fn with_endpoints(
        authorization_endpoint: &str,
        token_endpoint: &str,
        userinfo_endpoint: &str,
    ) -> Self {
        Self {
            authorization_endpoint: authorization_endpoint.to_string(),
            token_endpoint: token_endpoint.to_string(),
            userinfo_endpoint: userinfo_endpoint.to_string(),
        }
    }
}

impl Default for Google {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderStrategy for Google {
    fn name(&self) -> &'static str {
        "Google"
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        &["openid", "profile", "email"]
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
        let request = HttpRequest::get(format!("{}?prettyPrint=false", self.userinfo_endpoint))
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {access_token}"));

        RawAttributes::try_from(fetch_json(http_client, request).await?)
    }

    fn map_raw_user(&self, raw: RawAttributes) -> Result<NormalizedUser, Error> {
        let id = required_id(&raw, "sub")?;
        let picture = raw.get_str("picture");

        Ok(NormalizedUser::new(id, raw.clone())
            .with_nickname(raw.get_str("nickname"))
            .with_name(raw.get_str("name"))
            .with_email(raw.get_str("email"))
            .with_avatar(picture.clone())
            .with_avatar_original(picture))
    }
}
