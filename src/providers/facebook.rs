use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::error::Error;
use crate::http::{HttpClient, HttpRequest};
use crate::provider::{ProviderStrategy, build_authorization_url, required_id};
use crate::request::fetch_json;
use crate::user::{NormalizedUser, RawAttributes};

const GRAPH_VERSION: &str = "v3.3";
const GRAPH_URL: &str = "https://graph.facebook.com";
const DIALOG_URL: &str = "https://www.facebook.com";

const USER_FIELDS: &str = "name,email,gender,verified,link";

pub struct Facebook {
    client_secret: String,
    authorization_endpoint: String,
    token_endpoint: String,
    graph_url: String,
}

impl Facebook {
    /// The client secret signs Graph API calls with `appsecret_proof`.
    pub fn new(client_secret: impl Into<String>) -> Self {
        Self::with_endpoints(
            client_secret,
            &format!("{DIALOG_URL}/{GRAPH_VERSION}/dialog/oauth"),
            &format!("{GRAPH_URL}/{GRAPH_VERSION}/oauth/access_token"),
            GRAPH_URL,
        )
    }

    pub fn with_endpoints(
        client_secret: impl Into<String>,
        authorization_endpoint: &str,
        token_endpoint: &str,
        graph_url: &str,
    ) -> Self {
        Self {
            client_secret: client_secret.into(),
            authorization_endpoint: authorization_endpoint.to_string(),
            token_endpoint: token_endpoint.to_string(),
            graph_url: graph_url.trim_end_matches('/').to_string(),
        }
    }

    /// Hex HMAC-SHA256 of the access token keyed with the app secret.
    fn appsecret_proof(&self, access_token: &str) -> Option<String> {
        if self.client_secret.is_empty() {
            return None;
        }

        let mut mac = Hmac::<Sha256>::new_from_slice(self.client_secret.as_bytes()).ok()?;
        mac.update(access_token.as_bytes());
        let digest = mac.finalize().into_bytes();

        Some(digest.iter().map(|b| format!("{b:02x}")).collect())
    }
}

#[async_trait]
impl ProviderStrategy for Facebook {
    fn name(&self) -> &'static str {
        "Facebook"
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        &["email"]
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
        let mut url = Url::parse(&format!("{}/{GRAPH_VERSION}/me", self.graph_url))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("access_token", access_token);
            if let Some(proof) = self.appsecret_proof(access_token) {
                query.append_pair("appsecret_proof", &proof);
            }
            query.append_pair("fields", USER_FIELDS);
        }

        let request = HttpRequest::get(url.as_str()).header("Accept", "application/json");
        RawAttributes::try_from(fetch_json(http_client, request).await?)
    }

    fn map_raw_user(&self, raw: RawAttributes) -> Result<NormalizedUser, Error> {
        let id = required_id(&raw, "id")?;
        let avatar_url = format!("{}/{GRAPH_VERSION}/{id}/picture", self.graph_url);

        Ok(NormalizedUser::new(id, raw.clone())
            .with_name(raw.get_str("name"))
            .with_email(raw.get_str("email"))
            .with_avatar(Some(format!("{avatar_url}?type=normal")))
            .with_avatar_original(Some(format!("{avatar_url}?width=1920"))))
    }
}
