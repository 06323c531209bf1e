use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::error::Error;
use crate::http::{HttpClient, HttpRequest};
use crate::provider::{ProviderStrategy, build_authorization_url, lookup_str, required_id};
use crate::request::fetch_json;
use crate::user::{NormalizedUser, RawAttributes};

const AUTHORIZATION_ENDPOINT: &str = "https://bitbucket.org/site/oauth2/authorize";
const TOKEN_ENDPOINT: &str = "https://bitbucket.org/site/oauth2/access_token";
const API_BASE: &str = "https://api.bitbucket.org";

const EMAIL_SCOPE: &str = "email";

pub struct Bitbucket {
    authorization_endpoint: String,
    token_endpoint: String,
    api_base: String,
}

impl Bitbucket {
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
        HttpRequest::get(format!(
            "{}{path}?access_token={}",
            self.api_base,
            urlencoding::encode(token)
        ))
        .header("Accept", "application/json")
    }

    async fn email_by_token(
        &self,
        http_client: &dyn HttpClient,
        token: &str,
    ) -> Result<Option<String>, Error> {
        let emails = fetch_json(http_client, self.api_request("/2.0/user/emails", token)).await?;

        Ok(emails["values"].as_array().and_then(|values| {
            values
                .iter()
                .find(|e| {
                    e["type"].as_str() == Some("email")
                        && e["is_primary"].as_bool() == Some(true)
                        && e["is_confirmed"].as_bool() == Some(true)
                })
                .and_then(|e| e["email"].as_str())
                .map(String::from)
        }))
    }
}

impl Default for Bitbucket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderStrategy for Bitbucket {
    fn name(&self) -> &'static str {
        "Bitbucket"
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        &[EMAIL_SCOPE]
    }

    fn scope_separator(&self) -> &'static str {
        " "
    }

    fn uses_basic_auth(&self) -> bool {
        true
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
        let user = fetch_json(http_client, self.api_request("/2.0/user", access_token)).await?;
        let mut raw = RawAttributes::try_from(user)?;

        if scopes.iter().any(|s| s == EMAIL_SCOPE) {
            let email = match self.email_by_token(http_client, access_token).await {
                Ok(email) => email,
                Err(err) => {
                    warn!(provider = "Bitbucket", error = %err, "email lookup failed");
                    None
                }
            };
            raw.set("email", email.map_or(Value::Null, Value::String));
        }

        Ok(raw)
    }

    fn map_raw_user(&self, raw: RawAttributes) -> Result<NormalizedUser, Error> {
        let id = required_id(&raw, "uuid")?;
        let payload = Value::Object(raw.as_map().clone());

        Ok(NormalizedUser::new(id, raw.clone())
            .with_nickname(raw.get_str("username"))
            .with_name(raw.get_str("display_name"))
            .with_email(raw.get_str("email"))
            .with_avatar(lookup_str(&payload, "links.avatar.href")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHttpClient;
    use serde_json::json;

    #[test]
    fn maps_nested_avatar_and_uuid() {
        let raw = RawAttributes::try_from(json!({
            "uuid": "{a1b2}",
            "username": "bob",
            "display_name": "Bob B",
            "links": { "avatar": { "href": "https://bitbucket.org/avatar.png" } }
        }))
        .unwrap();

        let user = Bitbucket::new().map_raw_user(raw).unwrap();

        assert_eq!(user.id(), "{a1b2}");
        assert_eq!(user.nickname(), "bob");
        assert_eq!(user.name(), "Bob B");
        assert_eq!(user.avatar(), "https://bitbucket.org/avatar.png");
        assert_eq!(user.email(), "");
    }

    #[tokio::test]
    async fn picks_primary_confirmed_email() {
        let client = MockHttpClient::new();
        client.push_json(200, json!({ "uuid": "{u}", "username": "bob" }));
        client.push_json(
            200,
            json!({
                "values": [
                    { "type": "email", "email": "x@b.com", "is_primary": false, "is_confirmed": true },
                    { "type": "email", "email": "bob@b.com", "is_primary": true, "is_confirmed": true }
                ]
            }),
        );

        let raw = Bitbucket::new()
            .fetch_raw_user(&client, "tok", &["email".to_string()])
            .await
            .unwrap();

        assert_eq!(raw.get("email"), Some(&json!("bob@b.com")));

        let requests = client.take_requests();
        assert_eq!(
            requests[0].url,
            "https://api.bitbucket.org/2.0/user?access_token=tok"
        );
        assert_eq!(
            requests[1].url,
            "https://api.bitbucket.org/2.0/user/emails?access_token=tok"
        );
    }

    #[tokio::test]
    async fn transport_failure_on_email_lookup_is_swallowed() {
        let client = MockHttpClient::new();
        client.push_json(200, json!({ "uuid": "{u}", "username": "bob" }));
        client.push_error("connection reset");

        let raw = Bitbucket::new()
            .fetch_raw_user(&client, "tok", &["email".to_string()])
            .await
            .unwrap();

        assert_eq!(raw.get("email"), Some(&Value::Null));
    }
}
