use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::signature::RequestSigner;
use super::{OAuth1Server, OAuth1UserDetails, TemporaryCredentials, TokenCredentials};
use crate::error::Error;
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method};
use crate::request::{USER_AGENT, fetch_json};
use crate::user::RawAttributes;

const API_BASE: &str = "https://api.twitter.com";

/// Twitter's OAuth 1.0a endpoints.
#[derive(Debug, Clone)]
pub struct TwitterEndpoints {
    pub request_token: String,
    pub authenticate: String,
    pub access_token: String,
    pub verify_credentials: String,
}

impl TwitterEndpoints {
    /// Endpoints rooted at `base` (scheme and host, no trailing slash).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            request_token: format!("{base}/oauth/request_token"),
            authenticate: format!("{base}/oauth/authenticate"),
            access_token: format!("{base}/oauth/access_token"),
            verify_credentials: format!(
                "{base}/1.1/account/verify_credentials.json?include_email=true"
            ),
        }
    }
}

impl Default for TwitterEndpoints {
    fn default() -> Self {
        Self::with_base(API_BASE)
    }
}

pub struct TwitterServer {
    signer: RequestSigner,
    callback_uri: String,
    endpoints: TwitterEndpoints,
    http_client: Arc<dyn HttpClient>,
    /// Last profile fetched, with the credentials it was fetched for.
    cached_user: Mutex<Option<(TokenCredentials, Value)>>,
}

impl TwitterServer {
    pub fn new(
        identifier: impl Into<String>,
        secret: impl Into<String>,
        callback_uri: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            signer: RequestSigner::new(identifier, secret),
            callback_uri: callback_uri.into(),
            endpoints: TwitterEndpoints::default(),
            http_client,
            cached_user: Mutex::new(None),
        }
    }

    pub fn with_endpoints(mut self, endpoints: TwitterEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn signed_post(
        &self,
        url: &str,
        token: Option<(&str, &str)>,
        oauth_extra: &[(String, String)],
        body: &[(String, String)],
    ) -> Result<HttpRequest, Error> {
        let authorization = self
            .signer
            .authorization_header("POST", url, token, oauth_extra, body)?;
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(body)
            .finish();

        Ok(HttpRequest {
            method: Method::Post,
            url: url.to_string(),
            headers: vec![
                ("Authorization".to_string(), authorization),
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
            ],
            body: encoded.into_bytes(),
        })
    }

    /// Send a credentials request and decode its form-encoded answer.
    async fn credentials_request(&self, request: HttpRequest) -> Result<HashMap<String, String>, Error> {
        let response: HttpResponse = self.http_client.send(request).await?;

        if !response.is_success() {
            return Err(Error::UnexpectedErrorBody {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }

        Ok(url::form_urlencoded::parse(&response.body)
            .into_owned()
            .collect())
    }
}

fn required(fields: &mut HashMap<String, String>, key: &'static str) -> Result<String, Error> {
    fields.remove(key).ok_or(Error::MissingField { field: key })
}

fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

#[async_trait]
impl OAuth1Server for TwitterServer {
    fn name(&self) -> &'static str {
        "Twitter"
    }

    async fn temporary_credentials(&self) -> Result<TemporaryCredentials, Error> {
        let callback = vec![("oauth_callback".to_string(), self.callback_uri.clone())];
        let request = self.signed_post(&self.endpoints.request_token, None, &callback, &[])?;
        let mut fields = self.credentials_request(request).await?;

        if fields.get("oauth_callback_confirmed").map(String::as_str) != Some("true") {
            return Err(Error::MissingField {
                field: "oauth_callback_confirmed",
            });
        }

        Ok(TemporaryCredentials {
            identifier: required(&mut fields, "oauth_token")?,
            secret: required(&mut fields, "oauth_token_secret")?,
        })
    }

    fn authorization_url(&self, temporary: &TemporaryCredentials) -> Result<Url, Error> {
        let mut url = Url::parse(&self.endpoints.authenticate)?;
        url.query_pairs_mut()
            .append_pair("oauth_token", &temporary.identifier);
        Ok(url)
    }

    async fn token_credentials(
        &self,
        temporary: &TemporaryCredentials,
        oauth_token: &str,
        oauth_verifier: &str,
    ) -> Result<TokenCredentials, Error> {
        if temporary.identifier != oauth_token {
            return Err(Error::TemporaryIdentifierMismatch);
        }

        let body = vec![("oauth_verifier".to_string(), oauth_verifier.to_string())];
        let request = self.signed_post(
            &self.endpoints.access_token,
            Some((temporary.identifier.as_str(), temporary.secret.as_str())),
            &[],
            &body,
        )?;
        let mut fields = self.credentials_request(request).await?;

        Ok(TokenCredentials {
            identifier: required(&mut fields, "oauth_token")?,
            secret: required(&mut fields, "oauth_token_secret")?,
        })
    }

    async fn user_details(
        &self,
        token: &TokenCredentials,
        bypass_cache: bool,
    ) -> Result<OAuth1UserDetails, Error> {
        let cached = if bypass_cache {
            None
        } else {
            self.cached_user
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .filter(|(owner, _)| owner == token)
                .map(|(_, data)| data.clone())
        };

        let data = match cached {
            Some(data) => {
                debug!(provider = "Twitter", "user details served from cache");
                data
            }
            None => {
                let url = &self.endpoints.verify_credentials;
                let authorization = self.signer.authorization_header(
                    "GET",
                    url,
                    Some((token.identifier.as_str(), token.secret.as_str())),
                    &[],
                    &[],
                )?;
                let request = HttpRequest::get(url.as_str())
                    .header("Authorization", authorization)
                    .header("Accept", "application/json")
                    .header("User-Agent", USER_AGENT);

                let data = fetch_json(self.http_client.as_ref(), request).await?;
                let mut cached_user = self
                    .cached_user
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                *cached_user = Some((token.clone(), data.clone()));
                drop(cached_user);
                data
            }
        };

        Ok(OAuth1UserDetails {
            uid: text(&data, "id_str").ok_or(Error::MissingField { field: "id_str" })?,
            nickname: text(&data, "screen_name"),
            name: text(&data, "name"),
            email: text(&data, "email"),
            image_url: text(&data, "profile_image_url_https"),
            extra: RawAttributes::try_from(data)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHttpClient;
    use serde_json::json;

    fn server() -> (TwitterServer, Arc<MockHttpClient>) {
        let http = Arc::new(MockHttpClient::new());
        let server = TwitterServer::new("ck", "cs", "https://app.test/cb", http.clone());
        (server, http)
    }

    fn temporary() -> TemporaryCredentials {
        TemporaryCredentials {
            identifier: "temp".into(),
            secret: "temp-secret".into(),
        }
    }

    #[tokio::test]
    async fn temporary_credentials_require_confirmed_callback() {
        let (server, http) = server();
        http.push(
            200,
            b"oauth_token=t&oauth_token_secret=s&oauth_callback_confirmed=true".to_vec(),
        );
        http.push(200, b"oauth_token=t&oauth_token_secret=s".to_vec());

        let temp = server.temporary_credentials().await.unwrap();
        assert_eq!(temp.identifier, "t");
        assert_eq!(temp.secret, "s");

        let err = server.temporary_credentials().await.unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                field: "oauth_callback_confirmed"
            }
        ));

        let requests = http.take_requests();
        assert_eq!(requests[0].url, "https://api.twitter.com/oauth/request_token");
        let auth = requests[0].header_value("Authorization").unwrap();
        assert!(auth.starts_with("OAuth "));
        assert!(auth.contains("oauth_callback=\"https%3A%2F%2Fapp.test%2Fcb\""));
    }

    #[test]
    fn authorization_url_points_at_authenticate() {
        let (server, _) = server();
        let url = server.authorization_url(&temporary()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.twitter.com/oauth/authenticate?oauth_token=temp"
        );
    }

    #[tokio::test]
    async fn token_exchange_rejects_foreign_identifier() {
        let (server, http) = server();

        let err = server
            .token_credentials(&temporary(), "other", "verifier")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TemporaryIdentifierMismatch));
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn token_exchange_posts_verifier() {
        let (server, http) = server();
        http.push(200, b"oauth_token=perm&oauth_token_secret=perm-secret&user_id=1".to_vec());

        let token = server
            .token_credentials(&temporary(), "temp", "verifier")
            .await
            .unwrap();

        assert_eq!(token, TokenCredentials::new("perm", "perm-secret"));
        let requests = http.take_requests();
        assert_eq!(requests[0].body, b"oauth_verifier=verifier");
        assert!(
            requests[0]
                .header_value("Authorization")
                .unwrap()
                .contains("oauth_token=\"temp\"")
        );
    }

    #[tokio::test]
    async fn token_exchange_surfaces_error_body() {
        let (server, http) = server();
        http.push(401, b"Invalid request token".to_vec());

        let err = server
            .token_credentials(&temporary(), "temp", "verifier")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnexpectedErrorBody { status: 401, .. }));
    }

    #[tokio::test]
    async fn user_details_are_cached_until_bypassed() {
        let (server, http) = server();
        let profile = json!({
            "id": 6253282,
            "id_str": "6253282",
            "screen_name": "twitterapi",
            "name": "Twitter API",
            "email": "api@twitter.com",
            "profile_image_url_https": "https://pbs.twimg.com/a.png"
        });
        http.push_json(200, profile.clone());
        http.push_json(200, json!({ "id_str": "2", "screen_name": "other" }));

        let token = TokenCredentials::new("perm", "perm-secret");
        let first = server.user_details(&token, false).await.unwrap();
        let cached = server.user_details(&token, false).await.unwrap();
        assert_eq!(http.request_count(), 1);
        assert_eq!(first, cached);

        assert_eq!(first.uid, "6253282");
        assert_eq!(first.nickname.as_deref(), Some("twitterapi"));
        assert_eq!(first.image_url.as_deref(), Some("https://pbs.twimg.com/a.png"));

        let fresh = server.user_details(&token, true).await.unwrap();
        assert_eq!(fresh.uid, "2");

        let requests = http.take_requests();
        assert_eq!(
            requests[0].url,
            "https://api.twitter.com/1.1/account/verify_credentials.json?include_email=true"
        );
        assert!(
            requests[0]
                .header_value("Authorization")
                .unwrap()
                .contains("oauth_token=\"perm\"")
        );
    }

    #[tokio::test]
    async fn cached_profile_is_only_served_to_its_own_credentials() {
        let (server, http) = server();
        http.push_json(200, json!({ "id_str": "A", "screen_name": "alice" }));
        http.push(503, b"over capacity".to_vec());
        http.push_json(200, json!({ "id_str": "B", "screen_name": "bob" }));

        let alice = TokenCredentials::new("tok-a", "sec-a");
        let bob = TokenCredentials::new("tok-b", "sec-b");

        assert_eq!(server.user_details(&alice, false).await.unwrap().uid, "A");
        assert!(server.user_details(&bob, false).await.is_err());

        let retry = server.user_details(&bob, false).await.unwrap();
        assert_eq!(retry.uid, "B");
        assert_eq!(retry.nickname.as_deref(), Some("bob"));
        assert_eq!(http.request_count(), 3);
    }
}
