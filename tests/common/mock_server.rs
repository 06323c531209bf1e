use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// A mock provider built on `wiremock`. Simulates the token endpoint and
/// the user API endpoints with configurable behavior.
pub struct MockProviderServer {
    server: MockServer,
    token_path: String,
}

impl MockProviderServer {
    /// Start a new mock server on a random available port, with the token
    /// endpoint at `POST /token`.
    pub async fn start() -> Self {
        Self::start_with_token_path("/token").await
    }

    pub async fn start_with_token_path(token_path: &str) -> Self {
        Self {
            server: MockServer::start().await,
            token_path: token_path.to_string(),
        }
    }

    /// Base URL of the mock server (e.g. "http://127.0.0.1:PORT").
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Mount a handler that returns a successful token response (HTTP 200)
    /// with the given JSON body.
    pub async fn mock_token_success(&self, response: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(self.token_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response))
            .mount(&self.server)
            .await;
    }

    /// Mount a handler that returns an OAuth2 error response (HTTP 400)
    /// with standard error JSON.
    pub async fn mock_token_error(&self, error_code: &str, description: &str) {
        let body = serde_json::json!({
            "error": error_code,
            "error_description": description,
        });
        Mock::given(method("POST"))
            .and(path(self.token_path.as_str()))
            .respond_with(ResponseTemplate::new(400).set_body_json(&body))
            .mount(&self.server)
            .await;
    }

    /// Mount a handler that returns HTTP 200 but with an `error` field
    /// in the JSON body (GitHub-style error response).
    pub async fn mock_token_error_as_200(&self, error_code: &str, description: &str) {
        let body = serde_json::json!({
            "error": error_code,
            "error_description": description,
        });
        Mock::given(method("POST"))
            .and(path(self.token_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&self.server)
            .await;
    }

    /// Mount a handler that returns a bare status at the token endpoint.
    pub async fn mock_unexpected_status(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(self.token_path.as_str()))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Mount a `GET` handler answering `api_path` with a JSON body.
    pub async fn mock_get_json(&self, api_path: &str, response: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(api_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response))
            .mount(&self.server)
            .await;
    }

    /// Mount a `GET` handler on `api_path` that only answers requests signed
    /// with `oauth_token`. `times` caps how often it matches.
    pub async fn mock_signed_get(
        &self,
        api_path: &str,
        oauth_token: &str,
        response: ResponseTemplate,
        times: Option<u64>,
    ) {
        let mock = Mock::given(method("GET"))
            .and(path(api_path))
            .and(header_regex(
                "authorization",
                &format!("oauth_token=\"{oauth_token}\""),
            ))
            .respond_with(response);
        let mock = match times {
            Some(n) => mock.up_to_n_times(n),
            None => mock,
        };
        mock.mount(&self.server).await;
    }

    /// Mount a `POST` handler answering `api_path` with a form-encoded body,
    /// as OAuth1 credential endpoints do.
    pub async fn mock_post_form(&self, api_path: &str, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(api_path))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(body)
                    .insert_header("content-type", "application/x-www-form-urlencoded"),
            )
            .mount(&self.server)
            .await;
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .expect("request recording enabled")
    }

    /// Requests received at `api_path`.
    pub async fn requests_to(&self, api_path: &str) -> Vec<Request> {
        self.requests()
            .await
            .into_iter()
            .filter(|request| request.url.path() == api_path)
            .collect()
    }

    /// Assert that the last token request contained the expected
    /// form-urlencoded parameters in its body.
    pub async fn verify_token_request(&self, expected_params: &[(&str, &str)]) {
        let requests = self.requests_to(&self.token_path).await;
        let last = requests.last().expect("expected a token request");
        let body_str = String::from_utf8(last.body.clone()).expect("body should be UTF-8");
        let parsed: Vec<(String, String)> = url::form_urlencoded::parse(body_str.as_bytes())
            .into_owned()
            .collect();

        for (key, value) in expected_params {
            let found = parsed.iter().any(|(k, v)| k == key && v == value);
            assert!(
                found,
                "expected form param {}={} in request body, got: {}",
                key, value, body_str
            );
        }
    }

    /// Assert that the last token request carried a Basic auth header
    /// with the expected credentials.
    pub async fn verify_basic_auth(&self, client_id: &str, client_secret: &str) {
        use base64::Engine;
        let requests = self.requests_to(&self.token_path).await;
        let last = requests.last().expect("expected a token request");
        let auth_header = last
            .headers
            .get("authorization")
            .expect("expected Authorization header");
        let expected_credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", client_id, client_secret));
        let expected = format!("Basic {}", expected_credentials);
        assert_eq!(
            auth_header.to_str().unwrap(),
            expected,
            "Basic auth credentials mismatch"
        );
    }
}
