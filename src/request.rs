use base64::Engine;
use serde_json::Value;

use crate::Error;
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method};
use crate::tokens::OAuth2Tokens;

pub(crate) const USER_AGENT: &str = "socialite-oauth";

/// Build a form-encoded OAuth2 POST request.
/// Sets Content-Type, Accept: application/json, User-Agent: socialite-oauth.
pub fn create_oauth2_request(endpoint: &str, body: &[(String, String)]) -> HttpRequest {
    let encoded_body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(body)
        .finish();

    HttpRequest {
        method: Method::Post,
        url: endpoint.to_string(),
        headers: vec![
            (
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ),
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ],
        body: encoded_body.into_bytes(),
    }
}

/// Encode client credentials as HTTP Basic auth header value.
/// Returns `Basic <base64(client_id:client_secret)>`.
pub fn encode_basic_credentials(client_id: &str, client_secret: &str) -> String {
    let credentials = format!("{client_id}:{client_secret}");
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
    format!("Basic {encoded}")
}

/// Send a token request and interpret the response.
/// - 200 -> Ok(OAuth2Tokens), unless the body carries an `error` string
/// - 400/401 with valid error JSON -> Err(Error::OAuthRequest { .. })
/// - 400/401 with invalid body -> Err(Error::UnexpectedErrorBody { .. })
/// - Other status -> Err(Error::UnexpectedResponse { .. })
pub async fn send_token_request(
    client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<OAuth2Tokens, Error> {
    let response: HttpResponse = client.send(request).await?;

    match response.status {
        200 => {
            let json: Value =
                serde_json::from_slice(&response.body).map_err(|_| Error::UnexpectedErrorBody {
                    status: 200,
                    body: String::from_utf8_lossy(&response.body).into_owned(),
                })?;

            // Some providers (GitHub) report grant errors with a 200 status.
            if let Some(err) = oauth_error(&json) {
                return Err(err);
            }

            Ok(OAuth2Tokens::new(json))
        }
        400 | 401 => {
            let body_str = String::from_utf8_lossy(&response.body).into_owned();
            match serde_json::from_str::<Value>(&body_str)
                .ok()
                .and_then(|json| oauth_error(&json))
            {
                Some(err) => Err(err),
                None => Err(Error::UnexpectedErrorBody {
                    status: response.status,
                    body: body_str,
                }),
            }
        }
        status => Err(Error::UnexpectedResponse { status }),
    }
}

fn oauth_error(json: &Value) -> Option<Error> {
    let code = json.get("error").and_then(Value::as_str)?;
    let text = |key: &str| json.get(key).and_then(Value::as_str).map(String::from);

    Some(Error::OAuthRequest {
        code: code.to_string(),
        description: text("error_description"),
        uri: text("error_uri"),
        state: text("state"),
    })
}

/// Send a request to a JSON API endpoint and parse the body.
/// - 2xx with JSON -> Ok(Value)
/// - 2xx with invalid body -> Err(Error::UnexpectedErrorBody { .. })
/// - Other status -> Err(Error::UnexpectedResponse { .. })
pub async fn fetch_json(client: &dyn HttpClient, request: HttpRequest) -> Result<Value, Error> {
    let response = client.send(request).await?;

    if !response.is_success() {
        return Err(Error::UnexpectedResponse {
            status: response.status,
        });
    }

    serde_json::from_slice(&response.body).map_err(|_| Error::UnexpectedErrorBody {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}
