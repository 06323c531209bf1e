use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::error::Error;
use crate::http::{HttpClient, HttpRequest};
use crate::provider::{ProviderStrategy, build_authorization_url, lookup, lookup_str, required_id};
use crate::request::fetch_json;
use crate::user::{NormalizedUser, RawAttributes};

const AUTHORIZATION_ENDPOINT: &str = "https://www.linkedin.com/oauth/v2/authorization";
const TOKEN_ENDPOINT: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const API_BASE: &str = "https://api.linkedin.com";

const PROFILE_PATH: &str =
    "/v2/me?projection=(id,firstName,lastName,profilePicture(displayImage~:playableStreams))";
const EMAIL_PATH: &str = "/v2/emailAddress?q=members&projection=(elements*(handle~))";

const STILL_IMAGE: &str = "com.linkedin.digitalmedia.mediaartifact.StillImage";
const AVATAR_WIDTH: u64 = 100;
const AVATAR_ORIGINAL_WIDTH: u64 = 800;

pub struct LinkedIn {
    authorization_endpoint: String,
    token_endpoint: String,
    api_base: String,
}

impl LinkedIn {
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
            .header("Authorization", format!("Bearer {token}"))
            .header("X-RestLi-Protocol-Version", "2.0.0")
    }

    /// The `handle~` object of the first element, e.g. `{"emailAddress": ...}`.
    async fn email_address(
        &self,
        http_client: &dyn HttpClient,
        token: &str,
    ) -> Result<serde_json::Map<String, Value>, Error> {
        let response = fetch_json(http_client, self.api_request(EMAIL_PATH, token)).await?;

        Ok(match lookup(&response, "elements.0.handle~") {
            Some(Value::Object(handle)) => handle.clone(),
            _ => serde_json::Map::new(),
        })
    }
}

impl Default for LinkedIn {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of the display image rendered at `width` pixels.
fn image_with_width(images: &[Value], width: u64) -> Option<String> {
    images
        .iter()
        .find(|image| {
            image["data"][STILL_IMAGE]["storageSize"]["width"].as_u64() == Some(width)
        })
        .and_then(|image| lookup_str(image, "identifiers.0.identifier"))
}

#[async_trait]
impl ProviderStrategy for LinkedIn {
    fn name(&self) -> &'static str {
        "LinkedIn"
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        &["r_liteprofile", "r_emailaddress"]
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
        let profile = fetch_json(http_client, self.api_request(PROFILE_PATH, access_token)).await?;
        let mut raw = RawAttributes::try_from(profile)?;

        match self.email_address(http_client, access_token).await {
            Ok(handle) => {
                for (key, value) in handle {
                    raw.set(key, value);
                }
            }
            Err(err) => warn!(provider = "LinkedIn", error = %err, "email lookup failed"),
        }

        Ok(raw)
    }

    fn map_raw_user(&self, raw: RawAttributes) -> Result<NormalizedUser, Error> {
        let id = required_id(&raw, "id")?;
        let payload = raw.clone().into_value();

        let locale = format!(
            "{}_{}",
            lookup_str(&payload, "firstName.preferredLocale.language").unwrap_or_default(),
            lookup_str(&payload, "firstName.preferredLocale.country").unwrap_or_default()
        );
        let first_name = payload["firstName"]["localized"][&locale].as_str();
        let last_name = payload["lastName"]["localized"][&locale].as_str();
        let name = match (first_name, last_name) {
            (None, None) => None,
            (first, last) => Some(
                format!("{} {}", first.unwrap_or_default(), last.unwrap_or_default())
                    .trim()
                    .to_string(),
            ),
        };

        let images = lookup(&payload, "profilePicture.displayImage~.elements")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(NormalizedUser::new(id, raw.clone())
            .with_name(name)
            .with_email(raw.get_str("emailAddress"))
            .with_avatar(image_with_width(images, AVATAR_WIDTH))
            .with_avatar_original(image_with_width(images, AVATAR_ORIGINAL_WIDTH)))
    }
}
