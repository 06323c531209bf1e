use serde_json::Value;

use crate::Error;

/// A successful token-endpoint response.
///
/// The flow reads the access token, refresh token and lifetime from it.
/// Anything else the provider sent (`id_token`, `scope`, vendor fields)
/// stays reachable through [`OAuth2Tokens::data`].
#[derive(Debug, Clone, PartialEq)]
pub struct OAuth2Tokens {
    data: Value,
}

impl OAuth2Tokens {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn access_token(&self) -> Result<&str, Error> {
        self.string_field("access_token")
    }

    pub fn refresh_token(&self) -> Result<&str, Error> {
        self.string_field("refresh_token")
    }

    /// Lifetime of the access token. Accepts a JSON number or a numeric
    /// string, since some providers send the latter.
    pub fn access_token_expires_in_seconds(&self) -> Result<u64, Error> {
        let value = &self.data["expires_in"];
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or(Error::MissingField {
                field: "expires_in",
            })
    }

    fn string_field(&self, field: &'static str) -> Result<&str, Error> {
        self.data[field]
            .as_str()
            .ok_or(Error::MissingField { field })
    }
}
