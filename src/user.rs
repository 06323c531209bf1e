use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The provider's user payload, kept in the order the provider sent it.
///
/// Independent of the typed fields on [`NormalizedUser`]: mutating it never
/// changes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAttributes(Map<String, Value>);

impl RawAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, with numbers rendered as text.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for RawAttributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for RawAttributes {
    type Error = crate::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(crate::Error::MissingField { field: "user" }),
        }
    }
}

/// Credentials that produced a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum Credentials {
    OAuth2 {
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
    },
    OAuth1 {
        token: String,
        token_secret: String,
    },
}

/// A provider-agnostic user record.
///
/// Typed accessors return `""` for absent optional fields. The provider
/// payload stays reachable through [`NormalizedUser::raw`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedUser {
    id: String,
    nickname: Option<String>,
    name: Option<String>,
    email: Option<String>,
    avatar: Option<String>,
    avatar_original: Option<String>,
    raw: RawAttributes,
    credentials: Option<Credentials>,
}

impl NormalizedUser {
    pub fn new(id: impl Into<String>, raw: RawAttributes) -> Self {
        Self {
            id: id.into(),
            nickname: None,
            name: None,
            email: None,
            avatar: None,
            avatar_original: None,
            raw,
            credentials: None,
        }
    }

    pub fn with_nickname(mut self, nickname: Option<String>) -> Self {
        self.nickname = nickname;
        self
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn with_avatar(mut self, avatar: Option<String>) -> Self {
        self.avatar = avatar;
        self
    }

    pub fn with_avatar_original(mut self, avatar_original: Option<String>) -> Self {
        self.avatar_original = avatar_original;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn nickname(&self) -> &str {
        self.nickname.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }

    pub fn avatar(&self) -> &str {
        self.avatar.as_deref().unwrap_or_default()
    }

    pub fn avatar_original(&self) -> &str {
        self.avatar_original.as_deref().unwrap_or_default()
    }

    pub fn raw(&self) -> &RawAttributes {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut RawAttributes {
        &mut self.raw
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// The access token (OAuth2) or token (OAuth1); `""` before credentials
    /// are attached.
    pub fn token(&self) -> &str {
        match &self.credentials {
            Some(Credentials::OAuth2 { access_token, .. }) => access_token,
            Some(Credentials::OAuth1 { token, .. }) => token,
            None => "",
        }
    }

    pub fn refresh_token(&self) -> &str {
        match &self.credentials {
            Some(Credentials::OAuth2 {
                refresh_token: Some(refresh),
                ..
            }) => refresh,
            _ => "",
        }
    }

    pub fn expires_in(&self) -> Option<u64> {
        match &self.credentials {
            Some(Credentials::OAuth2 { expires_in, .. }) => *expires_in,
            _ => None,
        }
    }

    pub fn token_secret(&self) -> &str {
        match &self.credentials {
            Some(Credentials::OAuth1 { token_secret, .. }) => token_secret,
            _ => "",
        }
    }
}
