//! Provider and driver configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Built-in driver names looked up by [`SocialiteConfig::from_env`].
pub const ENV_DRIVERS: &[&str] = &[
    "github",
    "facebook",
    "google",
    "linkedin",
    "bitbucket",
    "gitlab",
    "twitter",
];

const HOST_KEY: &str = "host";

/// Configuration of one OAuth2 flow. Fixed once the flow is built.
///
/// `scopes` are requested in addition to the provider's defaults.
/// `scope_separator` overrides the provider's separator when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub scope_separator: Option<String>,
    #[serde(default)]
    pub use_pkce: bool,
    #[serde(default)]
    pub provider_specific: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            ..Self::default()
        }
    }

    /// Add scopes, skipping ones already present.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for scope in scopes {
            let scope = scope.into();
            if !self.scopes.contains(&scope) {
                self.scopes.push(scope);
            }
        }
        self
    }

    pub fn with_scope_separator(mut self, separator: impl Into<String>) -> Self {
        self.scope_separator = Some(separator.into());
        self
    }

    pub fn with_pkce(mut self, enabled: bool) -> Self {
        self.use_pkce = enabled;
        self
    }

    pub fn with_provider_specific(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.provider_specific.insert(key.into(), value.into());
        self
    }

    pub fn provider_specific(&self, key: &str) -> Option<&str> {
        self.provider_specific.get(key).map(String::as_str)
    }

    /// Self-hosted instance base URL (GitLab).
    pub fn host(&self) -> Option<&str> {
        self.provider_specific(HOST_KEY)
    }
}

/// Options handed to the HTTP client built for a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpOptions {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl HttpOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// External per-driver configuration, as loaded from a config file or the
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default, alias = "redirect_url")]
    pub redirect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub pkce: bool,
    #[serde(default)]
    pub http: HttpOptions,
}

impl DriverConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect: redirect.into(),
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Read `SOCIAL_<NAME>_CLIENT_ID`, `_CLIENT_SECRET`, `_REDIRECT_URL` and
    /// `_HOST`. Returns `None` unless the client id is set.
    pub fn from_env(name: &str) -> Option<Self> {
        Self::from_lookup(name, |key| std::env::var(key).ok())
    }

    /// Like [`DriverConfig::from_env`] with a custom variable source.
    pub fn from_lookup(name: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let prefix = format!("SOCIAL_{}", name.to_ascii_uppercase());
        let var = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));

        let client_id = var("CLIENT_ID").filter(|id| !id.is_empty())?;

        Some(Self {
            client_id,
            client_secret: var("CLIENT_SECRET").unwrap_or_default(),
            redirect: var("REDIRECT_URL").unwrap_or_default(),
            host: var("HOST").filter(|h| !h.is_empty()),
            ..Self::default()
        })
    }

    pub fn to_provider_config(&self) -> ProviderConfig {
        let config = ProviderConfig::new(&self.client_id, &self.client_secret, &self.redirect)
            .with_scopes(self.scopes.iter().cloned())
            .with_pkce(self.pkce);

        match &self.host {
            Some(host) => config.with_provider_specific(HOST_KEY, host),
            None => config,
        }
    }
}

/// Configuration of a whole registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialiteConfig {
    #[serde(default)]
    pub default_driver: Option<String>,
    #[serde(default)]
    pub drivers: BTreeMap<String, DriverConfig>,
}

impl SocialiteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_driver(mut self, name: impl Into<String>, config: DriverConfig) -> Self {
        self.drivers.insert(name.into(), config);
        self
    }

    pub fn with_default_driver(mut self, name: impl Into<String>) -> Self {
        self.default_driver = Some(name.into());
        self
    }

    pub fn driver(&self, name: &str) -> Option<&DriverConfig> {
        self.drivers.get(name)
    }

    /// Collect every built-in driver configured through the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let drivers = ENV_DRIVERS
            .iter()
            .filter_map(|name| {
                DriverConfig::from_lookup(name, &lookup).map(|config| (name.to_string(), config))
            })
            .collect();

        Self {
            default_driver: None,
            drivers,
        }
    }
}
