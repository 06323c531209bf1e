//! Name-based driver resolution.
//!
//! Drivers are built on first use from an explicit map of builder closures
//! and cached by name for the lifetime of the registry. Cached flows are
//! shared between requests: per-attempt state lives in
//! [`AuthorizationAttempt`](crate::AuthorizationAttempt) and the session, and
//! the OAuth1 user cache only answers the credentials it was filled for.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::config::{DriverConfig, ProviderConfig, SocialiteConfig};
use crate::error::Error;
use crate::http::HttpClient;
use crate::oauth1::OAuth1Flow;
use crate::oauth1::twitter::TwitterServer;
use crate::oauth2::OAuth2Flow;
use crate::provider::ProviderStrategy;
use crate::providers::bitbucket::Bitbucket;
use crate::providers::facebook::Facebook;
use crate::providers::github::GitHub;
use crate::providers::gitlab::GitLab;
use crate::providers::google::Google;
use crate::providers::linkedin::LinkedIn;

const TWITTER: &str = "twitter";

/// A resolved driver: an OAuth2 or an OAuth1 flow.
#[derive(Debug, Clone)]
pub enum Driver {
    OAuth2(Arc<OAuth2Flow>),
    OAuth1(Arc<OAuth1Flow>),
}

impl Driver {
    pub fn name(&self) -> &'static str {
        match self {
            Driver::OAuth2(flow) => flow.name(),
            Driver::OAuth1(flow) => flow.name(),
        }
    }

    pub fn protocol(&self) -> &'static str {
        match self {
            Driver::OAuth2(_) => "OAuth2",
            Driver::OAuth1(_) => "OAuth1",
        }
    }

    pub fn as_oauth2(&self) -> Option<&Arc<OAuth2Flow>> {
        match self {
            Driver::OAuth2(flow) => Some(flow),
            Driver::OAuth1(_) => None,
        }
    }

    pub fn as_oauth1(&self) -> Option<&Arc<OAuth1Flow>> {
        match self {
            Driver::OAuth1(flow) => Some(flow),
            Driver::OAuth2(_) => None,
        }
    }

    /// Whether both handles point at the same flow instance.
    pub fn ptr_eq(&self, other: &Driver) -> bool {
        match (self, other) {
            (Driver::OAuth2(a), Driver::OAuth2(b)) => Arc::ptr_eq(a, b),
            (Driver::OAuth1(a), Driver::OAuth1(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<OAuth2Flow> for Driver {
    fn from(flow: OAuth2Flow) -> Self {
        Driver::OAuth2(Arc::new(flow))
    }
}

impl From<OAuth1Flow> for Driver {
    fn from(flow: OAuth1Flow) -> Self {
        Driver::OAuth1(Arc::new(flow))
    }
}

/// Built-in OAuth2 providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    GitHub,
    Facebook,
    Google,
    LinkedIn,
    Bitbucket,
    GitLab,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::GitHub,
        ProviderKind::Facebook,
        ProviderKind::Google,
        ProviderKind::LinkedIn,
        ProviderKind::Bitbucket,
        ProviderKind::GitLab,
    ];

    /// Canonical lower-case driver name to kind.
    pub fn from_driver_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.driver_name() == name)
    }

    pub fn driver_name(self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::Facebook => "facebook",
            ProviderKind::Google => "google",
            ProviderKind::LinkedIn => "linkedin",
            ProviderKind::Bitbucket => "bitbucket",
            ProviderKind::GitLab => "gitlab",
        }
    }

    /// The strategy for this provider, with provider-specific settings taken
    /// from `config`.
    pub fn strategy(self, config: &ProviderConfig) -> Box<dyn ProviderStrategy> {
        match self {
            ProviderKind::GitHub => Box::new(GitHub::new()),
            ProviderKind::Facebook => Box::new(Facebook::new(config.client_secret.clone())),
            ProviderKind::Google => Box::new(Google::new()),
            ProviderKind::LinkedIn => Box::new(LinkedIn::new()),
            ProviderKind::Bitbucket => Box::new(Bitbucket::new()),
            ProviderKind::GitLab => Box::new(GitLab::with_host(config.host())),
        }
    }
}

/// What a builder gets to construct a driver.
pub struct DriverContext<'a> {
    pub name: &'a str,
    pub config: Option<&'a DriverConfig>,
    pub http_client: Arc<dyn HttpClient>,
}

impl DriverContext<'_> {
    /// The driver's configuration, or `MissingDriverConfig`.
    pub fn require_config(&self) -> Result<&DriverConfig, Error> {
        self.config
            .ok_or_else(|| Error::MissingDriverConfig(self.name.to_string()))
    }
}

pub type DriverBuilder = Arc<dyn Fn(&DriverContext<'_>) -> Result<Driver, Error> + Send + Sync>;

pub struct DriverRegistry {
    config: SocialiteConfig,
    http_client: Arc<dyn HttpClient>,
    builders: HashMap<String, DriverBuilder>,
    drivers: Mutex<HashMap<String, Driver>>,
    #[cfg(feature = "reqwest-client")]
    default_client: bool,
}

impl DriverRegistry {
    /// A registry with every built-in driver, sharing `http_client`.
    pub fn new(config: SocialiteConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let mut builders: HashMap<String, DriverBuilder> = HashMap::new();

        for kind in ProviderKind::ALL {
            builders.insert(kind.driver_name().to_string(), oauth2_builder(kind));
        }
        builders.insert(TWITTER.to_string(), Arc::new(build_twitter));

        Self {
            config,
            http_client,
            builders,
            drivers: Mutex::new(HashMap::new()),
            #[cfg(feature = "reqwest-client")]
            default_client: false,
        }
    }

    /// A registry backed by [`ReqwestClient`](crate::ReqwestClient). Drivers
    /// with `http.timeout_secs` get their own client with that timeout.
    #[cfg(feature = "reqwest-client")]
    pub fn with_default_client(config: SocialiteConfig) -> Self {
        let mut registry = Self::new(config, Arc::new(crate::http::ReqwestClient::new()));
        registry.default_client = true;
        registry
    }

    pub fn config(&self) -> &SocialiteConfig {
        &self.config
    }

    /// Register or replace the builder for `name`. A driver already built
    /// under that name is dropped so the next lookup uses the new builder.
    pub fn extend<F>(&mut self, name: impl Into<String>, builder: F) -> &mut Self
    where
        F: Fn(&DriverContext<'_>) -> Result<Driver, Error> + Send + Sync + 'static,
    {
        let name = name.into();
        self.drivers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name);
        self.builders.insert(name, Arc::new(builder));
        self
    }

    /// Resolve `name`, or the configured default driver when `None`.
    pub fn driver(&self, name: Option<&str>) -> Result<Driver, Error> {
        let name = name
            .or(self.config.default_driver.as_deref())
            .filter(|name| !name.is_empty())
            .ok_or(Error::NoDriverSpecified)?;

        let mut drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(driver) = drivers.get(name) {
            return Ok(driver.clone());
        }

        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| Error::UnsupportedDriver(name.to_string()))?;

        let config = self.config.driver(name);
        let context = DriverContext {
            name,
            config,
            http_client: self.http_client_for(config)?,
        };
        let driver = builder(&context)?;

        debug!(driver = name, protocol = driver.protocol(), "driver created");
        drivers.insert(name.to_string(), driver.clone());
        Ok(driver)
    }

    /// Resolve an OAuth2 driver.
    pub fn oauth2(&self, name: &str) -> Result<Arc<OAuth2Flow>, Error> {
        match self.driver(Some(name))? {
            Driver::OAuth2(flow) => Ok(flow),
            Driver::OAuth1(_) => Err(Error::ProtocolMismatch {
                driver: name.to_string(),
                expected: "OAuth2",
            }),
        }
    }

    /// Resolve an OAuth1 driver.
    pub fn oauth1(&self, name: &str) -> Result<Arc<OAuth1Flow>, Error> {
        match self.driver(Some(name))? {
            Driver::OAuth1(flow) => Ok(flow),
            Driver::OAuth2(_) => Err(Error::ProtocolMismatch {
                driver: name.to_string(),
                expected: "OAuth1",
            }),
        }
    }

    /// Build a flow from an explicit configuration. Not cached.
    pub fn build_provider(&self, kind: ProviderKind, config: ProviderConfig) -> OAuth2Flow {
        let strategy = kind.strategy(&config);
        OAuth2Flow::from_boxed(config, strategy, self.http_client.clone())
    }

    /// Names of the drivers built so far, sorted.
    pub fn drivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .drivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    #[cfg(feature = "reqwest-client")]
    fn http_client_for(&self, config: Option<&DriverConfig>) -> Result<Arc<dyn HttpClient>, Error> {
        match config.and_then(|c| c.http.timeout()) {
            Some(timeout) if self.default_client => Ok(Arc::new(
                crate::http::ReqwestClient::with_timeout(timeout)?,
            )),
            _ => Ok(self.http_client.clone()),
        }
    }

    #[cfg(not(feature = "reqwest-client"))]
    fn http_client_for(&self, _config: Option<&DriverConfig>) -> Result<Arc<dyn HttpClient>, Error> {
        Ok(self.http_client.clone())
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        registered.sort_unstable();

        f.debug_struct("DriverRegistry")
            .field("registered", &registered)
            .field("built", &self.drivers())
            .finish_non_exhaustive()
    }
}

fn oauth2_builder(kind: ProviderKind) -> DriverBuilder {
    Arc::new(move |context: &DriverContext<'_>| {
        let config = context.require_config()?.to_provider_config();
        let strategy = kind.strategy(&config);
        Ok(OAuth2Flow::from_boxed(config, strategy, context.http_client.clone()).into())
    })
}

fn build_twitter(context: &DriverContext<'_>) -> Result<Driver, Error> {
    let config = context.require_config()?;
    let server = TwitterServer::new(
        &config.client_id,
        &config.client_secret,
        &config.redirect,
        context.http_client.clone(),
    );
    Ok(OAuth1Flow::new(server).into())
}
