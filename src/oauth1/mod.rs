//! Three-legged OAuth1 flow.
//!
//! The protocol exchange itself (temporary credentials, token credentials,
//! signed API calls) is delegated to an [`OAuth1Server`]. [`OAuth1Flow`]
//! validates the callback, keeps the temporary credentials in the session
//! and decides when the server's user cache must be bypassed.

pub mod signature;
pub mod twitter;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::debug;
use url::Url;

use crate::callback::CallbackParams;
use crate::error::Error;
use crate::session::SessionStore;
use crate::user::{Credentials, NormalizedUser, RawAttributes};

/// Session key holding the temporary credentials between redirect and
/// callback.
pub const TEMPORARY_CREDENTIALS_KEY: &str = "oauth.temp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryCredentials {
    pub identifier: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCredentials {
    pub identifier: String,
    pub secret: String,
}

impl TokenCredentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

/// User details as reported by an OAuth1 server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuth1UserDetails {
    pub uid: String,
    pub nickname: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub extra: RawAttributes,
}

/// The protocol side of an OAuth1 provider.
#[async_trait]
pub trait OAuth1Server: Send + Sync {
    fn name(&self) -> &'static str;

    async fn temporary_credentials(&self) -> Result<TemporaryCredentials, Error>;

    fn authorization_url(&self, temporary: &TemporaryCredentials) -> Result<Url, Error>;

    async fn token_credentials(
        &self,
        temporary: &TemporaryCredentials,
        oauth_token: &str,
        oauth_verifier: &str,
    ) -> Result<TokenCredentials, Error>;

    /// Fetch the user behind `token`. A server may answer from a cache
    /// unless `bypass_cache` is set.
    async fn user_details(
        &self,
        token: &TokenCredentials,
        bypass_cache: bool,
    ) -> Result<OAuth1UserDetails, Error>;
}

pub struct OAuth1Flow {
    server: Box<dyn OAuth1Server>,
    user_hash: Mutex<Option<String>>,
}

impl OAuth1Flow {
    pub fn new(server: impl OAuth1Server + 'static) -> Self {
        Self::from_boxed(Box::new(server))
    }

    pub fn from_boxed(server: Box<dyn OAuth1Server>) -> Self {
        Self {
            server,
            user_hash: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.server.name()
    }

    pub fn server(&self) -> &dyn OAuth1Server {
        self.server.as_ref()
    }

    /// Obtain temporary credentials, store them in the session and return
    /// the provider's authorization URL.
    pub async fn redirect(&self, session: &dyn SessionStore) -> Result<Url, Error> {
        let temporary = self.server.temporary_credentials().await?;

        session
            .put(TEMPORARY_CREDENTIALS_KEY, serde_json::to_value(&temporary)?)
            .await
            .map_err(Error::Session)?;

        let url = self.server.authorization_url(&temporary)?;
        debug!(provider = self.name(), "authorization url generated");
        Ok(url)
    }

    /// Complete the three-legged exchange from the provider's callback.
    pub async fn user(
        &self,
        session: &dyn SessionStore,
        callback: &CallbackParams,
    ) -> Result<NormalizedUser, Error> {
        let (Some(oauth_token), Some(oauth_verifier)) =
            (callback.get("oauth_token"), callback.get("oauth_verifier"))
        else {
            return Err(Error::MissingVerifier);
        };

        let temporary = match session
            .remove(TEMPORARY_CREDENTIALS_KEY)
            .await
            .map_err(Error::Session)?
        {
            Some(value) if !value.is_null() => {
                serde_json::from_value::<TemporaryCredentials>(value)?
            }
            _ => return Err(Error::MissingTemporaryCredentials),
        };

        let token = self
            .server
            .token_credentials(&temporary, oauth_token, oauth_verifier)
            .await?;

        self.user_for(token).await
    }

    /// Resolve the user for known token credentials, skipping the
    /// three-legged exchange.
    pub async fn user_from_token_and_secret(
        &self,
        token: &str,
        secret: &str,
    ) -> Result<NormalizedUser, Error> {
        self.user_for(TokenCredentials::new(token, secret)).await
    }

    async fn user_for(&self, token: TokenCredentials) -> Result<NormalizedUser, Error> {
        let bypass_cache = self.should_bypass_cache(&token.identifier, &token.secret);
        let details = self.server.user_details(&token, bypass_cache).await?;

        Ok(NormalizedUser::new(details.uid, details.extra)
            .with_nickname(details.nickname)
            .with_name(details.name)
            .with_email(details.email)
            .with_avatar(details.image_url)
            .with_credentials(Credentials::OAuth1 {
                token: token.identifier,
                token_secret: token.secret,
            }))
    }

    /// True when the credentials differ from the ones last used, so a
    /// server-side cache cannot return another user's profile.
    pub fn should_bypass_cache(&self, token: &str, secret: &str) -> bool {
        let new_hash = format!("{:x}", Sha1::digest(format!("{token}_{secret}").as_bytes()));
        let mut recorded = self
            .user_hash
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match recorded.as_deref() {
            Some(previous) if previous != new_hash => {
                debug!(provider = self.name(), "credentials changed, bypassing user cache");
                *recorded = Some(new_hash);
                true
            }
            Some(_) => false,
            None => {
                *recorded = Some(new_hash);
                false
            }
        }
    }
}

impl fmt::Debug for OAuth1Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Flow")
            .field("provider", &self.name())
            .finish_non_exhaustive()
    }
}
