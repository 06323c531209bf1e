//! Authorization-code flow with optional PKCE.
//!
//! [`OAuth2Flow`] is immutable configuration plus a provider strategy and can
//! be shared freely. Everything that belongs to a single login attempt lives
//! in an [`AuthorizationAttempt`] created per request with
//! [`OAuth2Flow::attempt`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};
use url::Url;

use crate::callback::CallbackParams;
use crate::config::ProviderConfig;
use crate::error::Error;
use crate::http::HttpClient;
use crate::pkce::CODE_CHALLENGE_METHOD;
use crate::provider::ProviderStrategy;
use crate::request::{create_oauth2_request, encode_basic_credentials, send_token_request};
use crate::session::SessionStore;
use crate::state::AuthorizationState;
use crate::tokens::OAuth2Tokens;
use crate::user::{Credentials, NormalizedUser};

pub struct OAuth2Flow {
    config: ProviderConfig,
    strategy: Box<dyn ProviderStrategy>,
    http_client: Arc<dyn HttpClient>,
}

impl OAuth2Flow {
    pub fn new(
        config: ProviderConfig,
        strategy: impl ProviderStrategy + 'static,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self::from_boxed(config, Box::new(strategy), http_client)
    }

    pub fn from_boxed(
        config: ProviderConfig,
        strategy: Box<dyn ProviderStrategy>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            strategy,
            http_client,
        }
    }

    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn strategy(&self) -> &dyn ProviderStrategy {
        self.strategy.as_ref()
    }

    pub fn scope_separator(&self) -> &str {
        self.config
            .scope_separator
            .as_deref()
            .unwrap_or_else(|| self.strategy.scope_separator())
    }

    pub fn uses_pkce(&self) -> bool {
        self.config.use_pkce || self.strategy.uses_pkce()
    }

    /// Provider defaults followed by configured scopes, without duplicates.
    pub fn default_scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = Vec::new();
        let defaults = self.strategy.default_scopes().iter().map(|s| s.to_string());
        for scope in defaults.chain(self.config.scopes.iter().cloned()) {
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        scopes
    }

    /// Start a new authorization attempt seeded from this flow's
    /// configuration.
    pub fn attempt(&self) -> AuthorizationAttempt<'_> {
        AuthorizationAttempt {
            flow: self,
            scopes: self.default_scopes(),
            parameters: BTreeMap::new(),
            redirect_url: self.config.redirect_url.clone(),
            stateless: false,
            phase: FlowPhase::Idle,
            user: None,
        }
    }

    /// Exchange an authorization code at the provider's token endpoint.
    pub async fn access_token_response(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<OAuth2Tokens, Error> {
        let mut body = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("client_id".to_string(), self.config.client_id.clone()),
            ("client_secret".to_string(), self.config.client_secret.clone()),
            ("code".to_string(), code.to_string()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
        ];

        if let Some(verifier) = code_verifier {
            body.push(("code_verifier".to_string(), verifier.to_string()));
        }

        let mut request = create_oauth2_request(self.strategy.token_url(), &body);
        if self.strategy.uses_basic_auth() {
            request.headers.push((
                "Authorization".to_string(),
                encode_basic_credentials(&self.config.client_id, &self.config.client_secret),
            ));
        }

        match send_token_request(self.http_client.as_ref(), request).await {
            Ok(tokens) => {
                info!(provider = self.name(), "authorization code exchanged");
                Ok(tokens)
            }
            Err(err) => {
                error!(provider = self.name(), error = %err, "token exchange failed");
                Err(err)
            }
        }
    }

    /// Fetch and map the user behind `access_token`, skipping the code
    /// exchange and every state check.
    pub async fn user_from_token(&self, access_token: &str) -> Result<NormalizedUser, Error> {
        let user = self
            .fetch_user(access_token, &self.default_scopes())
            .await?;

        Ok(user.with_credentials(Credentials::OAuth2 {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_in: None,
        }))
    }

    /// Fetch the raw payload and map it, without attaching credentials.
    pub async fn fetch_user(
        &self,
        access_token: &str,
        scopes: &[String],
    ) -> Result<NormalizedUser, Error> {
        let raw = self
            .strategy
            .fetch_raw_user(self.http_client.as_ref(), access_token, scopes)
            .await?;
        let user = self.strategy.map_raw_user(raw)?;

        info!(provider = self.name(), user_id = user.id(), "user mapped");
        Ok(user)
    }

    async fn user_from_tokens(
        &self,
        tokens: &OAuth2Tokens,
        scopes: &[String],
    ) -> Result<NormalizedUser, Error> {
        let access_token = tokens.access_token()?;
        let user = self.fetch_user(access_token, scopes).await?;

        Ok(user.with_credentials(Credentials::OAuth2 {
            access_token: access_token.to_string(),
            refresh_token: tokens.refresh_token().ok().map(String::from),
            expires_in: tokens.access_token_expires_in_seconds().ok(),
        }))
    }
}

impl fmt::Debug for OAuth2Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Flow")
            .field("provider", &self.name())
            .field("client_id", &self.config.client_id)
            .field("redirect_url", &self.config.redirect_url)
            .finish_non_exhaustive()
    }
}

/// Where an [`AuthorizationAttempt`] stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowPhase {
    Idle,
    Redirected,
    AwaitingCallback,
    TokenExchanged,
    UserMapped,
    Failed(String),
}

/// One login attempt against an [`OAuth2Flow`].
///
/// Holds the attempt's scopes, custom parameters, redirect URL, stateless
/// flag and the user once resolved. Create one per request; never share one
/// between two users.
#[derive(Debug)]
pub struct AuthorizationAttempt<'a> {
    flow: &'a OAuth2Flow,
    scopes: Vec<String>,
    parameters: BTreeMap<String, String>,
    redirect_url: String,
    stateless: bool,
    phase: FlowPhase,
    user: Option<NormalizedUser>,
}

impl<'a> AuthorizationAttempt<'a> {
    /// Merge additional scopes into the requested set.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
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

    /// Replace the requested scopes.
    pub fn set_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.clear();
        self.scopes(scopes)
    }

    /// Skip CSRF state generation and validation.
    pub fn stateless(mut self) -> Self {
        self.stateless = true;
        self
    }

    /// Extra authorization URL parameters. They win over the standard ones
    /// on key collision.
    pub fn with<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters = parameters
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = url.into();
        self
    }

    pub fn requested_scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn is_stateless(&self) -> bool {
        self.stateless
    }

    pub fn phase(&self) -> &FlowPhase {
        &self.phase
    }

    pub fn flow(&self) -> &'a OAuth2Flow {
        self.flow
    }

    /// Generate and persist the attempt's state, then build the provider's
    /// authorization URL. Sending the browser there is up to the caller.
    pub async fn redirect(&mut self, session: &dyn SessionStore) -> Result<Url, Error> {
        let result = self.build_redirect(session).await;
        match &result {
            Ok(_) => self.phase = FlowPhase::Redirected,
            Err(err) => self.phase = FlowPhase::Failed(err.to_string()),
        }
        result
    }

    async fn build_redirect(&self, session: &dyn SessionStore) -> Result<Url, Error> {
        let state = AuthorizationState::generate(
            !self.stateless,
            self.flow.uses_pkce(),
            self.parameters.clone(),
        );
        state.persist(session).await?;

        let url = self
            .flow
            .strategy
            .authorization_url(&self.code_fields(&state))?;

        debug!(
            provider = self.flow.name(),
            stateless = self.stateless,
            pkce = state.pkce_verifier().is_some(),
            "authorization url generated"
        );

        Ok(url)
    }

    fn code_fields(&self, state: &AuthorizationState) -> Vec<(String, String)> {
        let mut fields = vec![
            ("client_id".to_string(), self.flow.config.client_id.clone()),
            ("redirect_uri".to_string(), self.redirect_url.clone()),
            (
                "scope".to_string(),
                self.scopes.join(self.flow.scope_separator()),
            ),
            ("response_type".to_string(), "code".to_string()),
        ];

        if let Some(token) = state.csrf_token() {
            fields.push(("state".to_string(), token.to_string()));
        }

        if let Some(challenge) = state.code_challenge() {
            fields.push(("code_challenge".to_string(), challenge));
            fields.push((
                "code_challenge_method".to_string(),
                CODE_CHALLENGE_METHOD.to_string(),
            ));
        }

        for (key, value) in &self.parameters {
            match fields.iter_mut().find(|(k, _)| k == key) {
                Some(field) => field.1 = value.clone(),
                None => fields.push((key.clone(), value.clone())),
            }
        }

        fields
    }

    /// Validate the callback, exchange the code and resolve the user.
    ///
    /// Once a user has been resolved, later calls return it without touching
    /// the session or the network.
    pub async fn user(
        &mut self,
        session: &dyn SessionStore,
        callback: &CallbackParams,
    ) -> Result<NormalizedUser, Error> {
        if let Some(user) = &self.user {
            debug!(provider = self.flow.name(), "returning resolved user");
            return Ok(user.clone());
        }

        match self.complete(session, callback).await {
            Ok(user) => {
                self.phase = FlowPhase::UserMapped;
                self.user = Some(user.clone());
                Ok(user)
            }
            Err(err) => {
                self.phase = FlowPhase::Failed(err.to_string());
                Err(err)
            }
        }
    }

    async fn complete(
        &mut self,
        session: &dyn SessionStore,
        callback: &CallbackParams,
    ) -> Result<NormalizedUser, Error> {
        self.phase = FlowPhase::AwaitingCallback;

        // Taken before validation so rejected callbacks also consume it.
        let verifier = if self.flow.uses_pkce() {
            AuthorizationState::take_code_verifier(session).await?
        } else {
            None
        };

        if !self.stateless {
            let stored = AuthorizationState::take_csrf_token(session).await?;
            let valid = matches!(
                (stored.as_deref(), callback.get("state")),
                (Some(expected), Some(actual)) if !expected.is_empty() && expected == actual
            );
            if !valid {
                return Err(Error::InvalidState);
            }
        }

        let code = callback
            .get("code")
            .filter(|code| !code.is_empty())
            .ok_or(Error::InvalidCode)?;

        let tokens = self
            .flow
            .access_token_response(code, &self.redirect_url, verifier.as_deref())
            .await?;
        self.phase = FlowPhase::TokenExchanged;

        self.flow.user_from_tokens(&tokens, &self.scopes).await
    }

    /// Resolve the user from a caller-supplied access token using this
    /// attempt's scopes. No state or PKCE checks.
    pub async fn user_from_token(&self, access_token: &str) -> Result<NormalizedUser, Error> {
        let user = self.flow.fetch_user(access_token, &self.scopes).await?;

        Ok(user.with_credentials(Credentials::OAuth2 {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_in: None,
        }))
    }
}
