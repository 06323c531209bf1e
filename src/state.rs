use std::collections::BTreeMap;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::Value;

use crate::error::Error;
use crate::pkce::{create_code_challenge, generate_code_verifier};
use crate::session::SessionStore;

/// Length of the CSRF token sent as the `state` parameter.
pub const STATE_LENGTH: usize = 40;

pub(crate) const SESSION_STATE_KEY: &str = "state";
pub(crate) const SESSION_CODE_VERIFIER_KEY: &str = "code_verifier";

pub(crate) fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a cryptographically random CSRF token of [`STATE_LENGTH`]
/// alphanumeric characters.
pub fn generate_state() -> String {
    random_alphanumeric(STATE_LENGTH)
}

/// Ephemeral values of one authorization attempt, created at redirect time
/// and consumed at callback time.
///
/// `csrf_token` is present iff the attempt uses state, `pkce_verifier` iff
/// the flow uses PKCE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationState {
    csrf_token: Option<String>,
    pkce_verifier: Option<String>,
    pending_parameters: BTreeMap<String, String>,
}

impl AuthorizationState {
    pub fn generate(
        uses_state: bool,
        uses_pkce: bool,
        pending_parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            csrf_token: uses_state.then(generate_state),
            pkce_verifier: uses_pkce.then(generate_code_verifier),
            pending_parameters,
        }
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub fn pkce_verifier(&self) -> Option<&str> {
        self.pkce_verifier.as_deref()
    }

    pub fn pending_parameters(&self) -> &BTreeMap<String, String> {
        &self.pending_parameters
    }

    pub fn code_challenge(&self) -> Option<String> {
        self.pkce_verifier.as_deref().map(create_code_challenge)
    }

    /// Write the attempt into the session: the token under a fixed key, the
    /// pending parameters under the token itself, and the PKCE verifier.
    pub async fn persist(&self, session: &dyn SessionStore) -> Result<(), Error> {
        if let Some(token) = &self.csrf_token {
            session
                .put(SESSION_STATE_KEY, Value::String(token.clone()))
                .await
                .map_err(Error::Session)?;
            session
                .put(token, serde_json::to_value(&self.pending_parameters)?)
                .await
                .map_err(Error::Session)?;
        }

        if let Some(verifier) = &self.pkce_verifier {
            session
                .put(SESSION_CODE_VERIFIER_KEY, Value::String(verifier.clone()))
                .await
                .map_err(Error::Session)?;
        }

        Ok(())
    }

    /// Read and remove the stored CSRF token along with its pending
    /// parameters.
    pub async fn take_csrf_token(session: &dyn SessionStore) -> Result<Option<String>, Error> {
        let token = take_string(session, SESSION_STATE_KEY).await?;

        if let Some(token) = token.as_deref().filter(|t| !t.is_empty()) {
            session.remove(token).await.map_err(Error::Session)?;
        }

        Ok(token)
    }

    pub async fn take_code_verifier(session: &dyn SessionStore) -> Result<Option<String>, Error> {
        take_string(session, SESSION_CODE_VERIFIER_KEY).await
    }
}

async fn take_string(session: &dyn SessionStore, key: &str) -> Result<Option<String>, Error> {
    let value = session.remove(key).await.map_err(Error::Session)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}
