use crate::http::BoxError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No driver name was passed and no default driver is configured.
    #[error("No Socialite driver was specified")]
    NoDriverSpecified,

    /// Neither a built-in nor an extended builder exists for this name.
    #[error("Driver [{0}] not supported")]
    UnsupportedDriver(String),

    /// A built-in driver was requested but has no configuration entry.
    #[error("Driver [{0}] is not configured")]
    MissingDriverConfig(String),

    /// The driver exists but speaks the other OAuth protocol.
    #[error("Driver [{driver}] is not an {expected} driver")]
    ProtocolMismatch {
        driver: String,
        expected: &'static str,
    },

    /// The callback `state` is missing or does not match the stored CSRF token.
    #[error("Invalid state parameter")]
    InvalidState,

    /// The callback carries no (or an empty) `code`.
    #[error("Missing authorization code")]
    InvalidCode,

    /// The OAuth1 callback lacks `oauth_token` or `oauth_verifier`.
    #[error("Invalid request. Missing OAuth verifier")]
    MissingVerifier,

    /// No temporary OAuth1 credentials were found in the session.
    #[error("Missing temporary OAuth credentials")]
    MissingTemporaryCredentials,

    /// The `oauth_token` echoed by the provider is not the one we issued.
    #[error("Temporary identifier passed back by server does not match stored temporary credentials")]
    TemporaryIdentifierMismatch,

    /// OAuth2 error response (HTTP 400/401 with standard error JSON body,
    /// or HTTP 200 with an `error` field as GitHub does).
    /// Per RFC 6749 Section 5.2.
    #[error("OAuth2 error: {code}")]
    OAuthRequest {
        code: String,
        description: Option<String>,
        uri: Option<String>,
        state: Option<String>,
    },

    /// An endpoint returned a status this crate does not interpret.
    #[error("Unexpected HTTP status: {status}")]
    UnexpectedResponse { status: u16 },

    /// Endpoint returned a body that could not be interpreted.
    #[error("Unparseable response (HTTP {status})")]
    UnexpectedErrorBody { status: u16, body: String },

    /// Network / transport error from the HTTP client.
    #[error("HTTP request failed: {0}")]
    Http(#[from] BoxError),

    /// The session store failed to read or write.
    #[error("Session store failure: {0}")]
    Session(BoxError),

    /// A required field is missing from a token or profile response.
    #[error("Missing or invalid field: {field}")]
    MissingField { field: &'static str },

    /// An OAuth1 request signature could not be computed.
    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
