mod callback;
mod config;
mod error;
mod http;
pub mod oauth1;
mod oauth2;
mod pkce;
mod provider;
mod providers;
mod registry;
mod request;
mod session;
mod state;
mod tokens;
mod user;

#[cfg(test)]
mod test_support;

// Core
pub use error::Error;
pub use http::{BoxError, HttpClient, HttpRequest, HttpResponse, Method};
pub use oauth2::{AuthorizationAttempt, FlowPhase, OAuth2Flow};
pub use tokens::OAuth2Tokens;
pub use user::{Credentials, NormalizedUser, RawAttributes};

// OAuth1
pub use oauth1::signature::RequestSigner;
pub use oauth1::twitter::{TwitterEndpoints, TwitterServer};
pub use oauth1::{OAuth1Flow, OAuth1Server, OAuth1UserDetails, TemporaryCredentials, TokenCredentials};

// Request context
pub use callback::CallbackParams;
pub use session::{InMemorySessionStore, SessionStore};
pub use state::{AuthorizationState, STATE_LENGTH, generate_state};

// Configuration and driver resolution
pub use config::{DriverConfig, ENV_DRIVERS, HttpOptions, ProviderConfig, SocialiteConfig};
pub use registry::{Driver, DriverBuilder, DriverContext, DriverRegistry, ProviderKind};

// Utilities
pub use pkce::{CODE_CHALLENGE_METHOD, CODE_VERIFIER_LENGTH, create_code_challenge, generate_code_verifier};
pub use provider::{ProviderStrategy, build_authorization_url};
pub use request::{create_oauth2_request, encode_basic_credentials, fetch_json, send_token_request};

// Default HTTP client (behind feature flag)
#[cfg(feature = "reqwest-client")]
pub use http::ReqwestClient;

// Providers
pub use providers::bitbucket::Bitbucket;
pub use providers::facebook::Facebook;
pub use providers::github::GitHub;
pub use providers::gitlab::GitLab;
pub use providers::google::Google;
pub use providers::linkedin::LinkedIn;
