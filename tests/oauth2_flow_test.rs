/// Generic flow test harness implemented as a macro.
///
/// Each invocation generates the same redirect / callback / error tests for
/// one provider strategy, run against a `wiremock` server standing in for
/// the provider.
///
/// Usage:
/// ```ignore
/// provider_flow_tests! {
///     provider_name: "Google",
///     make_strategy: |mock_url| { Google::with_endpoints(...) },
///     token_path: "/token",
///     user_path: "/userinfo",
///     user_response: serde_json::json!({ "sub": "1" }),
///     expected_id: "1",
///     pkce: true,
/// }
/// ```
#[macro_export]
macro_rules! provider_flow_tests {
    (
        provider_name: $name:expr,
        make_strategy: |$mock_url:ident| $make_strategy:expr,
        token_path: $token_path:expr,
        user_path: $user_path:expr,
        user_response: $user_response:expr,
        expected_id: $expected_id:expr,
        pkce: $pkce:expr,
    ) => {
        fn make_flow($mock_url: String) -> socialite_oauth::OAuth2Flow {
            let config = socialite_oauth::ProviderConfig::new(
                "client-id",
                "client-secret",
                "http://localhost/callback",
            )
            .with_pkce($pkce);

            socialite_oauth::OAuth2Flow::new(
                config,
                $make_strategy,
                std::sync::Arc::new(socialite_oauth::ReqwestClient::new()),
            )
        }

        async fn stored_state(session: &socialite_oauth::InMemorySessionStore) -> Option<String> {
            use socialite_oauth::SessionStore;

            session
                .get("state")
                .await
                .unwrap()
                .and_then(|value| value.as_str().map(String::from))
        }

        #[tokio::test]
        async fn flow_redirect_carries_code_fields() {
            use socialite_oauth::{FlowPhase, InMemorySessionStore, SessionStore, create_code_challenge};

            let flow = make_flow("https://mock.example.com".to_string());
            let session = InMemorySessionStore::new();
            let mut attempt = flow.attempt();

            let url = attempt
                .redirect(&session)
                .await
                .unwrap_or_else(|e| panic!("{}: redirect failed: {e}", $name));
            let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

            assert_eq!(attempt.phase(), &FlowPhase::Redirected, "{}: wrong phase", $name);
            assert!(
                pairs.contains(&("response_type".into(), "code".into())),
                "{}: missing response_type=code",
                $name
            );
            assert!(
                pairs.contains(&("client_id".into(), "client-id".into())),
                "{}: missing client_id",
                $name
            );
            assert!(
                pairs.contains(&("redirect_uri".into(), "http://localhost/callback".into())),
                "{}: missing redirect_uri",
                $name
            );

            let state = stored_state(&session).await.expect("state stored in session");
            assert_eq!(state.len(), 40, "{}: wrong state length", $name);
            assert!(
                pairs.iter().any(|(k, v)| k == "state" && v == &state),
                "{}: missing or wrong state",
                $name
            );

            let verifier = session.get("code_verifier").await.unwrap();
            if $pkce {
                let verifier = verifier.expect("verifier stored in session");
                let challenge = create_code_challenge(verifier.as_str().unwrap());
                assert!(
                    pairs.contains(&("code_challenge".into(), challenge)),
                    "{}: wrong code_challenge",
                    $name
                );
                assert!(
                    pairs.contains(&("code_challenge_method".into(), "S256".into())),
                    "{}: missing code_challenge_method",
                    $name
                );
            } else {
                assert!(verifier.is_none(), "{}: unexpected verifier", $name);
                assert!(
                    !pairs.iter().any(|(k, _)| k == "code_challenge"),
                    "{}: unexpected code_challenge",
                    $name
                );
            }
        }

        #[tokio::test]
        async fn flow_callback_resolves_user() {
            use socialite_oauth::{CallbackParams, FlowPhase, InMemorySessionStore, SessionStore};
            use super::common::mock_server::MockProviderServer;

            let server = MockProviderServer::start_with_token_path($token_path).await;
            server
                .mock_token_success(serde_json::json!({
                    "access_token": "test-access-token",
                    "token_type": "Bearer",
                    "expires_in": 3600,
                    "refresh_token": "test-refresh-token"
                }))
                .await;
            server.mock_get_json($user_path, $user_response).await;

            let flow = make_flow(server.url());
            let session = InMemorySessionStore::new();
            let mut attempt = flow.attempt();
            attempt.redirect(&session).await.unwrap();

            let state = stored_state(&session).await.unwrap();
            let verifier = session
                .get("code_verifier")
                .await
                .unwrap()
                .and_then(|value| value.as_str().map(String::from));
            let callback = CallbackParams::from_iter([
                ("state", state.as_str()),
                ("code", "test-auth-code"),
            ]);

            let user = attempt
                .user(&session, &callback)
                .await
                .unwrap_or_else(|e| panic!("{}: callback failed: {e}", $name));

            assert_eq!(user.id(), $expected_id, "{}: wrong id", $name);
            assert_eq!(user.token(), "test-access-token", "{}: wrong token", $name);
            assert_eq!(user.refresh_token(), "test-refresh-token", "{}: wrong refresh token", $name);
            assert_eq!(user.expires_in(), Some(3600), "{}: wrong expires_in", $name);
            assert_eq!(attempt.phase(), &FlowPhase::UserMapped, "{}: wrong phase", $name);
            assert!(session.get("state").await.unwrap().is_none(), "{}: state not consumed", $name);

            server
                .verify_token_request(&[
                    ("grant_type", "authorization_code"),
                    ("code", "test-auth-code"),
                    ("client_id", "client-id"),
                    ("client_secret", "client-secret"),
                    ("redirect_uri", "http://localhost/callback"),
                ])
                .await;
            if let Some(verifier) = verifier.as_deref() {
                server.verify_token_request(&[("code_verifier", verifier)]).await;
            }

            let again = attempt.user(&session, &callback).await.unwrap();
            assert_eq!(again, user, "{}: user not memoized", $name);
            assert_eq!(
                server.requests_to($token_path).await.len(),
                1,
                "{}: memoized user triggered another exchange",
                $name
            );
        }

        #[tokio::test]
        async fn flow_rejects_mismatched_state() {
            use socialite_oauth::{CallbackParams, Error, FlowPhase, InMemorySessionStore};

            let flow = make_flow("https://mock.example.com".to_string());
            let session = InMemorySessionStore::new();
            let mut attempt = flow.attempt();
            attempt.redirect(&session).await.unwrap();

            let err = attempt
                .user(&session, &CallbackParams::from_query("state=forged&code=abc"))
                .await
                .expect_err(&format!("{}: expected InvalidState", $name));

            assert!(matches!(err, Error::InvalidState), "{}: got {err:?}", $name);
            assert!(
                matches!(attempt.phase(), FlowPhase::Failed(_)),
                "{}: phase should be Failed",
                $name
            );
        }

        #[tokio::test]
        async fn flow_token_exchange_oauth_error() {
            use socialite_oauth::{CallbackParams, Error, InMemorySessionStore};
            use super::common::mock_server::MockProviderServer;

            let server = MockProviderServer::start_with_token_path($token_path).await;
            server
                .mock_token_error("invalid_grant", "The authorization code has expired")
                .await;

            let flow = make_flow(server.url());
            let session = InMemorySessionStore::new();
            let err = flow
                .attempt()
                .stateless()
                .user(&session, &CallbackParams::from_query("code=bad-code"))
                .await
                .expect_err(&format!("{}: expected OAuth error", $name));

            match err {
                Error::OAuthRequest {
                    code, description, ..
                } => {
                    assert_eq!(code, "invalid_grant", "{}: wrong error code", $name);
                    assert_eq!(
                        description.as_deref(),
                        Some("The authorization code has expired"),
                        "{}: wrong error description",
                        $name
                    );
                }
                other => panic!("{}: expected OAuthRequest, got: {other:?}", $name),
            }
        }

        #[tokio::test]
        async fn flow_token_exchange_unexpected_status() {
            use socialite_oauth::{CallbackParams, Error, InMemorySessionStore};
            use super::common::mock_server::MockProviderServer;

            let server = MockProviderServer::start_with_token_path($token_path).await;
            server.mock_unexpected_status(500).await;

            let flow = make_flow(server.url());
            let session = InMemorySessionStore::new();
            let err = flow
                .attempt()
                .stateless()
                .user(&session, &CallbackParams::from_query("code=code"))
                .await
                .expect_err(&format!("{}: expected error for 500", $name));

            assert!(
                matches!(err, Error::UnexpectedResponse { status: 500 }),
                "{}: expected UnexpectedResponse(500), got: {err:?}",
                $name
            );
        }

        #[tokio::test]
        async fn flow_token_exchange_malformed_body() {
            use socialite_oauth::{CallbackParams, Error, InMemorySessionStore};
            use super::common::mock_server::MockProviderServer;

            let server = MockProviderServer::start_with_token_path($token_path).await;
            // 400 with empty body (not valid JSON)
            server.mock_unexpected_status(400).await;

            let flow = make_flow(server.url());
            let session = InMemorySessionStore::new();
            let err = flow
                .attempt()
                .stateless()
                .user(&session, &CallbackParams::from_query("code=code"))
                .await
                .expect_err(&format!("{}: expected error for malformed body", $name));

            assert!(
                matches!(err, Error::UnexpectedErrorBody { status: 400, .. }),
                "{}: expected UnexpectedErrorBody(400), got: {err:?}",
                $name
            );
        }

        #[tokio::test]
        async fn flow_user_from_token() {
            use super::common::mock_server::MockProviderServer;

            let server = MockProviderServer::start_with_token_path($token_path).await;
            server.mock_get_json($user_path, $user_response).await;

            let flow = make_flow(server.url());
            let user = flow
                .user_from_token("direct-token")
                .await
                .unwrap_or_else(|e| panic!("{}: user_from_token failed: {e}", $name));

            assert_eq!(user.id(), $expected_id, "{}: wrong id", $name);
            assert_eq!(user.token(), "direct-token", "{}: wrong token", $name);
            assert_eq!(user.refresh_token(), "", "{}: unexpected refresh token", $name);
            assert!(
                server.requests_to($token_path).await.is_empty(),
                "{}: token endpoint should not be called",
                $name
            );
        }
    };
}
