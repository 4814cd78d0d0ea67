//! End-to-end weaving tests
//!
//! Builds the stock host chain, installs token support, and replays the traffic a
//! browser session produces:
//! - Interactive login leaves with a token header and cookie
//! - Follow-up requests authenticate from the cookie or the header
//! - Bad, expired, and missing tokens fall through to the authorization stage
//! - Logout expires the cookie before the host's own logout handlers run

use std::convert::Infallible;
use std::io::Write;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderValue, Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use tokenweave::tower::TokenAuthLayer;
use tokenweave::{
    AuthenticationBridge, TokenCookieClearingLogoutHandler, TokenIssuingSuccessHandler,
    TokenWeaving, UserPrincipalMapping, WeaveError, WeaveReport,
};
use tokenweave_auth::{
    ManualClock, TimeUnit, TokenCodec, TokenSettings, TokenTransport, UserPrincipal,
};
use tokenweave_pipeline::host::{
    AuthorizationUnit, ClearContextLogoutHandler, CredentialCheckUnit, EchoUnit,
    InMemoryCredentials, LogoutUnit,
};
use tokenweave_pipeline::{
    AsAny, Authentication, Capability, Chain, Exchange, Next, PipelineResult, ProcessingUnit,
    Reflect, reflect,
};
use tower::{ServiceBuilder, ServiceExt};

const TOKEN_HEADER: &str = "X-Auth-Token";

fn host_chain() -> Chain {
    let users = InMemoryCredentials::new().with_user("alice", "s3cret", ["ADMIN"]);
    Chain::new()
        .with(CredentialCheckUnit::new("/login", Arc::new(users)))
        .with(LogoutUnit::new("/logout").with_handler(Arc::new(ClearContextLogoutHandler)))
        .with(AuthorizationUnit::new(["/api"]))
        .with(EchoUnit)
}

fn woven_chain() -> Chain {
    let mut chain = host_chain();
    TokenWeaving::from_settings(&TokenSettings::with_secret("s3cr3t"))
        .unwrap()
        .install(&mut chain)
        .unwrap();
    chain
}

fn exchange(method: Method, path: &str, body: &str) -> Exchange {
    Exchange::new(
        Request::builder()
            .method(method)
            .uri(path)
            .body(body.to_string())
            .unwrap(),
    )
}

fn login() -> Exchange {
    exchange(
        Method::POST,
        "/login",
        r#"{"username":"alice","password":"s3cret"}"#,
    )
}

fn with_cookie(mut exchange: Exchange, token: &str) -> Exchange {
    let value = HeaderValue::from_str(&format!("theme=dark; {TOKEN_HEADER}={token}")).unwrap();
    exchange.request.headers_mut().insert(COOKIE, value);
    exchange
}

fn with_header(mut exchange: Exchange, token: &str) -> Exchange {
    let value = HeaderValue::from_str(token).unwrap();
    exchange.request.headers_mut().insert(TOKEN_HEADER, value);
    exchange
}

/// Flip one character inside the signature segment
fn tamper(token: &str) -> String {
    let i = token.rfind('.').unwrap() + 5;
    let mut bytes = token.as_bytes().to_vec();
    bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
    String::from_utf8(bytes).unwrap()
}

/// Log alice in and return the issued token
async fn issue_token(chain: &Chain) -> String {
    let mut exchange = login();
    chain.run(&mut exchange).await.unwrap();
    exchange.response.headers()[TOKEN_HEADER]
        .to_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_install_places_token_unit_before_logout() {
    // GIVEN: The stock host chain
    let mut chain = host_chain();

    // WHEN: Token support is installed
    let weaving = TokenWeaving::from_settings(&TokenSettings::with_secret("s3cr3t")).unwrap();
    let report = weaving.install(&mut chain).unwrap();

    // THEN: The token unit sits right before logout and both handler slots changed
    assert_eq!(
        report,
        WeaveReport {
            inserted_at: Some(1),
            success_handlers_wrapped: 1,
            logout_handlers_added: 1,
        }
    );
    assert_eq!(
        chain.type_names(),
        [
            "CredentialCheckUnit",
            "TokenAuthenticationUnit",
            "LogoutUnit",
            "AuthorizationUnit",
            "EchoUnit"
        ]
    );
}

#[tokio::test]
async fn test_login_emits_header_and_cookie_then_delegates() {
    // GIVEN: A woven chain
    let chain = woven_chain();

    // WHEN: Alice logs in
    let mut exchange = login();
    chain.run(&mut exchange).await.unwrap();

    // THEN: The original success behavior still answers
    assert_eq!(exchange.response.status(), StatusCode::OK);
    assert_eq!(exchange.response.body(), "welcome alice");

    // AND: Header and cookie carry the same token
    let headers = exchange.response.headers();
    let token = headers[TOKEN_HEADER].to_str().unwrap();
    let cookie = headers[SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with(&format!("{TOKEN_HEADER}={token};")));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
}

#[tokio::test]
async fn test_token_authenticates_follow_up_requests() {
    // GIVEN: A token issued by logging in
    let chain = woven_chain();
    let token = issue_token(&chain).await;

    // WHEN/THEN: The cookie authenticates a protected request
    let mut by_cookie = with_cookie(exchange(Method::GET, "/api/me", ""), &token);
    chain.run(&mut by_cookie).await.unwrap();
    assert_eq!(by_cookie.response.status(), StatusCode::OK);
    assert_eq!(by_cookie.response.body(), "hello alice");
    assert!(
        by_cookie
            .security
            .authentication()
            .unwrap()
            .has_authority("ADMIN")
    );

    // WHEN/THEN: So does the header, for clients without cookies
    let mut by_header = with_header(exchange(Method::GET, "/api/me", ""), &token);
    chain.run(&mut by_header).await.unwrap();
    assert_eq!(by_header.response.body(), "hello alice");
}

#[tokio::test]
async fn test_cookie_wins_over_header() {
    // GIVEN: A valid cookie and a garbage header on the same request
    let chain = woven_chain();
    let token = issue_token(&chain).await;
    let request = with_header(exchange(Method::GET, "/api/me", ""), "garbage");
    let mut request = with_cookie(request, &token);

    // WHEN: The request runs
    chain.run(&mut request).await.unwrap();

    // THEN: The cookie's token is the one used
    assert_eq!(request.response.body(), "hello alice");
}

#[tokio::test]
async fn test_bad_or_missing_token_is_unauthenticated_not_error() {
    let chain = woven_chain();
    let token = issue_token(&chain).await;
    let tampered = tamper(&token);

    for request in [
        exchange(Method::GET, "/api/me", ""),
        with_cookie(exchange(Method::GET, "/api/me", ""), &tampered),
        with_header(exchange(Method::GET, "/api/me", ""), "not.a.token"),
    ] {
        // GIVEN: A protected request without a usable token
        let mut request = request;

        // WHEN: It runs through the chain
        let outcome = chain.run(&mut request).await;

        // THEN: The chain completes and authorization rejects it
        assert!(outcome.is_ok());
        assert_eq!(request.response.status(), StatusCode::UNAUTHORIZED);
        assert!(!request.security.is_authenticated());
    }
}

#[tokio::test]
async fn test_expired_token_is_rejected_at_the_boundary() {
    // GIVEN: One-minute tokens and a clock under test control
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));
    let mut settings = TokenSettings::with_secret("s3cr3t");
    settings.expiration = 1;
    settings.expiration_unit = TimeUnit::Minutes;
    let codec = TokenCodec::<UserPrincipal>::structured(&settings)
        .unwrap()
        .with_clock(clock.clone());
    let bridge = AuthenticationBridge::new(
        Arc::new(codec),
        TokenTransport::from_settings(&settings).unwrap(),
        Arc::new(UserPrincipalMapping),
    );
    let mut chain = host_chain();
    TokenWeaving::from_bridge(bridge).install(&mut chain).unwrap();
    let token = issue_token(&chain).await;

    // WHEN/THEN: One second before expiry the token still works
    clock.advance(Duration::seconds(59));
    let mut fresh = with_cookie(exchange(Method::GET, "/api/me", ""), &token);
    chain.run(&mut fresh).await.unwrap();
    assert_eq!(fresh.response.status(), StatusCode::OK);

    // WHEN/THEN: At expiry it no longer does
    clock.advance(Duration::seconds(1));
    let mut stale = with_cookie(exchange(Method::GET, "/api/me", ""), &token);
    chain.run(&mut stale).await.unwrap();
    assert_eq!(stale.response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_expires_cookie_first() {
    // GIVEN: A woven chain and a logged-in browser
    let chain = woven_chain();
    let token = issue_token(&chain).await;

    // WHEN: The browser logs out
    let mut logout = with_cookie(exchange(Method::POST, "/logout", ""), &token);
    chain.run(&mut logout).await.unwrap();

    // THEN: The cookie is reissued empty and expiring, with no token header
    assert_eq!(logout.response.status(), StatusCode::NO_CONTENT);
    let headers = logout.response.headers();
    assert!(!headers.contains_key(TOKEN_HEADER));
    let cookie = headers[SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with(&format!("{TOKEN_HEADER}=;")));
    assert!(cookie.contains("Max-Age=0"));

    // AND: The cookie-clearing handler runs ahead of the host's own
    let unit = chain.get(2).unwrap();
    let logout_unit = unit.as_any().downcast_ref::<LogoutUnit>().unwrap();
    assert_eq!(logout_unit.handlers.len(), 2);
    assert!(
        (*logout_unit.handlers[0])
            .as_any()
            .is::<TokenCookieClearingLogoutHandler>()
    );
    assert!(
        (*logout_unit.handlers[1])
            .as_any()
            .is::<ClearContextLogoutHandler>()
    );
}

#[tokio::test]
async fn test_install_twice_changes_nothing_more() {
    // GIVEN: A chain that already has token support
    let mut chain = host_chain();
    let weaving = TokenWeaving::from_settings(&TokenSettings::with_secret("s3cr3t")).unwrap();
    weaving.install(&mut chain).unwrap();
    let names = chain.type_names();

    // WHEN: Installation runs again
    let report = weaving.install(&mut chain).unwrap();

    // THEN: Nothing new is inserted, wrapped, or added
    assert!(report.is_noop());
    assert_eq!(chain.type_names(), names);

    let unit = chain.get(0).unwrap();
    let login_unit = unit.as_any().downcast_ref::<CredentialCheckUnit>().unwrap();
    let decorator = (*login_unit.stage.success_handler)
        .as_any()
        .downcast_ref::<TokenIssuingSuccessHandler>()
        .unwrap();
    let delegate = tokenweave_pipeline::Decorator::delegate(decorator).unwrap();
    assert!(!(*delegate).as_any().is::<TokenIssuingSuccessHandler>());

    // AND: Login still issues exactly one token
    let mut exchange = login();
    chain.run(&mut exchange).await.unwrap();
    assert_eq!(exchange.response.headers().get_all(SET_COOKIE).iter().count(), 1);
}

#[test]
fn test_install_without_chain_is_fatal() {
    let weaving = TokenWeaving::from_settings(&TokenSettings::with_secret("s3cr3t")).unwrap();
    let mut host: Option<Chain> = None;
    assert!(matches!(
        weaving.install(&mut host),
        Err(WeaveError::ChainUnavailable)
    ));
}

#[test]
fn test_install_without_anchor_goes_first() {
    let weaving = TokenWeaving::from_settings(&TokenSettings::with_secret("s3cr3t")).unwrap();
    let mut chain = Chain::new().with(EchoUnit);
    let report = weaving.install(&mut chain).unwrap();
    assert_eq!(report.inserted_at, Some(0));
    assert_eq!(chain.type_names(), ["TokenAuthenticationUnit", "EchoUnit"]);
}

/// Login stage from a host version that renamed its handler slot
struct RenamedLoginUnit {
    on_success: Arc<dyn tokenweave_pipeline::AuthenticationSuccessHandler>,
}

reflect!(RenamedLoginUnit {
    on_success: Arc<dyn tokenweave_pipeline::AuthenticationSuccessHandler>,
});

#[async_trait::async_trait]
impl ProcessingUnit for RenamedLoginUnit {
    fn capabilities(&self) -> &[Capability] {
        &[Capability::CREDENTIAL_CHECK]
    }

    async fn handle<'a>(
        &'a self,
        exchange: &'a mut Exchange,
        next: Next<'a>,
    ) -> PipelineResult<()> {
        next.run(exchange).await
    }
}

#[test]
fn test_incompatible_host_unit_is_fatal() {
    // GIVEN: A credential-check stage without a `success_handler` slot
    let mut chain = Chain::new().with(RenamedLoginUnit {
        on_success: Arc::new(tokenweave_pipeline::host::StatusSuccessHandler),
    });
    let weaving = TokenWeaving::from_settings(&TokenSettings::with_secret("s3cr3t")).unwrap();

    // WHEN: Installation runs
    let err = weaving.install(&mut chain).unwrap_err();

    // THEN: It fails with a reflective access error naming the slot
    match err {
        WeaveError::ReflectiveAccess(e) => {
            assert!(e.is_not_found());
            assert!(e.to_string().contains("success_handler"));
        }
        other => panic!("expected reflective access error, got {other:?}"),
    }
}

#[test]
fn test_missing_secret_fails_before_weaving() {
    let err = TokenWeaving::from_settings(&TokenSettings::default()).unwrap_err();
    match err {
        WeaveError::Auth(e) => assert!(e.is_startup_fatal()),
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_settings_file_with_secret_file() {
    // GIVEN: A secret file and a TOML settings file pointing at it
    let mut secret = tempfile::NamedTempFile::new().unwrap();
    writeln!(secret, "file-s3cr3t").unwrap();

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
attribute_name = "Session"
algorithm = "HS256"
expiration = 30
secret_file = "{}"

[cookie]
secure = true
same_site = "strict"
"#,
        secret.path().display()
    )
    .unwrap();

    // WHEN: Settings are loaded and woven
    let settings = TokenSettings::from_file_with_prefix(file.path(), "TWENDTOEND").unwrap();
    let mut chain = host_chain();
    TokenWeaving::from_settings(&settings)
        .unwrap()
        .install(&mut chain)
        .unwrap();

    // THEN: Login issues a cookie with the configured name and attributes
    let mut exchange = login();
    chain.run(&mut exchange).await.unwrap();
    let headers = exchange.response.headers();
    assert!(headers.contains_key("Session"));
    let cookie = headers[SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("Session="));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
}

#[tokio::test]
async fn test_tower_layer_puts_identity_in_extensions() {
    // GIVEN: A service stack behind the token layer
    let bridge = AuthenticationBridge::for_users(&TokenSettings::with_secret("s3cr3t")).unwrap();
    let token = bridge
        .codec()
        .encode(&UserPrincipal::new("alice", ["ADMIN"]))
        .unwrap();
    let layer = TokenAuthLayer::new(bridge);
    let service = |layer: TokenAuthLayer<UserPrincipal>| {
        ServiceBuilder::new()
            .layer(layer)
            .service(tower::service_fn(|req: Request<()>| async move {
                let who = req
                    .extensions()
                    .get::<Authentication>()
                    .map_or("anonymous", Authentication::name)
                    .to_string();
                let roles = req
                    .extensions()
                    .get::<UserPrincipal>()
                    .map(|p| p.roles.clone())
                    .unwrap_or_default();
                Ok::<_, Infallible>((who, roles))
            }))
    };

    // WHEN/THEN: A request with the token header is authenticated
    let request = Request::builder()
        .header(TOKEN_HEADER, token.as_str())
        .body(())
        .unwrap();
    let (who, roles) = service(layer.clone()).oneshot(request).await.unwrap();
    assert_eq!(who, "alice");
    assert_eq!(roles, vec!["ADMIN".to_string()]);

    // WHEN/THEN: A request without one passes through anonymously
    let (who, _) = service(layer)
        .oneshot(Request::builder().body(()).unwrap())
        .await
        .unwrap();
    assert_eq!(who, "anonymous");
}

#[test]
fn test_woven_units_are_reflectable() {
    let chain = woven_chain();
    let unit = chain.get(1).unwrap();
    assert!(unit.satisfies(Capability::TOKEN_AUTHENTICATION));
    assert_eq!(unit.type_name(), "TokenAuthenticationUnit");
    assert_eq!(
        unit.declared_slots()
            .iter()
            .map(|slot| slot.name)
            .collect::<Vec<_>>(),
        ["authority"]
    );
}
