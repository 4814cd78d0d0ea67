//! Tokenweave demo
//!
//! Builds a host chain the way a host framework would, weaves token support into
//! it, and replays a short browser session. Logs go to stderr; set `RUST_LOG` to
//! see more (`RUST_LOG=tokenweave=debug`).
//!
//! Pass a settings file (TOML, YAML, or JSON) as the first argument to use it
//! instead of the built-in demo secret.

use std::sync::Arc;

use anyhow::Context;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderValue, Method, Request};
use tokenweave::TokenWeaving;
use tokenweave_auth::TokenSettings;
use tokenweave_pipeline::host::{
    AuthorizationUnit, ClearContextLogoutHandler, CredentialCheckUnit, EchoUnit,
    InMemoryCredentials, LogoutUnit,
};
use tokenweave_pipeline::{Chain, Exchange};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn host_chain() -> Chain {
    let users = InMemoryCredentials::new()
        .with_user("alice", "wonderland", ["ADMIN", "USER"])
        .with_user("bob", "builder", ["USER"]);
    Chain::new()
        .with(CredentialCheckUnit::new("/login", Arc::new(users)))
        .with(LogoutUnit::new("/logout").with_handler(Arc::new(ClearContextLogoutHandler)))
        .with(AuthorizationUnit::new(["/api"]))
        .with(EchoUnit)
}

fn load_settings() -> anyhow::Result<TokenSettings> {
    match std::env::args().nth(1) {
        Some(path) => TokenSettings::from_file(&path)
            .with_context(|| format!("loading token settings from {path}")),
        None => Ok(TokenSettings::with_secret("demo-secret-change-me")),
    }
}

fn request(method: Method, path: &str, body: &str) -> anyhow::Result<Exchange> {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(body.to_string())?;
    Ok(Exchange::new(request))
}

async fn replay(chain: &Chain, label: &str, mut exchange: Exchange) -> anyhow::Result<Exchange> {
    chain.run(&mut exchange).await?;
    info!(
        step = label,
        path = %exchange.path(),
        status = %exchange.response.status(),
        body = %exchange.response.body(),
        set_cookie = ?exchange.response.headers().get(SET_COOKIE),
        "Replayed request"
    );
    Ok(exchange)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let settings = load_settings()?;
    let mut chain = host_chain();
    let report = TokenWeaving::from_settings(&settings)?.install(&mut chain)?;
    info!(chain = ?chain.type_names(), report = ?report, "Host chain woven");

    replay(&chain, "anonymous", request(Method::GET, "/api/profile", "")?).await?;

    let login = request(
        Method::POST,
        "/login",
        r#"{"username":"alice","password":"wonderland"}"#,
    )?;
    let login = replay(&chain, "login", login).await?;
    let token = login
        .response
        .headers()
        .get(settings.attribute_name.as_str())
        .context("login did not issue a token")?
        .to_str()?
        .to_string();

    let cookie = HeaderValue::from_str(&format!("{}={token}", settings.attribute_name))?;
    let mut profile = request(Method::GET, "/api/profile", "")?;
    profile.request.headers_mut().insert(COOKIE, cookie.clone());
    replay(&chain, "authenticated", profile).await?;

    let mut logout = request(Method::POST, "/logout", "")?;
    logout.request.headers_mut().insert(COOKIE, cookie);
    replay(&chain, "logout", logout).await?;

    Ok(())
}
