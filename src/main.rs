//! Nexonic Store - storefront order and payment service

use anyhow::{Context, Result};
use nexonic_store::{
    api::{self, AppState},
    auth::{Role, SessionKeys},
    config::Config,
    messaging::EventBus,
    payment::{DisabledGateway, PaymentGateway, StripeGateway},
    store::{MemoryStore, PgStore, Store},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("issue-token") {
        return issue_token(&config, &args[1..]);
    }

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await.context("connecting to DATABASE_URL")?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, events will not be published"); None }
        },
        None => None,
    };

    let gateway: Arc<dyn PaymentGateway> = match &config.stripe_secret_key {
        Some(key) => Arc::new(StripeGateway::new(key.as_str(), config.stripe_api_base.as_str())),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, card payments are disabled");
            Arc::new(DisabledGateway)
        }
    };
    if config.stripe_webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, every webhook delivery will be rejected");
    }

    let state = AppState::new(&config, store, gateway, EventBus::new(nats));
    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!("🚀 Nexonic Store listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}

/// `issue-token <user-id> [admin]`: prints a session token and its cookie.
fn issue_token(config: &Config, args: &[String]) -> Result<()> {
    let user: Uuid = args.first().context("usage: issue-token <user-id> [admin]")?.parse().context("user id must be a UUID")?;
    let role = if args.get(1).map(String::as_str) == Some("admin") { Role::Admin } else { Role::Customer };
    let keys = SessionKeys::new(&config.session_secret, config.production);
    let token = keys.issue(user, role, chrono::Duration::days(7)).context("signing session token")?;
    println!("{}", token);
    println!("Set-Cookie: {}", keys.session_cookie(&token));
    Ok(())
}
