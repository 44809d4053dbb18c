//! InvestHub entitlements API server

use std::sync::Arc;

use anyhow::Context;
use investhub_api::{
    auth::JwtManager, config::Config, routes::create_router, sessions::run_session_sweeper,
    AppState, SessionRegistry,
};
use investhub_entitlements::{
    EntityApiClient, IdentitySource, PgEntitlementStore, PlanSource, SubscriptionSource,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_json);

    let entity_api = match &config.entity_api_url {
        Some(url) => Some(
            EntityApiClient::new(
                url.clone(),
                config.resolver.fetch_timeout,
                config.entity_api_token.clone(),
            )
            .context("Failed to create entity API client")?,
        ),
        None => None,
    };

    let (subscriptions, plans): (Arc<dyn SubscriptionSource>, Arc<dyn PlanSource>) =
        match (&config.database_url, &entity_api) {
            (Some(database_url), _) => {
                let pool =
                    investhub_shared::db::create_pool(database_url, config.database_max_connections)
                        .await
                        .context("Failed to connect to database")?;
                tracing::info!("Using Postgres entitlement store");
                let store = Arc::new(PgEntitlementStore::new(pool));
                (store.clone(), store)
            }
            (None, Some(client)) => {
                tracing::info!(base_url = %client.base_url(), "Using entity API entitlement source");
                let client = Arc::new(client.clone());
                (client.clone(), client)
            }
            (None, None) => anyhow::bail!("No entitlement data source configured"),
        };

    let identity: Arc<dyn IdentitySource> = match (&config.jwt_secret, entity_api) {
        (Some(secret), _) => Arc::new(JwtManager::new(secret, config.jwt_expiry_hours)),
        (None, Some(client)) => Arc::new(client),
        (None, None) => anyhow::bail!("No identity source configured"),
    };

    let sessions = Arc::new(SessionRegistry::new(
        subscriptions,
        plans,
        config.resolver.clone(),
        config.session_idle,
    ));

    let bind_address = config.bind_address.clone();
    let sweep_interval = config.session_sweep_interval;
    let state = AppState::new(config, identity, sessions.clone());
    let shutdown = state.shutdown.clone();

    let sweeper = tokio::spawn(run_session_sweeper(
        sessions,
        sweep_interval,
        shutdown.clone(),
    ));

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;

    tracing::info!(address = %bind_address, "InvestHub entitlements API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    sweeper.await.ok();
    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,investhub_api=debug,investhub_entitlements=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolve on Ctrl+C, cancelling all in-flight resolutions
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
