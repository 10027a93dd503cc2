//! Example consumer: serves every model found under `MODELS_PATH`.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`
//!
//! There is no session layer here; `X-Demo-User: name` stands in for one and
//! makes the caller an admin. Do not deploy it like this.

use axum::{extract::Request, middleware::Next, response::Response};
use data_api::{
    app, connect, load_from_path, AppState, RegistryBuilder, RoleAccess, Settings, SqlAuditStore, Trail, User,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

const DEMO_USER_HEADER: &str = "x-demo-user";

async fn demo_session(mut req: Request, next: Next) -> Response {
    let username = req
        .headers()
        .get(DEMO_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Some(username) = username {
        req.extensions_mut().insert(User {
            username,
            admin: true,
            ..User::default()
        });
    }
    next.run(req).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("data_api=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(?settings, "starting");

    let driver = connect(&settings).await?;
    let models = match &settings.models_path {
        Some(path) => load_from_path(path).await?,
        None => Vec::new(),
    };
    let registry = RegistryBuilder::new().register_all(models).build()?;
    tracing::info!(models = registry.len(), "models registered");

    let audit = SqlAuditStore::new(driver.clone());
    audit.ensure_audit_table().await?;

    let bind_addr = settings.bind_addr.clone();
    let trail = Trail::tracing(settings.reporting_level);
    let state = AppState::new(
        driver,
        registry,
        Arc::new(RoleAccess::new()),
        Arc::new(audit),
        settings,
        trail,
    );

    let router = app(state).layer(axum::middleware::from_fn(demo_session));
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", bind_addr);
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
