use anyhow::Context;
use beta_dashboard::analysis_service::BetaService;
use beta_dashboard::api::{self, AppState};
use beta_dashboard::config::AppConfig;
use beta_dashboard::yahoo::YahooClient;
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("beta_dashboard=info,tower_http=info")),
        )
        .with_target(false)
        .init();

    // Global span so every log line carries the app name
    let _span = tracing::info_span!("app", name = %app_config.app_name).entered();

    tracing::info!("Starting beta-dashboard");
    tracing::info!(
        environment = %app_config.environment,
        port = app_config.port,
        variants = app_config.variants.len(),
        default_variant = %app_config.default_variant,
        "Loaded configuration"
    );

    let provider = &app_config.provider;
    let client = YahooClient::new(
        &provider.base_url,
        provider.request_timeout,
        provider.rate_limit_per_minute,
        provider.use_adjusted_close,
    )
    .context("Failed to build price provider client")?;
    tracing::info!(base_url = %provider.base_url, "Price provider ready");

    let service = Arc::new(BetaService::new(Arc::new(client), app_config.fetch_timeout));
    let rate_limit = app_config.api_rate_limit.clone();
    let app_state = AppState {
        service,
        config: Arc::new(app_config.clone()),
    };
    let app = api::build_router(app_state, rate_limit.as_ref())?;

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Server error")?;

    Ok(())
}
