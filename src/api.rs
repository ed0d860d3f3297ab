use crate::analysis_service::BetaService;
use crate::config::{ApiRateLimit, AppConfig};
use crate::data_structures::{DashboardInputs, DashboardVariant};
use crate::error::{BetaError, ErrorBody};
use crate::presentation::{DashboardPage, render_page};
use anyhow::Context;
use axum::{
    Json, Router,
    extract::{FromRef, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::Query;
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, instrument, warn};

pub type SharedService = Arc<BetaService>;
pub type SharedConfig = Arc<AppConfig>;

#[derive(Clone)]
pub struct AppState {
    pub service: SharedService,
    pub config: SharedConfig,
}

impl FromRef<AppState> for SharedService {
    fn from_ref(app_state: &AppState) -> SharedService {
        app_state.service.clone()
    }
}

impl FromRef<AppState> for SharedConfig {
    fn from_ref(app_state: &AppState) -> SharedConfig {
        app_state.config.clone()
    }
}

/// Query string of the JSON endpoints. `variant` falls back to the configured default.
#[derive(Debug, Default, Deserialize)]
pub struct BetaQuery {
    pub variant: Option<String>,
    pub stock: Option<String>,
    pub market: Option<String>,
}

impl BetaQuery {
    fn inputs(&self) -> DashboardInputs {
        DashboardInputs {
            stock: self.stock.clone(),
            market: self.market.clone(),
        }
    }
}

pub fn status_for(error: &BetaError) -> StatusCode {
    match error {
        BetaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        BetaError::InsufficientData { .. } | BetaError::DegenerateInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BetaError::DataUnavailable { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for BetaError {
    fn into_response(self) -> Response {
        (status_for(&self), Json(ErrorBody::from(&self))).into_response()
    }
}

async fn render_dashboard(
    service: &BetaService,
    config: &AppConfig,
    variant: &DashboardVariant,
    inputs: &DashboardInputs,
) -> Html<String> {
    let outcome = service.render(variant, inputs).await;
    let stock_input = variant.stock_input(inputs);
    let page = DashboardPage {
        variant,
        variants: &config.variants,
        stock_input: &stock_input,
        market_key: inputs.market.as_deref(),
        outcome: &outcome,
    };
    Html(render_page(&page))
}

#[instrument(skip(service, config))]
pub async fn index_handler(
    State(service): State<SharedService>,
    State(config): State<SharedConfig>,
    Query(inputs): Query<DashboardInputs>,
) -> Response {
    match config.variant(&config.default_variant) {
        Some(variant) => render_dashboard(&service, &config, variant, &inputs).await.into_response(),
        None => {
            warn!(default_variant = %config.default_variant, "Default variant is not configured");
            (StatusCode::NOT_FOUND, "No dashboard configured").into_response()
        }
    }
}

#[instrument(skip(service, config))]
pub async fn dashboard_handler(
    Path(name): Path<String>,
    State(service): State<SharedService>,
    State(config): State<SharedConfig>,
    Query(inputs): Query<DashboardInputs>,
) -> Response {
    let Some(variant) = config.variant(&name) else {
        debug!("Unknown dashboard variant");
        return (StatusCode::NOT_FOUND, format!("Unknown dashboard: {}", name)).into_response();
    };
    render_dashboard(&service, &config, variant, &inputs).await.into_response()
}

pub async fn variants_handler(State(config): State<SharedConfig>) -> impl IntoResponse {
    Json(config.variants.clone())
}

fn lookup_variant<'a>(config: &'a AppConfig, query: &BetaQuery) -> Result<&'a DashboardVariant, BetaError> {
    let name = query.variant.as_deref().unwrap_or(config.default_variant.as_str());
    config
        .variant(name)
        .ok_or_else(|| BetaError::InvalidInput(format!("unknown variant '{}'", name)))
}

#[instrument(skip(service, config))]
pub async fn beta_handler(
    State(service): State<SharedService>,
    State(config): State<SharedConfig>,
    Query(query): Query<BetaQuery>,
) -> Result<Response, BetaError> {
    let variant = lookup_variant(&config, &query)?;
    let request = variant.resolve(&query.inputs())?;
    let analysis = service.analyze(&request).await?;

    info!(
        stock = %request.stock,
        market = %request.benchmark.symbol,
        beta = analysis.fit.beta,
        "Returning beta analysis"
    );
    Ok(Json(analysis.view(variant)).into_response())
}

#[instrument(skip(service, config))]
pub async fn returns_csv_handler(
    State(service): State<SharedService>,
    State(config): State<SharedConfig>,
    Query(query): Query<BetaQuery>,
) -> Result<Response, BetaError> {
    let variant = lookup_variant(&config, &query)?;
    let request = variant.resolve(&query.inputs())?;
    let analysis = service.analyze(&request).await?;
    let body = analysis.aligned.to_csv()?;

    debug!(rows = analysis.aligned.len(), "Returning aligned returns as CSV");
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response())
}

pub async fn health_handler() -> &'static str {
    "ok"
}

/// Builds the full router. `rate_limit` guards the `/api/beta` routes per peer IP,
/// which requires serving with `into_make_service_with_connect_info::<SocketAddr>`.
pub fn build_router(state: AppState, rate_limit: Option<&ApiRateLimit>) -> anyhow::Result<Router> {
    let mut beta_routes = Router::new()
        .route("/api/beta", get(beta_handler))
        .route("/api/beta/returns.csv", get(returns_csv_handler));

    if let Some(limit) = rate_limit {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(limit.per_second)
                .burst_size(limit.burst_size)
                .finish()
                .context("Invalid API rate limit configuration")?,
        );
        beta_routes = beta_routes.layer(GovernorLayer::new(governor_conf));
    }

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/dashboard/{variant}", get(dashboard_handler))
        .route("/api/variants", get(variants_handler))
        .route("/health", get(health_handler))
        .merge(beta_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    Ok(app)
}
