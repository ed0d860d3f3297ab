use crate::data_structures::{BetaRequest, DashboardInputs, DashboardVariant, normalize_symbol};
use crate::error::BetaError;
use crate::presentation::{DashboardOutcome, DashboardView, FailureView};
use crate::provider::PriceProvider;
use crate::regression::{BetaFit, fit_beta};
use crate::returns::{AlignedReturns, align_returns};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Result of one successful pipeline run.
#[derive(Debug, Clone)]
pub struct BetaAnalysis {
    pub request: BetaRequest,
    pub aligned: AlignedReturns,
    pub fit: BetaFit,
}

impl BetaAnalysis {
    pub fn view(&self, variant: &DashboardVariant) -> DashboardView {
        DashboardView::new(variant, &self.request, &self.aligned, &self.fit)
    }
}

/// Runs fetch -> align -> regress for one request. Holds no per-request state.
pub struct BetaService {
    provider: Arc<dyn PriceProvider>,
    fetch_timeout: Duration,
}

impl BetaService {
    pub fn new(provider: Arc<dyn PriceProvider>, fetch_timeout: Duration) -> Self {
        Self {
            provider,
            fetch_timeout,
        }
    }

    #[instrument(skip(self, request), fields(stock = %request.stock, market = %request.benchmark.symbol, provider = self.provider.name()))]
    pub async fn analyze(&self, request: &BetaRequest) -> Result<BetaAnalysis, BetaError> {
        let symbols = vec![request.stock.clone(), request.benchmark.symbol.clone()];

        let closes = tokio::time::timeout(self.fetch_timeout, self.provider.fetch_closes(&symbols, &request.window))
            .await
            .map_err(|_| {
                BetaError::data_unavailable(
                    symbols.join(", "),
                    format!("retrieval timed out after {}s", self.fetch_timeout.as_secs()),
                )
            })??;

        // Always look series up by the requested symbol, never by position.
        let series_for = |symbol: &str| {
            closes
                .get(symbol)
                .cloned()
                .ok_or_else(|| BetaError::data_unavailable(symbol, "provider returned no series"))
        };
        let stock_prices = series_for(&request.stock)?;
        let market_prices = series_for(&request.benchmark.symbol)?;

        let aligned = align_returns(&stock_prices, &market_prices)?;
        let fit = fit_beta(&aligned.market, &aligned.stock)?;

        info!(
            beta = fit.beta,
            r_squared = fit.r_squared,
            observations = fit.observations,
            "Computed beta"
        );

        Ok(BetaAnalysis {
            request: request.clone(),
            aligned,
            fit,
        })
    }

    /// One stateless dashboard refresh: widget values in, what to display out.
    pub async fn render(&self, variant: &DashboardVariant, inputs: &DashboardInputs) -> DashboardOutcome {
        if normalize_symbol(&variant.stock_input(inputs)).is_empty() {
            return DashboardOutcome::Idle;
        }

        let result = match variant.resolve(inputs) {
            Ok(request) => self.analyze(&request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(analysis) => DashboardOutcome::Ready(Box::new(analysis.view(variant))),
            Err(e) => {
                warn!(variant = %variant.name, kind = e.kind(), error = %e, "Dashboard request failed");
                DashboardOutcome::Failed(FailureView::new(variant, &e))
            }
        }
    }
}
