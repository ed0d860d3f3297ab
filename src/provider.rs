use crate::data_structures::DateWindow;
use crate::error::BetaError;
use crate::returns::PriceSeries;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;

/// Source of daily closing prices.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Closing prices of one symbol inside `window`.
    async fn fetch_close_series(&self, symbol: &str, window: &DateWindow) -> Result<PriceSeries, BetaError>;

    /// Closing prices for every requested symbol, keyed by the symbol string
    /// exactly as requested. Duplicate symbols are fetched once.
    async fn fetch_closes(
        &self,
        symbols: &[String],
        window: &DateWindow,
    ) -> Result<HashMap<String, PriceSeries>, BetaError> {
        let mut unique: Vec<&String> = symbols.iter().collect();
        unique.sort();
        unique.dedup();

        let fetched = try_join_all(unique.iter().map(|symbol| async move {
            let series = self.fetch_close_series(symbol, window).await?;
            Ok::<_, BetaError>(((*symbol).clone(), series))
        }))
        .await?;

        Ok(fetched.into_iter().collect())
    }
}

/// Fixture provider serving prepared series, used by tests and offline demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<String, PriceSeries>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.symbol.clone(), series);
        self
    }
}

#[async_trait]
impl PriceProvider for InMemoryProvider {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn fetch_close_series(&self, symbol: &str, window: &DateWindow) -> Result<PriceSeries, BetaError> {
        let stored = self
            .series
            .get(symbol)
            .ok_or_else(|| BetaError::data_unavailable(symbol, "symbol not found"))?;

        let series = PriceSeries::from_points(
            symbol,
            stored.iter().filter(|(date, _)| window.contains(*date)),
        );
        if series.is_empty() {
            return Err(BetaError::data_unavailable(symbol, "no prices in window"));
        }
        Ok(series)
    }
}
