use crate::error::BetaError;
use crate::presentation::BannerLevel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// --- Benchmarks ---

/// A market index the stock is regressed against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benchmark {
    /// Stable key used in query strings, e.g. "us".
    pub key: String,
    /// Display name, e.g. "US Market (S&P 500)".
    pub label: String,
    /// Provider symbol, e.g. "^GSPC".
    pub symbol: String,
}

impl Benchmark {
    pub fn new(key: &str, label: &str, symbol: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            symbol: symbol.to_string(),
        }
    }

    pub fn us_sp500() -> Self {
        Self::new("us", "US Market (S&P 500)", "^GSPC")
    }

    pub fn egypt_egx30() -> Self {
        Self::new("egypt", "Egypt Market (EGX 30)", "^CASE30")
    }
}

/// How a dashboard picks its benchmark.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MarketSelection {
    Fixed { benchmark: Benchmark },
    Selectable { choices: Vec<Benchmark> },
}

impl MarketSelection {
    pub fn choices(&self) -> &[Benchmark] {
        match self {
            MarketSelection::Fixed { benchmark } => std::slice::from_ref(benchmark),
            MarketSelection::Selectable { choices } => choices,
        }
    }

    pub fn is_selectable(&self) -> bool {
        matches!(self, MarketSelection::Selectable { .. })
    }

    /// Resolve a market key; `None` picks the first choice.
    pub fn resolve(&self, key: Option<&str>) -> Result<&Benchmark, BetaError> {
        let choices = self.choices();
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            None => choices
                .first()
                .ok_or_else(|| BetaError::InvalidInput("no benchmark configured".to_string())),
            Some(key) => {
                if let MarketSelection::Fixed { benchmark } = self {
                    // A fixed market ignores selection except for its own key.
                    if benchmark.key != key {
                        return Err(BetaError::InvalidInput(format!(
                            "market '{}' is fixed to '{}'",
                            key, benchmark.key
                        )));
                    }
                    return Ok(benchmark);
                }
                choices
                    .iter()
                    .find(|b| b.key == key)
                    .ok_or_else(|| BetaError::InvalidInput(format!("unknown market '{}'", key)))
            }
        }
    }
}

// --- Date window ---

/// Half-open range of calendar dates `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, BetaError> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, BetaError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| BetaError::InvalidInput(format!("invalid date '{}': {}", s, e)))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn validate(&self) -> Result<(), BetaError> {
        if self.start >= self.end {
            return Err(BetaError::InvalidInput(format!(
                "window start {} must be before end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

// --- Dashboard variants ---

/// One configuration of the dashboard pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardVariant {
    pub name: String,
    pub title: String,
    pub subtitle: String,
    pub default_stock: String,
    pub market: MarketSelection,
    pub window: DateWindow,
    /// Extra warning shown above the technical error when a request fails.
    #[serde(default)]
    pub failure_hint: Option<String>,
    #[serde(default)]
    pub labels: DashboardLabels,
}

/// Wording and emphasis that differ between dashboards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardLabels {
    pub r_squared: String,
    /// Banner level for a stock more volatile than its benchmark.
    pub more_volatile: BannerLevel,
    pub error_prefix: String,
}

impl Default for DashboardLabels {
    fn default() -> Self {
        Self {
            r_squared: "Correlation (R²)".to_string(),
            more_volatile: BannerLevel::Error,
            error_prefix: "Technical Error".to_string(),
        }
    }
}

impl DashboardVariant {
    /// Selectable US/Egypt benchmark with a two-year window for thin markets.
    pub fn pro() -> Self {
        Self {
            name: "pro".to_string(),
            title: "Pro Financial Dashboard".to_string(),
            subtitle: "Analyze stock risk (Beta) against specific Country Benchmarks.".to_string(),
            default_stock: "RMDA.CA".to_string(),
            market: MarketSelection::Selectable {
                choices: vec![Benchmark::us_sp500(), Benchmark::egypt_egx30()],
            },
            window: PRO_WINDOW,
            failure_hint: Some(
                "Could not fetch data. Note: Some Egyptian tickers (EGX 30) have gaps in Yahoo Finance data."
                    .to_string(),
            ),
            labels: DashboardLabels::default(),
        }
    }

    /// Fixed S&P 500 benchmark over one year.
    pub fn basic() -> Self {
        Self {
            name: "basic".to_string(),
            title: "Financial Dashboard".to_string(),
            subtitle: "Analyze stock risk factors (Beta).".to_string(),
            default_stock: "TM".to_string(),
            market: MarketSelection::Fixed {
                benchmark: Benchmark::new("us", "the market", "^GSPC"),
            },
            window: BASIC_WINDOW,
            failure_hint: None,
            labels: DashboardLabels {
                r_squared: "R-Squared (Correlation)".to_string(),
                more_volatile: BannerLevel::Warning,
                error_prefix: "Detailed Error".to_string(),
            },
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::pro(), Self::basic()]
    }

    pub fn validate(&self) -> Result<(), BetaError> {
        if self.name.trim().is_empty() {
            return Err(BetaError::InvalidInput("variant name is empty".to_string()));
        }
        if self.market.choices().is_empty() {
            return Err(BetaError::InvalidInput(format!(
                "variant '{}' has no benchmark",
                self.name
            )));
        }
        self.window.validate()
    }

    /// Stock symbol the page starts with when no input was submitted.
    pub fn stock_input(&self, inputs: &DashboardInputs) -> String {
        inputs
            .stock
            .clone()
            .unwrap_or_else(|| self.default_stock.clone())
    }

    /// Turn raw widget values into a request. An empty stock symbol is rejected.
    pub fn resolve(&self, inputs: &DashboardInputs) -> Result<BetaRequest, BetaError> {
        let stock = normalize_symbol(&self.stock_input(inputs));
        if stock.is_empty() {
            return Err(BetaError::InvalidInput("stock symbol is empty".to_string()));
        }
        let benchmark = self.market.resolve(inputs.market.as_deref())?.clone();
        Ok(BetaRequest {
            stock,
            benchmark,
            window: self.window,
        })
    }
}

// Evaluated at compile time, so a bad literal fails the build.
const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => panic!("invalid built-in date"),
    }
}

const PRO_WINDOW: DateWindow = DateWindow {
    start: ymd(2022, 1, 1),
    end: ymd(2024, 1, 1),
};

const BASIC_WINDOW: DateWindow = DateWindow {
    start: ymd(2023, 1, 1),
    end: ymd(2024, 1, 1),
};

pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Raw widget values as submitted by the page or the API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardInputs {
    pub stock: Option<String>,
    pub market: Option<String>,
}

/// A fully resolved analysis request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BetaRequest {
    pub stock: String,
    pub benchmark: Benchmark,
    pub window: DateWindow,
}
