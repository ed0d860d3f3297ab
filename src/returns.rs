use crate::error::BetaError;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Daily closing prices of one symbol, ordered by trading date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    pub symbol: String,
    closes: BTreeMap<NaiveDate, f64>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            closes: BTreeMap::new(),
        }
    }

    /// Build a series from `(date, close)` pairs. Later duplicates win;
    /// non-finite or non-positive closes are skipped.
    pub fn from_points<I>(symbol: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut series = Self::new(symbol);
        for (date, close) in points {
            series.insert(date, close);
        }
        series
    }

    /// Returns false when the close was rejected as missing.
    pub fn insert(&mut self, date: NaiveDate, close: f64) -> bool {
        if !close.is_finite() || close <= 0.0 {
            return false;
        }
        self.closes.insert(date, close);
        true
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.closes.iter().map(|(d, c)| (*d, *c))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.closes.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.closes.keys().next_back().copied()
    }
}

/// Percentage change between consecutive observations of a price series.
///
/// Each entry is keyed by the later date of its pair. `None` marks a return
/// that could not be computed and is dropped during alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub symbol: String,
    returns: BTreeMap<NaiveDate, Option<f64>>,
}

impl ReturnSeries {
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.returns.get(&date).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.returns.iter().map(|(d, r)| (*d, *r))
    }
}

pub fn pct_change(prices: &PriceSeries) -> Result<ReturnSeries, BetaError> {
    if prices.len() < 2 {
        return Err(BetaError::insufficient(prices.symbol.clone(), prices.len()));
    }

    let returns = prices
        .closes
        .iter()
        .zip(prices.closes.iter().skip(1))
        .map(|((_, prev), (date, close))| {
            let change = (close - prev) / prev;
            (*date, change.is_finite().then_some(change))
        })
        .collect();

    Ok(ReturnSeries {
        symbol: prices.symbol.clone(),
        returns,
    })
}

/// Stock and market returns on a shared, strictly increasing date index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedReturns {
    pub stock_symbol: String,
    pub market_symbol: String,
    pub dates: Vec<NaiveDate>,
    pub stock: Vec<f64>,
    pub market: Vec<f64>,
}

impl AlignedReturns {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// `(market, stock)` pairs in date order, the regression's (x, y).
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.market.iter().copied().zip(self.stock.iter().copied())
    }

    pub fn to_csv(&self) -> Result<String, BetaError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let csv_error = |e: csv::Error| BetaError::InvalidInput(format!("csv export failed: {}", e));

        writer
            .write_record(["date", self.stock_symbol.as_str(), self.market_symbol.as_str()])
            .map_err(csv_error)?;
        for ((date, stock), market) in self.dates.iter().zip(&self.stock).zip(&self.market) {
            writer
                .write_record([date.format("%Y-%m-%d").to_string(), stock.to_string(), market.to_string()])
                .map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| BetaError::InvalidInput(format!("csv export failed: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| BetaError::InvalidInput(format!("csv export failed: {}", e)))
    }
}

/// Compute daily returns of both series, keep only dates where both have a
/// defined return, and require at least two such dates.
pub fn align_returns(stock: &PriceSeries, market: &PriceSeries) -> Result<AlignedReturns, BetaError> {
    let stock_returns = pct_change(stock)?;
    let market_returns = pct_change(market)?;

    let mut aligned = AlignedReturns {
        stock_symbol: stock.symbol.clone(),
        market_symbol: market.symbol.clone(),
        dates: Vec::new(),
        stock: Vec::new(),
        market: Vec::new(),
    };

    for (date, stock_return) in stock_returns.iter() {
        let (Some(stock_return), Some(market_return)) = (stock_return, market_returns.get(date)) else {
            continue;
        };
        aligned.dates.push(date);
        aligned.stock.push(stock_return);
        aligned.market.push(market_return);
    }

    tracing::debug!(
        stock = %stock.symbol,
        market = %market.symbol,
        stock_prices = stock.len(),
        market_prices = market.len(),
        aligned = aligned.len(),
        "Aligned daily returns"
    );

    if aligned.len() < 2 {
        return Err(BetaError::insufficient("aligned returns", aligned.len()));
    }
    Ok(aligned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, d).unwrap()
    }

    fn series(symbol: &str, points: &[(u32, f64)]) -> PriceSeries {
        PriceSeries::from_points(symbol, points.iter().map(|(d, c)| (day(*d), *c)))
    }

    fn round4(v: f64) -> f64 {
        (v * 10_000.0).round() / 10_000.0
    }

    #[test]
    fn test_pct_change_length_and_values() {
        let prices = series("TM", &[(1, 100.0), (2, 101.0), (3, 102.0), (6, 100.0)]);
        let returns = pct_change(&prices).unwrap();
        assert_eq!(returns.len(), prices.len() - 1);

        let values: Vec<f64> = returns.iter().map(|(_, r)| round4(r.unwrap())).collect();
        assert_eq!(values, vec![0.01, 0.0099, -0.0196]);
        assert_eq!(returns.get(day(1)), None);
        assert!(returns.get(day(2)).is_some());
    }

    #[test]
    fn test_pct_change_needs_two_prices() {
        let err = pct_change(&series("TM", &[(1, 100.0)])).unwrap_err();
        assert_eq!(err, BetaError::insufficient("TM", 1));
        assert!(pct_change(&PriceSeries::new("TM")).is_err());
    }

    #[test]
    fn test_missing_closes_are_rejected() {
        let mut prices = PriceSeries::new("RMDA.CA");
        assert!(prices.insert(day(1), 10.0));
        assert!(!prices.insert(day(2), f64::NAN));
        assert!(!prices.insert(day(3), 0.0));
        assert!(!prices.insert(day(4), -1.0));
        assert_eq!(prices.len(), 1);
    }

    #[test]
    fn test_align_matching_dates() {
        let stock = series("STK", &[(1, 100.0), (2, 101.0), (3, 102.0), (6, 100.0)]);
        let market = series("MKT", &[(1, 100.0), (2, 102.0), (3, 101.0), (6, 99.0)]);
        let aligned = align_returns(&stock, &market).unwrap();

        assert_eq!(aligned.dates, vec![day(2), day(3), day(6)]);
        let stock_ret: Vec<f64> = aligned.stock.iter().copied().map(round4).collect();
        let market_ret: Vec<f64> = aligned.market.iter().copied().map(round4).collect();
        assert_eq!(stock_ret, vec![0.01, 0.0099, -0.0196]);
        assert_eq!(market_ret, vec![0.02, -0.0098, -0.0198]);
    }

    #[test]
    fn test_aligned_returns_feed_the_regression() {
        let stock = series("STK", &[(1, 100.0), (2, 101.0), (3, 102.0), (6, 100.0)]);
        let market = series("MKT", &[(1, 100.0), (2, 102.0), (3, 101.0), (6, 99.0)]);
        let aligned = align_returns(&stock, &market).unwrap();

        let fit = crate::regression::fit_beta(&aligned.market, &aligned.stock).unwrap();
        assert_eq!(fit.observations, 3);
        assert!(fit.beta.is_finite());
        assert!((0.0..=1.0).contains(&fit.r_squared));
        assert!((fit.beta - 0.5739).abs() < 1e-4, "beta = {}", fit.beta);
        assert!((fit.r_squared - 0.4849).abs() < 1e-4, "r_squared = {}", fit.r_squared);
    }

    #[test]
    fn test_align_drops_trading_gaps() {
        // Market closed on the 3rd, stock closed on the 7th.
        let stock = series("STK", &[(1, 10.0), (2, 11.0), (3, 12.0), (6, 12.5), (8, 13.0)]);
        let market = series("MKT", &[(1, 100.0), (2, 101.0), (6, 103.0), (7, 104.0), (8, 102.0)]);
        let aligned = align_returns(&stock, &market).unwrap();

        assert_eq!(aligned.dates, vec![day(2), day(6), day(8)]);
        assert_eq!(aligned.stock.len(), aligned.market.len());
        // The market return on the 6th spans its own gap (2nd -> 6th).
        assert!((aligned.market[1] - (103.0 - 101.0) / 101.0).abs() < 1e-12);
        assert!(aligned.dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_align_requires_two_rows() {
        let stock = series("STK", &[(1, 10.0), (2, 11.0), (3, 12.0)]);
        let market = series("MKT", &[(2, 100.0), (3, 101.0)]);
        let err = align_returns(&stock, &market).unwrap_err();
        assert_eq!(err, BetaError::insufficient("aligned returns", 1));

        let disjoint = series("MKT", &[(10, 100.0), (11, 101.0), (12, 99.0)]);
        let err = align_returns(&stock, &disjoint).unwrap_err();
        assert_eq!(err, BetaError::insufficient("aligned returns", 0));
    }

    #[test]
    fn test_align_short_input_fails_before_join() {
        let stock = series("STK", &[(1, 10.0)]);
        let market = series("MKT", &[(1, 100.0), (2, 101.0), (3, 99.0)]);
        let err = align_returns(&stock, &market).unwrap_err();
        assert_eq!(err, BetaError::insufficient("STK", 1));
    }

    #[test]
    fn test_csv_export() {
        let stock = series("STK", &[(1, 100.0), (2, 110.0), (3, 99.0)]);
        let market = series("MKT", &[(1, 100.0), (2, 105.0), (3, 105.0)]);
        let csv = align_returns(&stock, &market).unwrap().to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("date,STK,MKT"));
        assert!(lines.next().unwrap().starts_with("2023-03-02,0.1"));
        assert_eq!(lines.count(), 1);
    }
}
