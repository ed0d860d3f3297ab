#![allow(dead_code)]

use beta_dashboard::analysis_service::BetaService;
use beta_dashboard::provider::InMemoryProvider;
use beta_dashboard::returns::PriceSeries;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

/// `count` consecutive weekdays starting at `start` (inclusive when it is a weekday).
pub fn trading_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut date = start;
    while days.len() < count {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(date);
        }
        date = date.succ_opt().expect("date overflow");
    }
    days
}

/// Compound `returns` from a starting price of 100 over `dates`.
/// `dates` must be one longer than `returns`.
pub fn prices_from_returns(symbol: &str, dates: &[NaiveDate], returns: &[f64]) -> PriceSeries {
    assert_eq!(dates.len(), returns.len() + 1);
    let mut price = 100.0;
    let mut points = vec![(dates[0], price)];
    for (date, r) in dates[1..].iter().zip(returns) {
        price *= 1.0 + r;
        points.push((*date, price));
    }
    PriceSeries::from_points(symbol, points)
}

pub fn seeded_returns(seed: u64, count: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.random_range(-0.02..0.02)).collect()
}

/// Stock moving exactly `factor` times the market on every day of 2023's first quarter.
pub fn scaled_pair(stock: &str, market: &str, factor: f64) -> InMemoryProvider {
    let dates = trading_days(NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(), 61);
    let market_returns = seeded_returns(7, 60);
    let stock_returns: Vec<f64> = market_returns.iter().map(|r| factor * r).collect();
    InMemoryProvider::new()
        .with_series(prices_from_returns(market, &dates, &market_returns))
        .with_series(prices_from_returns(stock, &dates, &stock_returns))
}

pub fn service(provider: InMemoryProvider) -> BetaService {
    BetaService::new(Arc::new(provider), Duration::from_secs(5))
}
