use crate::error::BetaError;
use serde::Serialize;

/// Ordinary least squares fit of `stock = alpha + beta * market + noise`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BetaFit {
    pub alpha: f64,
    pub beta: f64,
    /// Coefficient of determination, clamped to [0, 1].
    pub r_squared: f64,
    /// Pearson correlation of market and stock returns.
    pub correlation: f64,
    /// Standard error of the slope; undefined with only two observations.
    pub beta_std_error: Option<f64>,
    pub observations: usize,
}

impl BetaFit {
    pub fn predict(&self, market_return: f64) -> f64 {
        self.alpha + self.beta * market_return
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// True when the variance of `values` is zero or lost in rounding noise.
fn is_degenerate(values: &[f64], sum_sq_dev: f64) -> bool {
    let first = values[0];
    if values.iter().all(|v| *v == first) {
        return true;
    }
    // Compare standard deviations, not squares, so huge inputs cannot overflow the bound.
    let scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    (sum_sq_dev / values.len() as f64).sqrt() <= f64::EPSILON * scale
}

/// Regress `stock` on `market` by closed-form least squares.
pub fn fit_beta(market: &[f64], stock: &[f64]) -> Result<BetaFit, BetaError> {
    if market.len() != stock.len() {
        return Err(BetaError::InvalidInput(format!(
            "market has {} returns but stock has {}",
            market.len(),
            stock.len()
        )));
    }
    let n = market.len();
    if n < 2 {
        return Err(BetaError::insufficient("regression input", n));
    }
    if market.iter().chain(stock).any(|v| !v.is_finite()) {
        return Err(BetaError::DegenerateInput("returns contain non-finite values".to_string()));
    }

    let mean_x = mean(market);
    let mean_y = mean(stock);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in market.iter().zip(stock) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if !(sxx.is_finite() && syy.is_finite() && sxy.is_finite()) {
        return Err(BetaError::DegenerateInput(
            "returns are too large, sums of squares overflowed".to_string(),
        ));
    }

    if is_degenerate(market, sxx) {
        return Err(BetaError::DegenerateInput(
            "market returns have zero variance, beta is undefined".to_string(),
        ));
    }

    let beta = sxy / sxx;
    let alpha = mean_y - beta * mean_x;

    let ss_res: f64 = market
        .iter()
        .zip(stock)
        .map(|(x, y)| {
            let residual = y - (alpha + beta * x);
            residual * residual
        })
        .sum();

    let (r_squared, correlation) = if !is_degenerate(stock, syy) {
        let r_squared = (1.0 - ss_res / syy).clamp(0.0, 1.0);
        let correlation = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);
        (r_squared, correlation)
    } else {
        // Constant stock returns: nothing to explain.
        (0.0, 0.0)
    };

    let beta_std_error = (n > 2).then(|| (ss_res / (n - 2) as f64 / sxx).sqrt());

    if !(alpha.is_finite() && beta.is_finite() && r_squared.is_finite() && correlation.is_finite()) {
        return Err(BetaError::DegenerateInput(
            "regression overflowed for this input".to_string(),
        ));
    }

    Ok(BetaFit {
        alpha,
        beta,
        r_squared,
        correlation,
        beta_std_error,
        observations: n,
    })
}
