use crate::data_structures::{BetaRequest, DashboardVariant, DateWindow};
use crate::error::{BetaError, ErrorBody};
use crate::regression::BetaFit;
use crate::returns::AlignedReturns;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

// --- Interpretation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    Less,
    More,
}

impl Volatility {
    /// A beta of exactly 1.0 is already "more volatile".
    pub fn classify(beta: f64) -> Self {
        if beta < 1.0 { Volatility::Less } else { Volatility::More }
    }

    /// `more_volatile` is the dashboard's chosen emphasis for the "more" case.
    pub fn banner_level(&self, more_volatile: BannerLevel) -> BannerLevel {
        match self {
            Volatility::Less => BannerLevel::Success,
            Volatility::More => more_volatile,
        }
    }

    pub fn message(&self, stock: &str, market_label: &str) -> String {
        match self {
            Volatility::Less => format!("✅ {} is LESS volatile than {}", stock, market_label),
            Volatility::More => format!("⚠️ {} is MORE volatile than {}", stock, market_label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerLevel {
    Success,
    Warning,
    Error,
}

impl BannerLevel {
    fn css_class(&self) -> &'static str {
        match self {
            BannerLevel::Success => "banner success",
            BannerLevel::Warning => "banner warning",
            BannerLevel::Error => "banner error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub level: BannerLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub label: String,
    pub value: f64,
    pub display: String,
}

impl Metric {
    fn new(label: &str, value: f64) -> Self {
        Self {
            label: label.to_string(),
            value,
            display: format_metric(value),
        }
    }
}

pub fn format_metric(value: f64) -> String {
    format!("{:.2}", value)
}

// --- Chart ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub date: NaiveDate,
    pub market: f64,
    pub stock: f64,
}

/// The fitted regression line, taken from the fit rather than re-estimated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitLine {
    pub intercept: f64,
    pub slope: f64,
    pub x_min: f64,
    pub x_max: f64,
}

impl FitLine {
    pub fn y_at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    pub fn endpoints(&self) -> ((f64, f64), (f64, f64)) {
        ((self.x_min, self.y_at(self.x_min)), (self.x_max, self.y_at(self.x_max)))
    }
}

/// Two-sided 95% quantile of the normal distribution.
const Z_95: f64 = 1.959_963_984_540_054;
const BAND_SAMPLES: usize = 25;

/// 95% confidence band of the fitted mean, sampled across the market range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBand {
    pub x: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ConfidenceBand {
    /// `None` when the fit has no slope standard error (two observations).
    fn new(points: &[ScatterPoint], line: &FitLine, beta_std_error: Option<f64>) -> Option<Self> {
        let std_error = beta_std_error.filter(|se| se.is_finite())?;
        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.market).sum::<f64>() / n;
        let var_x = points.iter().map(|p| (p.market - mean_x).powi(2)).sum::<f64>() / n;

        // Var(y_hat(x)) = se_beta^2 * (Var(x) + (x - mean_x)^2)
        let (mut x, mut lower, mut upper) = (Vec::new(), Vec::new(), Vec::new());
        for i in 0..BAND_SAMPLES {
            let xi = line.x_min + (line.x_max - line.x_min) * i as f64 / (BAND_SAMPLES - 1) as f64;
            let half_width = Z_95 * std_error * (var_x + (xi - mean_x).powi(2)).sqrt();
            let yi = line.y_at(xi);
            x.push(xi);
            lower.push(yi - half_width);
            upper.push(yi + half_width);
        }
        Some(Self { x, lower, upper })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ScatterPoint>,
    pub line: FitLine,
    pub band: Option<ConfidenceBand>,
}

impl ChartSpec {
    pub fn new(aligned: &AlignedReturns, fit: &BetaFit) -> Self {
        let points: Vec<ScatterPoint> = aligned
            .dates
            .iter()
            .zip(aligned.pairs())
            .map(|(date, (market, stock))| ScatterPoint {
                date: *date,
                market,
                stock,
            })
            .collect();

        let (x_min, x_max) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.market), hi.max(p.market))
        });

        let line = FitLine {
            intercept: fit.alpha,
            slope: fit.beta,
            x_min,
            x_max,
        };
        let band = ConfidenceBand::new(&points, &line, fit.beta_std_error);

        Self {
            x_label: format!("Market ({})", aligned.market_symbol),
            y_label: format!("Stock ({})", aligned.stock_symbol),
            points,
            line,
            band,
        }
    }
}

// --- Views ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisDetails {
    pub stock: String,
    pub market_symbol: String,
    pub market_label: String,
    pub window: DateWindow,
    pub alpha: f64,
    pub correlation: f64,
    pub beta_std_error: Option<f64>,
    pub observations: usize,
}

/// Everything a successful request shows: two metrics, a banner and the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub heading: String,
    pub metrics: Vec<Metric>,
    pub volatility: Volatility,
    pub banner: Banner,
    pub chart: ChartSpec,
    pub details: AnalysisDetails,
}

impl DashboardView {
    pub fn new(variant: &DashboardVariant, request: &BetaRequest, aligned: &AlignedReturns, fit: &BetaFit) -> Self {
        let volatility = Volatility::classify(fit.beta);
        Self {
            heading: format!("Analysis: {} vs {}", request.stock, request.benchmark.label),
            metrics: vec![
                Metric::new("Beta (Risk)", fit.beta),
                Metric::new(&variant.labels.r_squared, fit.r_squared),
            ],
            volatility,
            banner: Banner {
                level: volatility.banner_level(variant.labels.more_volatile),
                text: volatility.message(&request.stock, &request.benchmark.label),
            },
            chart: ChartSpec::new(aligned, fit),
            details: AnalysisDetails {
                stock: request.stock.clone(),
                market_symbol: request.benchmark.symbol.clone(),
                market_label: request.benchmark.label.clone(),
                window: request.window,
                alpha: fit.alpha,
                correlation: fit.correlation,
                beta_std_error: fit.beta_std_error,
                observations: fit.observations,
            },
        }
    }
}

/// What a failed request shows instead of metrics and chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureView {
    pub banners: Vec<Banner>,
    pub error: ErrorBody,
}

impl FailureView {
    pub fn new(variant: &DashboardVariant, error: &BetaError) -> Self {
        let mut banners = Vec::new();
        if let Some(hint) = &variant.failure_hint {
            banners.push(Banner {
                level: BannerLevel::Warning,
                text: hint.clone(),
            });
        }
        banners.push(Banner {
            level: BannerLevel::Error,
            text: format!("{}: {}", variant.labels.error_prefix, error),
        });
        Self {
            banners,
            error: ErrorBody::from(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DashboardOutcome {
    /// No stock entered yet.
    Idle,
    Ready(Box<DashboardView>),
    Failed(FailureView),
}

// --- Rendering ---

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const SVG_WIDTH: f64 = 640.0;
const SVG_HEIGHT: f64 = 420.0;
const SVG_MARGIN: f64 = 56.0;
const TICKS: usize = 5;

/// Axis range padded by 5% on each side; a zero span gets a unit pad.
fn padded_range(lo: f64, hi: f64) -> (f64, f64) {
    let span = hi - lo;
    let pad = if span > 0.0 { span * 0.05 } else { lo.abs().max(0.01) * 0.5 };
    (lo - pad, hi + pad)
}

/// Scatter of (market, stock) returns with the fitted line in red.
pub fn render_svg(chart: &ChartSpec) -> String {
    let ((lx0, ly0), (lx1, ly1)) = chart.line.endpoints();
    let (x_lo, x_hi) = padded_range(chart.line.x_min, chart.line.x_max);
    let (y_lo, y_hi) = {
        let (lo, hi) = chart
            .points
            .iter()
            .map(|p| p.stock)
            .chain([ly0, ly1])
            .chain(chart.band.iter().flat_map(|b| b.lower.iter().chain(&b.upper).copied()))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
        padded_range(lo, hi)
    };

    let plot_w = SVG_WIDTH - 2.0 * SVG_MARGIN;
    let plot_h = SVG_HEIGHT - 2.0 * SVG_MARGIN;
    let sx = |x: f64| SVG_MARGIN + (x - x_lo) / (x_hi - x_lo) * plot_w;
    let sy = |y: f64| SVG_HEIGHT - SVG_MARGIN - (y - y_lo) / (y_hi - y_lo) * plot_h;

    let mut svg = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}" role="img">"#,
        w = SVG_WIDTH,
        h = SVG_HEIGHT
    );
    let _ = writeln!(
        svg,
        r##"<rect x="{m}" y="{m}" width="{pw}" height="{ph}" fill="#fafafa" stroke="#cccccc"/>"##,
        m = SVG_MARGIN,
        pw = plot_w,
        ph = plot_h
    );

    for i in 0..=TICKS {
        let t = i as f64 / TICKS as f64;
        let xv = x_lo + t * (x_hi - x_lo);
        let yv = y_lo + t * (y_hi - y_lo);
        let _ = writeln!(
            svg,
            r##"<text class="tick" x="{:.1}" y="{:.1}" font-size="10" text-anchor="middle" fill="#555555">{:.1}%</text>"##,
            sx(xv),
            SVG_HEIGHT - SVG_MARGIN + 16.0,
            xv * 100.0
        );
        let _ = writeln!(
            svg,
            r##"<text class="tick" x="{:.1}" y="{:.1}" font-size="10" text-anchor="end" fill="#555555">{:.1}%</text>"##,
            SVG_MARGIN - 6.0,
            sy(yv) + 3.0,
            yv * 100.0
        );
    }

    for p in &chart.points {
        let _ = writeln!(
            svg,
            r##"<circle cx="{:.2}" cy="{:.2}" r="3" fill="#1f77b4" fill-opacity="0.6"><title>{} market {:.2}% stock {:.2}%</title></circle>"##,
            sx(p.market),
            sy(p.stock),
            p.date,
            p.market * 100.0,
            p.stock * 100.0
        );
    }

    if let Some(band) = &chart.band {
        let outline: Vec<String> = band
            .x
            .iter()
            .zip(&band.upper)
            .chain(band.x.iter().zip(&band.lower).rev())
            .map(|(x, y)| format!("{:.2},{:.2}", sx(*x), sy(*y)))
            .collect();
        let _ = writeln!(
            svg,
            r#"<polygon class="band" points="{}" fill="red" fill-opacity="0.15" stroke="none"/>"#,
            outline.join(" ")
        );
    }

    let _ = writeln!(
        svg,
        r#"<line class="fit" x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="red" stroke-width="2"/>"#,
        sx(lx0),
        sy(ly0),
        sx(lx1),
        sy(ly1)
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" font-size="12" text-anchor="middle">{}</text>"#,
        SVG_WIDTH / 2.0,
        SVG_HEIGHT - 12.0,
        escape_html(&chart.x_label)
    );
    let _ = writeln!(
        svg,
        r#"<text x="14" y="{:.1}" font-size="12" text-anchor="middle" transform="rotate(-90 14 {:.1})">{}</text>"#,
        SVG_HEIGHT / 2.0,
        SVG_HEIGHT / 2.0,
        escape_html(&chart.y_label)
    );
    svg.push_str("</svg>\n");
    svg
}

/// Inputs to a full HTML page render.
pub struct DashboardPage<'a> {
    pub variant: &'a DashboardVariant,
    pub variants: &'a [DashboardVariant],
    pub stock_input: &'a str,
    pub market_key: Option<&'a str>,
    pub outcome: &'a DashboardOutcome,
}

const PAGE_STYLE: &str = "body{font-family:sans-serif;max-width:760px;margin:2em auto;color:#222}\
nav a{margin-right:1em}\
form{display:flex;gap:1em;align-items:end;margin:1em 0}\
label{display:flex;flex-direction:column;font-size:.9em}\
.metrics{display:flex;gap:3em;margin:1em 0}\
.metric .label{font-size:.9em;color:#555}.metric .value{font-size:2em}\
.banner{padding:.75em 1em;border-radius:4px;margin:.5em 0}\
.success{background:#e6f4ea}.warning{background:#fff4e5}.error{background:#fdecea}\
table.details td{padding:.1em 1em .1em 0;font-size:.9em}";

fn render_banner(out: &mut String, banner: &Banner) {
    let _ = writeln!(
        out,
        r#"<div class="{}">{}</div>"#,
        banner.level.css_class(),
        escape_html(&banner.text)
    );
}

fn render_form(out: &mut String, page: &DashboardPage<'_>) {
    let variant = page.variant;
    let _ = writeln!(
        out,
        r#"<form method="get" action="/dashboard/{}">"#,
        escape_html(&variant.name)
    );
    let _ = writeln!(
        out,
        r#"<label>Enter Stock Ticker<input type="text" name="stock" value="{}"></label>"#,
        escape_html(page.stock_input)
    );
    if variant.market.is_selectable() {
        let selected_key = page
            .market_key
            .or_else(|| variant.market.choices().first().map(|b| b.key.as_str()));
        let _ = writeln!(out, r#"<label>Select The Market<select name="market">"#);
        for benchmark in variant.market.choices() {
            let selected = if Some(benchmark.key.as_str()) == selected_key { " selected" } else { "" };
            let _ = writeln!(
                out,
                r#"<option value="{}"{}>{}</option>"#,
                escape_html(&benchmark.key),
                selected,
                escape_html(&benchmark.label)
            );
        }
        out.push_str("</select></label>\n");
    }
    out.push_str("<button type=\"submit\">Analyze</button>\n</form>\n");
}

fn render_view(out: &mut String, view: &DashboardView) {
    let _ = writeln!(out, "<h3>{}</h3>", escape_html(&view.heading));
    out.push_str("<div class=\"metrics\">\n");
    for metric in &view.metrics {
        let _ = writeln!(
            out,
            r#"<div class="metric"><div class="label">{}</div><div class="value">{}</div></div>"#,
            escape_html(&metric.label),
            metric.display
        );
    }
    out.push_str("</div>\n");
    render_banner(out, &view.banner);

    out.push_str("<h4>Regression Plot</h4>\n");
    out.push_str(&render_svg(&view.chart));

    let details = &view.details;
    let std_error = details
        .beta_std_error
        .map(format_metric)
        .unwrap_or_else(|| "n/a".to_string());
    let _ = writeln!(
        out,
        "<table class=\"details\">\
<tr><td>Benchmark</td><td>{} ({})</td></tr>\
<tr><td>Window</td><td>{} to {}</td></tr>\
<tr><td>Observations</td><td>{}</td></tr>\
<tr><td>Alpha (daily)</td><td>{:.5}</td></tr>\
<tr><td>Correlation</td><td>{}</td></tr>\
<tr><td>Beta std. error</td><td>{}</td></tr></table>",
        escape_html(&details.market_label),
        escape_html(&details.market_symbol),
        details.window.start,
        details.window.end,
        details.observations,
        details.alpha,
        format_metric(details.correlation),
        std_error
    );
}

pub fn render_page(page: &DashboardPage<'_>) -> String {
    let variant = page.variant;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head>\n<body>",
        escape_html(&variant.title),
        PAGE_STYLE
    );

    if page.variants.len() > 1 {
        out.push_str("<nav>");
        for other in page.variants {
            let _ = write!(
                out,
                r#"<a href="/dashboard/{}">{}</a>"#,
                escape_html(&other.name),
                escape_html(&other.title)
            );
        }
        out.push_str("</nav>\n");
    }

    let _ = writeln!(out, "<h1>{}</h1>", escape_html(&variant.title));
    let _ = writeln!(out, "<p>{}</p>", escape_html(&variant.subtitle));
    render_form(&mut out, page);

    match page.outcome {
        DashboardOutcome::Idle => {}
        DashboardOutcome::Ready(view) => render_view(&mut out, view),
        DashboardOutcome::Failed(failure) => {
            for banner in &failure.banners {
                render_banner(&mut out, banner);
            }
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{Benchmark, DashboardInputs};
    use crate::regression::fit_beta;

    fn sample() -> (BetaRequest, AlignedReturns, BetaFit) {
        let request = DashboardVariant::pro()
            .resolve(&DashboardInputs {
                stock: Some("comi.ca".to_string()),
                market: Some("egypt".to_string()),
            })
            .unwrap();
        let aligned = AlignedReturns {
            stock_symbol: "COMI.CA".to_string(),
            market_symbol: "^CASE30".to_string(),
            dates: (2..=5).map(|d| NaiveDate::from_ymd_opt(2023, 5, d).unwrap()).collect(),
            stock: vec![0.012, -0.004, 0.02, -0.01],
            market: vec![0.01, -0.005, 0.015, -0.008],
        };
        let fit = fit_beta(&aligned.market, &aligned.stock).unwrap();
        (request, aligned, fit)
    }

    #[test]
    fn test_classification_boundary() {
        assert_eq!(Volatility::classify(0.99), Volatility::Less);
        assert_eq!(Volatility::classify(1.0), Volatility::More);
        assert_eq!(Volatility::classify(1.5), Volatility::More);
        assert_eq!(Volatility::classify(-0.3), Volatility::Less);
        assert_eq!(Volatility::More.banner_level(BannerLevel::Warning), BannerLevel::Warning);
        assert_eq!(Volatility::More.banner_level(BannerLevel::Error), BannerLevel::Error);
        assert_eq!(Volatility::Less.banner_level(BannerLevel::Error), BannerLevel::Success);
    }

    #[test]
    fn test_format_two_decimals() {
        assert_eq!(format_metric(1.23456), "1.23");
        assert_eq!(format_metric(0.005), "0.01");
        assert_eq!(format_metric(2.0), "2.00");
        assert_eq!(format_metric(-0.4), "-0.40");
    }

    #[test]
    fn test_chart_line_is_the_fit() {
        let (_, aligned, fit) = sample();
        let chart = ChartSpec::new(&aligned, &fit);
        assert_eq!(chart.points.len(), 4);
        assert_eq!(chart.line.slope, fit.beta);
        assert_eq!(chart.line.intercept, fit.alpha);
        assert_eq!(chart.line.x_min, -0.008);
        assert_eq!(chart.line.x_max, 0.015);
        let ((x0, y0), (x1, y1)) = chart.line.endpoints();
        assert_eq!(y0, fit.predict(x0));
        assert_eq!(y1, fit.predict(x1));
    }

    #[test]
    fn test_band_surrounds_the_line() {
        let (_, aligned, fit) = sample();
        let chart = ChartSpec::new(&aligned, &fit);
        let band = chart.band.expect("four points give a standard error");
        assert_eq!(band.x.len(), BAND_SAMPLES);
        assert_eq!(band.x[0], chart.line.x_min);
        assert!((band.x[BAND_SAMPLES - 1] - chart.line.x_max).abs() < 1e-15);

        let widths: Vec<f64> = band.upper.iter().zip(&band.lower).map(|(u, l)| u - l).collect();
        for ((x, lower), upper) in band.x.iter().zip(&band.lower).zip(&band.upper) {
            let mid = chart.line.y_at(*x);
            assert!(*lower < mid && mid < *upper);
            assert!(((upper - mid) - (mid - lower)).abs() < 1e-12);
        }
        // Narrowest near the mean market return, widest at an end.
        let narrowest = widths.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(narrowest < widths[0] && narrowest < widths[BAND_SAMPLES - 1]);
    }

    #[test]
    fn test_no_band_for_two_points() {
        let aligned = AlignedReturns {
            stock_symbol: "TM".to_string(),
            market_symbol: "^GSPC".to_string(),
            dates: (2..=3).map(|d| NaiveDate::from_ymd_opt(2023, 5, d).unwrap()).collect(),
            stock: vec![0.02, 0.01],
            market: vec![0.01, 0.03],
        };
        let fit = fit_beta(&aligned.market, &aligned.stock).unwrap();
        let chart = ChartSpec::new(&aligned, &fit);
        assert_eq!(chart.band, None);
        assert!(!render_svg(&chart).contains(r#"class="band""#));
    }

    #[test]
    fn test_view_metrics_and_message() {
        let (request, aligned, fit) = sample();
        let view = DashboardView::new(&DashboardVariant::pro(), &request, &aligned, &fit);
        assert_eq!(view.heading, "Analysis: COMI.CA vs Egypt Market (EGX 30)");
        assert_eq!(view.metrics[0].label, "Beta (Risk)");
        assert_eq!(view.metrics[1].label, "Correlation (R²)");
        assert_eq!(view.metrics[0].display, format!("{:.2}", fit.beta));
        assert_eq!(view.metrics[1].display, format!("{:.2}", fit.r_squared));
        assert_eq!(view.volatility, Volatility::classify(fit.beta));
        assert!(view.banner.text.contains("COMI.CA"));
        assert!(view.banner.text.contains("Egypt Market (EGX 30)"));
        assert_eq!(view.details.observations, 4);
    }

    #[test]
    fn test_failure_view_has_hint_and_error() {
        let err = BetaError::data_unavailable("^CASE30", "no data");
        let failure = FailureView::new(&DashboardVariant::pro(), &err);
        assert_eq!(failure.banners.len(), 2);
        assert_eq!(failure.banners[0].level, BannerLevel::Warning);
        assert_eq!(failure.banners[1].text, "Technical Error: data unavailable for ^CASE30: no data");

        let failure = FailureView::new(&DashboardVariant::basic(), &err);
        assert_eq!(failure.banners.len(), 1);
        assert_eq!(failure.banners[0].text, "Detailed Error: data unavailable for ^CASE30: no data");
        assert_eq!(failure.error.kind, "data_unavailable");
    }

    #[test]
    fn test_svg_draws_points_and_red_line() {
        let (_, aligned, fit) = sample();
        let svg = render_svg(&ChartSpec::new(&aligned, &fit));
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<circle").count(), 4);
        assert_eq!(svg.matches(r#"<line class="fit""#).count(), 1);
        assert!(svg.contains(r#"stroke="red""#));
        assert_eq!(svg.matches(r#"<polygon class="band""#).count(), 1);
        assert!(svg.contains("Market (^CASE30)"));
    }

    #[test]
    fn test_page_escapes_input_and_hides_output_on_failure() {
        let variants = DashboardVariant::builtin();
        let err = BetaError::data_unavailable("<B>", "symbol not found");
        let outcome = DashboardOutcome::Failed(FailureView::new(&variants[0], &err));
        let html = render_page(&DashboardPage {
            variant: &variants[0],
            variants: &variants,
            stock_input: "<b>",
            market_key: Some("egypt"),
            outcome: &outcome,
        });
        assert!(html.contains(r#"value="&lt;b&gt;""#));
        assert!(!html.contains("<b>"));
        assert!(html.contains(r#"<option value="egypt" selected>"#));
        assert!(html.contains("Technical Error"));
        assert!(!html.contains("<svg"));
        assert!(!html.contains("Beta (Risk)"));
    }

    #[test]
    fn test_page_renders_view() {
        let variants = vec![DashboardVariant::basic()];
        let (mut request, aligned, fit) = sample();
        request.benchmark = Benchmark::new("us", "the market", "^GSPC");
        let outcome = DashboardOutcome::Ready(Box::new(DashboardView::new(&variants[0], &request, &aligned, &fit)));
        let html = render_page(&DashboardPage {
            variant: &variants[0],
            variants: &variants,
            stock_input: "COMI.CA",
            market_key: None,
            outcome: &outcome,
        });
        assert!(html.contains("Beta (Risk)"));
        assert!(html.contains("<svg"));
        assert!(!html.contains("<select"));
        assert!(!html.contains("<nav>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a&b<"c">'"#), "a&amp;b&lt;&quot;c&quot;&gt;&#39;");
    }
}
