use crate::analysis::align::align_closes;
use crate::analysis::returns::daily_returns;
use crate::data_structures::PriceSample;
use serde::Serialize;

/// Minimum aligned sample count the API requires before it will show a beta
/// to a user. The estimator itself computes from 2 samples upward; this
/// threshold is display policy, applied at the handler.
pub const MIN_DATA_POINTS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UndefinedReason {
    /// Mismatched series lengths or fewer than 2 paired samples.
    InsufficientData,
    /// The index did not move at all over the window.
    ZeroMarketVariance,
}

/// Outcome of the raw estimation, before display policy is applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BetaEstimate {
    Computed { beta: f64, correlation: f64 },
    Undefined(UndefinedReason),
}

/// Beta and Pearson correlation of two paired return series.
///
/// Sample covariance and variances use Bessel's correction (N-1 denominator),
/// matching the standard finance convention. Never panics: every degenerate
/// input is reported as `Undefined` rather than an error or a NaN.
pub fn estimate(stock_returns: &[f64], market_returns: &[f64]) -> BetaEstimate {
    if stock_returns.len() != market_returns.len() || stock_returns.len() < 2 {
        return BetaEstimate::Undefined(UndefinedReason::InsufficientData);
    }

    let n = stock_returns.len() as f64;
    let stock_mean = stock_returns.iter().sum::<f64>() / n;
    let market_mean = market_returns.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut stock_variance = 0.0;
    let mut market_variance = 0.0;
    for (stock, market) in stock_returns.iter().zip(market_returns.iter()) {
        let ds = stock - stock_mean;
        let dm = market - market_mean;
        covariance += ds * dm;
        stock_variance += ds * ds;
        market_variance += dm * dm;
    }
    covariance /= n - 1.0;
    stock_variance /= n - 1.0;
    market_variance /= n - 1.0;

    if market_variance == 0.0 {
        return BetaEstimate::Undefined(UndefinedReason::ZeroMarketVariance);
    }

    let beta = covariance / market_variance;
    let denominator = stock_variance.sqrt() * market_variance.sqrt();
    let correlation = if denominator == 0.0 {
        0.0
    } else {
        covariance / denominator
    };

    BetaEstimate::Computed { beta, correlation }
}

/// What the rest of the system consumes: display-rounded beta and
/// correlation plus the aligned sample count callers use to judge
/// statistical reliability.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BetaResult {
    pub beta: f64,
    pub correlation: f64,
    pub data_points: usize,
}

/// Aligns two daily close series by trading date, converts both to simple
/// returns, and estimates beta and correlation against the index.
///
/// Degenerate inputs (too little overlap, a flat index, degenerate prices)
/// resolve to the neutral `beta = 1, correlation = 0` rather than an error:
/// this feeds a display metric, not a financial control, and the caller is
/// expected to gate on `data_points` before trusting the numbers.
pub fn compute_beta(stock_prices: &[PriceSample], market_prices: &[PriceSample]) -> BetaResult {
    let (stock_closes, market_closes) = align_closes(stock_prices, market_prices);
    let stock_returns = daily_returns(&stock_closes);
    let market_returns = daily_returns(&market_closes);
    let data_points = stock_returns.len();

    match estimate(&stock_returns, &market_returns) {
        BetaEstimate::Computed { beta, correlation } => BetaResult {
            beta: round_to_display(beta),
            correlation: round_to_display(correlation),
            data_points,
        },
        BetaEstimate::Undefined(_) => BetaResult {
            beta: 1.0,
            correlation: 0.0,
            data_points,
        },
    }
}

/// Two decimal places, half away from zero.
fn round_to_display(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Beginner-facing movement label derived from beta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskProfile {
    Aggressive,
    Defensive,
    MarketTracking,
    Inverse,
}

impl RiskProfile {
    pub fn from_beta(beta: f64) -> Self {
        if beta < 0.0 {
            RiskProfile::Inverse
        } else if beta > 1.0 {
            RiskProfile::Aggressive
        } else if beta < 1.0 {
            RiskProfile::Defensive
        } else {
            RiskProfile::MarketTracking
        }
    }

    pub fn label_ja(&self) -> &'static str {
        match self {
            RiskProfile::Aggressive => "積極型",
            RiskProfile::Defensive => "安定型",
            RiskProfile::MarketTracking => "市場連動型",
            RiskProfile::Inverse => "逆相関型",
        }
    }
}
