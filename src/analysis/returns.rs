/// Simple daily returns from an ordered series of closing prices.
///
/// `return[i] = (close[i] - close[i-1]) / close[i-1]`, so N closes produce
/// N-1 returns and fewer than two closes produce none. An interval whose
/// prior close is not a positive finite number (or whose current close is
/// not finite) is skipped instead of emitting an infinite or NaN value;
/// the resulting length mismatch between two paired series is then caught
/// by the estimator's guards.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    if closes.len() < 2 {
        return Vec::new();
    }

    let mut returns = Vec::with_capacity(closes.len() - 1);
    for pair in closes.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if prev > 0.0 && prev.is_finite() && curr.is_finite() {
            returns.push((curr - prev) / prev);
        }
    }
    returns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_produces_one_fewer_value_than_closes() {
        let closes = [100.0, 102.0, 101.0, 105.0, 104.0];
        let returns = daily_returns(&closes);
        assert_eq!(returns.len(), closes.len() - 1);
        for (i, r) in returns.iter().enumerate() {
            let expected = (closes[i + 1] - closes[i]) / closes[i];
            assert!((r - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_short_series_yield_nothing() {
        assert!(daily_returns(&[]).is_empty());
        assert!(daily_returns(&[100.0]).is_empty());
    }

    #[test]
    fn test_two_closes_yield_one_return() {
        let returns = daily_returns(&[100.0, 110.0]);
        assert_eq!(returns, vec![0.1]);
    }

    #[test]
    fn test_zero_prior_close_is_skipped() {
        // 100 -> 0 is a valid (total-loss) interval; 0 -> 50 would divide by
        // zero and is dropped
        let returns = daily_returns(&[100.0, 0.0, 50.0]);
        assert_eq!(returns, vec![-1.0]);
    }

    #[test]
    fn test_non_finite_close_is_skipped() {
        let returns = daily_returns(&[100.0, f64::NAN, 102.0]);
        assert!(returns.is_empty());
    }
}
