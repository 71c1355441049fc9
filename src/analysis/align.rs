use crate::data_structures::PriceSample;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Pairs a stock's closes with an index's closes on matching trading dates.
///
/// Builds a date lookup over the index series, then walks the stock series
/// in order, keeping only dates present in both. Days missing from either
/// side (holidays, listing gaps, upstream dropouts) are discarded; nothing
/// is interpolated. The two returned vectors have equal length and share
/// positional date order.
pub fn align_closes(stock: &[PriceSample], index: &[PriceSample]) -> (Vec<f64>, Vec<f64>) {
    let index_by_date: HashMap<NaiveDate, f64> =
        index.iter().map(|s| (s.date, s.close)).collect();

    let mut stock_closes = Vec::with_capacity(stock.len());
    let mut index_closes = Vec::with_capacity(stock.len());
    for sample in stock {
        if let Some(&index_close) = index_by_date.get(&sample.date) {
            stock_closes.push(sample.close);
            index_closes.push(index_close);
        }
    }

    (stock_closes, index_closes)
}
