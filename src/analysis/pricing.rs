use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::ratings::round2;
use crate::domain::{PriceAnalysis, Product};

/// Min/max/avg/median, range and spread over every product's price.
/// `None` for no products.
pub fn analyze_prices<'a>(products: impl IntoIterator<Item = &'a Product>) -> Option<PriceAnalysis> {
    let mut prices: Vec<Decimal> = products.into_iter().map(|p| p.price).collect();
    if prices.is_empty() {
        return None;
    }
    prices.sort_unstable();

    let count = prices.len();
    let sum: Decimal = prices.iter().copied().sum();
    let avg = (sum / Decimal::from(count)).normalize();
    let median = if count % 2 == 1 {
        prices[count / 2]
    } else {
        ((prices[count / 2 - 1] + prices[count / 2]) / Decimal::TWO).normalize()
    };

    Some(PriceAnalysis {
        min: prices[0],
        max: prices[count - 1],
        avg,
        median,
        range: prices[count - 1] - prices[0],
        std_dev: sample_std_dev(&prices, avg),
        count,
    })
}

fn sample_std_dev(prices: &[Decimal], mean: Decimal) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let mean = mean.to_f64().unwrap_or(0.0);
    let squares: f64 = prices
        .iter()
        .map(|p| p.to_f64().unwrap_or(0.0) - mean)
        .map(|d| d * d)
        .sum();
    round2((squares / (prices.len() - 1) as f64).sqrt())
}

/// Average price of a slice, `None` when empty
pub(crate) fn average_price(products: &[Product]) -> Option<Decimal> {
    analyze_prices(products).map(|p| p.avg)
}
