use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::domain::Product;

/// Top sellers across all platforms.
///
/// Only products with a known `sold` count qualify. Ranking is `sold`
/// descending, then rating descending with unrated last, then price
/// ascending. Remaining ties keep input order.
pub fn rank_best_sellers<'a>(
    products: impl IntoIterator<Item = &'a Product>,
    max_price: Option<Decimal>,
    min_rating: Option<f64>,
    top_n: usize,
) -> Vec<Product> {
    let mut eligible: Vec<&Product> = products
        .into_iter()
        .filter(|p| p.sold.is_some())
        .filter(|p| max_price.is_none_or(|max| p.price <= max))
        .filter(|p| min_rating.is_none_or(|min| p.rating.is_some_and(|r| r >= min)))
        .collect();

    eligible.sort_by(|a, b| {
        b.sold
            .cmp(&a.sold)
            .then_with(|| cmp_rating_desc(a.rating, b.rating))
            .then_with(|| a.price.cmp(&b.price))
    });

    eligible.into_iter().take(top_n).cloned().collect()
}

/// Higher rating first, unrated last
pub(crate) fn cmp_rating_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
