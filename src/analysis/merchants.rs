use std::cmp::Ordering;
use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::best_sellers::cmp_rating_desc;
use super::ratings::round2;
use crate::domain::{MerchantAnalysis, MerchantStats, Platform, Product};

pub const TOP_MERCHANTS: usize = 5;

/// Per-seller statistics, keyed by platform and seller name.
///
/// Products without a merchant are left out; `None` when no product names
/// one. Top merchants rank by average rating (unrated last), then product
/// count, then platform and name.
pub fn analyze_merchants<'a>(products: impl IntoIterator<Item = &'a Product>) -> Option<MerchantAnalysis> {
    let mut grouped: BTreeMap<(Platform, &str), Vec<&Product>> = BTreeMap::new();
    for product in products {
        if let Some(merchant) = product.merchant.as_deref() {
            grouped.entry((product.platform, merchant)).or_default().push(product);
        }
    }
    if grouped.is_empty() {
        return None;
    }

    let listed: usize = grouped.values().map(Vec::len).sum();
    let merchants: Vec<MerchantStats> = grouped
        .into_iter()
        .map(|((platform, merchant), listings)| merchant_stats(platform, merchant, &listings))
        .collect();

    let mut ranked: Vec<&MerchantStats> = merchants.iter().collect();
    ranked.sort_by(|a, b| rank(a, b));
    let top_merchants = ranked.into_iter().take(TOP_MERCHANTS).cloned().collect();

    Some(MerchantAnalysis {
        total_merchants: merchants.len(),
        avg_products_per_merchant: round2(listed as f64 / merchants.len() as f64),
        merchants,
        top_merchants,
    })
}

fn merchant_stats(platform: Platform, merchant: &str, listings: &[&Product]) -> MerchantStats {
    let total: Decimal = listings.iter().map(|p| p.price).sum();
    let ratings: Vec<f64> = listings.iter().filter_map(|p| p.rating).collect();
    MerchantStats {
        merchant: merchant.to_string(),
        platform,
        product_count: listings.len(),
        avg_price: (total / Decimal::from(listings.len())).normalize(),
        avg_rating: (!ratings.is_empty()).then(|| round2(ratings.iter().sum::<f64>() / ratings.len() as f64)),
    }
}

fn rank(a: &MerchantStats, b: &MerchantStats) -> Ordering {
    cmp_rating_desc(a.avg_rating, b.avg_rating)
        .then_with(|| b.product_count.cmp(&a.product_count))
        .then_with(|| a.platform.cmp(&b.platform))
        .then_with(|| a.merchant.cmp(&b.merchant))
}
