use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::pricing::average_price;
use super::ratings::round2;
use crate::domain::{Platform, PlatformBreakdown, PlatformMetrics, Product};

const RATING_WEIGHT: f64 = 40.0;
const COVERAGE_WEIGHT: f64 = 30.0;
const PRICE_WEIGHT: f64 = 30.0;

/// Per-platform metrics and composite score.
///
/// Platforms that returned no products are omitted. The score combines
/// rating (avg / 5), coverage (count relative to the largest platform) and
/// price (cheaper relative to the most expensive platform average), each
/// clamped to [0, 1] before weighting.
pub fn platform_metrics(results: &BTreeMap<Platform, Vec<Product>>) -> BTreeMap<Platform, PlatformMetrics> {
    let raw: Vec<(Platform, usize, Decimal, Option<f64>)> = results
        .iter()
        .filter(|(_, products)| !products.is_empty())
        .map(|(platform, products)| {
            let avg_price = average_price(products).unwrap_or(Decimal::ZERO);
            let ratings: Vec<f64> = products.iter().filter_map(|p| p.rating).collect();
            let avg_rating =
                (!ratings.is_empty()).then(|| round2(ratings.iter().sum::<f64>() / ratings.len() as f64));
            (*platform, products.len(), avg_price, avg_rating)
        })
        .collect();

    let max_count = raw.iter().map(|(_, count, _, _)| *count).max().unwrap_or(0);
    let max_avg_price = raw
        .iter()
        .map(|(_, _, price, _)| *price)
        .max()
        .unwrap_or(Decimal::ZERO);

    raw.into_iter()
        .map(|(platform, product_count, avg_price, avg_rating)| {
            let rating_term = avg_rating.map_or(0.0, |r| (r / 5.0).clamp(0.0, 1.0));
            let coverage_term = if max_count == 0 {
                0.0
            } else {
                (product_count as f64 / max_count as f64).clamp(0.0, 1.0)
            };
            let price_term = if max_avg_price.is_zero() {
                1.0
            } else {
                let ratio = (avg_price / max_avg_price).to_f64().unwrap_or(1.0);
                (1.0 - ratio).clamp(0.0, 1.0)
            };

            let score = RATING_WEIGHT * rating_term + COVERAGE_WEIGHT * coverage_term + PRICE_WEIGHT * price_term;

            (
                platform,
                PlatformMetrics {
                    product_count,
                    avg_price,
                    avg_rating,
                    score: round2(score.clamp(0.0, 100.0)),
                },
            )
        })
        .collect()
}

/// Highest score wins; ties go to the platform that sorts first
pub fn best_platform(metrics: &BTreeMap<Platform, PlatformMetrics>) -> Option<Platform> {
    let mut best: Option<(Platform, f64)> = None;
    for (platform, m) in metrics {
        if best.is_none_or(|(_, score)| m.score > score) {
            best = Some((*platform, m.score));
        }
    }
    best.map(|(platform, _)| platform)
}

/// Product count per platform that returned anything.
///
/// The dominant platform holds the most products; ties go to the platform
/// that sorts first.
pub fn platform_breakdown(results: &BTreeMap<Platform, Vec<Product>>) -> PlatformBreakdown {
    let distribution: BTreeMap<Platform, usize> = results
        .iter()
        .filter(|(_, products)| !products.is_empty())
        .map(|(platform, products)| (*platform, products.len()))
        .collect();

    let mut dominant: Option<(Platform, usize)> = None;
    for (platform, count) in &distribution {
        if dominant.is_none_or(|(_, most)| *count > most) {
            dominant = Some((*platform, *count));
        }
    }

    PlatformBreakdown {
        distribution,
        dominant_platform: dominant.map(|(platform, _)| platform),
    }
}
