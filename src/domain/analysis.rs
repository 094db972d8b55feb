//! Analysis report shapes
//!
//! Produced by [`crate::analysis::AnalysisEngine`]. A report is always
//! replaced wholesale when recomputed.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::{Platform, Product};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAnalysis {
    pub min: Decimal,
    pub max: Decimal,
    pub avg: Decimal,
    pub median: Decimal,
    /// `max - min`
    pub range: Decimal,
    /// Sample standard deviation, 0 for a single price
    pub std_dev: f64,
    /// Number of products that contributed a price
    pub count: usize,
}

/// Rating histogram. `five` holds ratings of exactly 5; every other bucket is
/// closed on its lower bound and open on its upper bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDistribution {
    pub five: usize,
    pub four_to_five: usize,
    pub three_to_four: usize,
    pub two_to_three: usize,
    pub below_two: usize,
}

impl RatingDistribution {
    pub fn total(&self) -> usize {
        self.five + self.four_to_five + self.three_to_four + self.two_to_three + self.below_two
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingAnalysis {
    pub avg: f64,
    pub count: usize,
    pub distribution: RatingDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformMetrics {
    pub product_count: usize,
    pub avg_price: Decimal,
    pub avg_rating: Option<f64>,
    /// Weighted composite in [0, 100]
    pub score: f64,
}

/// One seller on one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantStats {
    pub merchant: String,
    pub platform: Platform,
    pub product_count: usize,
    pub avg_price: Decimal,
    pub avg_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantAnalysis {
    pub total_merchants: usize,
    pub avg_products_per_merchant: f64,
    /// Ordered by platform, then merchant name
    pub merchants: Vec<MerchantStats>,
    /// Best rated first, larger catalogue breaking ties
    pub top_merchants: Vec<MerchantStats>,
}

/// How the merged products split across platforms
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformBreakdown {
    /// Product count per platform that returned anything
    pub distribution: BTreeMap<Platform, usize>,
    pub dominant_platform: Option<Platform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub total_products: usize,
    pub price_analysis: Option<PriceAnalysis>,
    pub rating_analysis: Option<RatingAnalysis>,
    pub platform_metrics: BTreeMap<Platform, PlatformMetrics>,
    pub best_sellers: Vec<Product>,
    pub best_platform: Option<Platform>,
    /// Absent when no product names its seller
    pub merchant_analysis: Option<MerchantAnalysis>,
    pub platform_breakdown: PlatformBreakdown,
}
