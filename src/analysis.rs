//! Analysis engine
//!
//! Pure, deterministic functions over `platform → products`. Nothing here
//! performs I/O or keeps state; the same input always yields the same report.

pub mod best_sellers;
pub mod merchants;
pub mod platform_score;
pub mod pricing;
pub mod ratings;

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{AnalysisReport, Platform, Product, SearchFilters, SortBy};

pub use best_sellers::rank_best_sellers;
pub use merchants::analyze_merchants;
pub use platform_score::{best_platform, platform_breakdown, platform_metrics};
pub use pricing::analyze_prices;
pub use ratings::analyze_ratings;

/// Entry point used by the orchestrator once a search's results are merged
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisEngine;

impl AnalysisEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, results: &BTreeMap<Platform, Vec<Product>>, filters: &SearchFilters) -> AnalysisReport {
        let all: Vec<&Product> = results.values().flatten().collect();

        let price_analysis = analyze_prices(all.iter().copied());
        let rating_analysis = analyze_ratings(all.iter().copied());
        let platform_metrics = platform_metrics(results);
        let best_platform = best_platform(&platform_metrics);
        let merchant_analysis = analyze_merchants(all.iter().copied());
        let platform_breakdown = platform_breakdown(results);
        let best_sellers = rank_best_sellers(
            all.iter().copied(),
            filters.max_price,
            filters.min_rating,
            filters.top_n(),
        );

        debug!(
            "Analyzed {} products across {} platforms ({} best sellers)",
            all.len(),
            results.len(),
            best_sellers.len()
        );

        AnalysisReport {
            total_products: all.len(),
            price_analysis,
            rating_analysis,
            platform_metrics,
            best_sellers,
            best_platform,
            merchant_analysis,
            platform_breakdown,
        }
    }

    /// Combined product list in the requested order.
    ///
    /// `Relevance` concatenates platforms in canonical order, each in its
    /// adapter's native order. Stored results are never reordered.
    pub fn sorted_view(&self, results: &BTreeMap<Platform, Vec<Product>>, sort_by: SortBy) -> Vec<Product> {
        let mut products: Vec<Product> = results.values().flatten().cloned().collect();
        match sort_by {
            SortBy::Relevance => {}
            SortBy::PriceAsc => products.sort_by(|a, b| a.price.cmp(&b.price)),
            SortBy::PriceDesc => products.sort_by(|a, b| b.price.cmp(&a.price)),
            SortBy::Rating => products.sort_by(|a, b| best_sellers::cmp_rating_desc(a.rating, b.rating)),
            SortBy::Sold => products.sort_by(|a, b| b.sold.cmp(&a.sold)),
        }
        products
    }
}
