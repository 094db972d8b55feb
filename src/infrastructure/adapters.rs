//! Source adapters, one per marketplace
//!
//! Fetching and parsing are split: every adapter exposes a pure `parse_*`
//! function over the raw response body, and `fetch` only handles URLs,
//! paging and the HTTP round trips.

pub mod lazada;
pub mod mudah;
pub mod normalize;
pub mod scripted;
pub mod shopee;
pub mod tokopedia;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

pub use lazada::LazadaAdapter;
pub use mudah::MudahAdapter;
pub use scripted::{ScriptedAdapter, ScriptedStep, sample_products};
pub use shopee::ShopeeAdapter;
pub use tokopedia::TokopediaAdapter;

use crate::domain::{Platform, SourceAdapter};
use crate::infrastructure::config::ScraperConfig;
use crate::infrastructure::http_client::HttpClient;

pub fn default_base_url(platform: Platform) -> &'static str {
    match platform {
        Platform::Shopee => shopee::DEFAULT_BASE_URL,
        Platform::Lazada => lazada::DEFAULT_BASE_URL,
        Platform::Mudah => mudah::DEFAULT_BASE_URL,
        Platform::Tokopedia => tokopedia::DEFAULT_BASE_URL,
    }
}

/// Network-backed adapter for every platform, sharing one HTTP client
pub fn live_adapters(config: &ScraperConfig) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let client = HttpClient::new(config)?;
    let base = |platform| {
        config
            .base_url_override(platform)
            .unwrap_or_else(|| default_base_url(platform))
            .to_string()
    };

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(ShopeeAdapter::new(client.clone(), base(Platform::Shopee))),
        Arc::new(LazadaAdapter::new(client.clone(), base(Platform::Lazada))),
        Arc::new(MudahAdapter::new(client.clone(), base(Platform::Mudah))),
        Arc::new(TokopediaAdapter::new(client, base(Platform::Tokopedia))),
    ];
    info!("Live adapters ready for {} platforms", adapters.len());
    Ok(adapters)
}

/// Offline stand-ins producing sample listings for every platform
pub fn offline_adapters() -> Vec<Arc<dyn SourceAdapter>> {
    Platform::ALL
        .into_iter()
        .map(|platform| -> Arc<dyn SourceAdapter> { Arc::new(ScriptedAdapter::sample(platform)) })
        .collect()
}
