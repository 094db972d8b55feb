//! Shopee search through the public v4 JSON API

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::normalize::clean_text;
use crate::domain::{FetchError, Platform, Product, SourceAdapter};
use crate::infrastructure::http_client::HttpClient;

pub const DEFAULT_BASE_URL: &str = "https://shopee.co.id";
const PAGE_SIZE: usize = 60;
const MAX_PAGES: usize = 10;
/// API prices are integers in 1/100000 of the currency unit
const PRICE_SCALE: u32 = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    error: Option<i64>,
    #[serde(default)]
    items: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    item_basic: Option<ItemBasic>,
}

#[derive(Debug, Deserialize)]
struct ItemBasic {
    itemid: u64,
    shopid: u64,
    #[serde(default)]
    name: String,
    price: Option<i64>,
    item_rating: Option<ItemRating>,
    sold: Option<u64>,
    historical_sold: Option<u64>,
    shop_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemRating {
    rating_star: Option<f64>,
}

pub struct ShopeeAdapter {
    client: HttpClient,
    base_url: String,
}

impl ShopeeAdapter {
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, keyword: &str, offset: usize, page_size: usize) -> Result<Url, FetchError> {
        let limit = page_size.to_string();
        let newest = offset.to_string();
        Url::parse_with_params(
            &format!("{}/api/v4/search/search_items", self.base_url),
            &[
                ("by", "relevancy"),
                ("keyword", keyword),
                ("limit", limit.as_str()),
                ("newest", newest.as_str()),
                ("order", "desc"),
                ("page_type", "search"),
                ("scenario", "PAGE_GLOBAL_SEARCH"),
                ("version", "2"),
            ],
        )
        .map_err(|e| FetchError::network(format!("invalid Shopee URL: {e}")))
    }
}

/// Products from one search page. An error code without items means the
/// request was rejected by anti-bot checks.
pub fn parse_search_page(body: &str, base_url: &str) -> Result<Vec<Product>, FetchError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::parse_failure(format!("unexpected Shopee payload: {e}")))?;

    let items = match (response.items, response.error) {
        (Some(items), _) => items,
        (None, Some(code)) if code != 0 => {
            return Err(FetchError::blocked(format!("Shopee API error {code}")));
        }
        (None, _) => Vec::new(),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| item.item_basic)
        .filter_map(|basic| {
            let name = clean_text(&basic.name);
            let price = basic.price?;
            if name.is_empty() || price < 0 {
                return None;
            }
            Some(
                Product::new(
                    name,
                    Decimal::new(price, PRICE_SCALE).normalize(),
                    format!("{base_url}/product/{}/{}", basic.shopid, basic.itemid),
                    Platform::Shopee,
                )
                .with_rating(basic.item_rating.and_then(|r| r.rating_star).filter(|r| *r > 0.0))
                .with_sold(basic.sold.or(basic.historical_sold))
                .with_merchant(basic.shop_name),
            )
        })
        .collect())
}

#[async_trait]
impl SourceAdapter for ShopeeAdapter {
    fn platform(&self) -> Platform {
        Platform::Shopee
    }

    async fn fetch(&self, keyword: &str, limit: usize, cancel: &CancellationToken) -> Result<Vec<Product>, FetchError> {
        let referer = format!("{}/", self.base_url);
        let headers = [("referer", referer.as_str()), ("x-api-source", "pc")];
        let mut products = Vec::with_capacity(limit);

        for page in 0..MAX_PAGES {
            if products.len() >= limit {
                break;
            }
            let page_size = PAGE_SIZE.min(limit - products.len());
            let url = self.search_url(keyword, page * PAGE_SIZE, page_size)?;
            let body = self.client.get_text(url.as_str(), &headers, cancel).await?;
            let batch = parse_search_page(&body, &self.base_url)?;
            debug!("[shopee] page {} returned {} items", page, batch.len());

            let exhausted = batch.len() < page_size;
            products.extend(batch);
            if exhausted {
                break;
            }
        }

        products.truncate(limit);
        Ok(products)
    }
}
