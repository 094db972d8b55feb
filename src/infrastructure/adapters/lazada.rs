//! Lazada search through the catalog page's AJAX mode

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::normalize::{clean_text, parse_price, parse_rating, parse_sold};
use crate::domain::{FetchError, Platform, Product, SourceAdapter};
use crate::infrastructure::http_client::HttpClient;

pub const DEFAULT_BASE_URL: &str = "https://www.lazada.co.id";
const PAGE_SIZE: usize = 40;
const MAX_PAGES: usize = 5;

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    mods: Option<Mods>,
    /// Present on anti-bot rejections, e.g. `["FAIL_SYS_USER_VALIDATE"]`
    #[serde(default)]
    ret: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Mods {
    #[serde(default)]
    list_items: Vec<ListItem>,
}

/// Lazada mixes strings and numbers for the same fields across regions
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Number(f64),
}

impl Loose {
    fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListItem {
    #[serde(default)]
    name: String,
    price: Option<Loose>,
    rating_score: Option<Loose>,
    item_sold_cnt_show: Option<String>,
    seller_name: Option<String>,
    item_url: Option<String>,
}

pub struct LazadaAdapter {
    client: HttpClient,
    base_url: String,
}

impl LazadaAdapter {
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, keyword: &str, page: usize) -> Result<Url, FetchError> {
        let page = page.to_string();
        Url::parse_with_params(
            &format!("{}/catalog/", self.base_url),
            &[("ajax", "true"), ("q", keyword), ("page", page.as_str())],
        )
        .map_err(|e| FetchError::network(format!("invalid Lazada URL: {e}")))
    }
}

fn absolute_url(base_url: &str, item_url: &str) -> String {
    if item_url.starts_with("//") {
        format!("https:{item_url}")
    } else if item_url.starts_with('/') {
        format!("{base_url}{item_url}")
    } else {
        item_url.to_string()
    }
}

pub fn parse_catalog_page(body: &str, base_url: &str) -> Result<Vec<Product>, FetchError> {
    let response: CatalogResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::parse_failure(format!("unexpected Lazada payload: {e}")))?;

    if response.ret.iter().any(|r| r.contains("USER_VALIDATE") || r.contains("DENIED")) {
        return Err(FetchError::blocked(response.ret.join(", ")));
    }
    let Some(mods) = response.mods else {
        return Ok(Vec::new());
    };

    Ok(mods
        .list_items
        .into_iter()
        .filter_map(|item| {
            let name = clean_text(&item.name);
            let price = parse_price(&item.price?.as_text())?;
            let url = absolute_url(base_url, item.item_url.as_deref()?);
            if name.is_empty() {
                return None;
            }
            Some(
                Product::new(name, price, url, Platform::Lazada)
                    .with_rating(
                        item.rating_score
                            .and_then(|r| parse_rating(&r.as_text()))
                            .filter(|r| *r > 0.0),
                    )
                    .with_sold(item.item_sold_cnt_show.as_deref().and_then(parse_sold))
                    .with_merchant(item.seller_name),
            )
        })
        .collect())
}

#[async_trait]
impl SourceAdapter for LazadaAdapter {
    fn platform(&self) -> Platform {
        Platform::Lazada
    }

    async fn fetch(&self, keyword: &str, limit: usize, cancel: &CancellationToken) -> Result<Vec<Product>, FetchError> {
        let referer = format!("{}/", self.base_url);
        let headers = [("referer", referer.as_str()), ("x-requested-with", "XMLHttpRequest")];
        let mut products = Vec::with_capacity(limit);

        for page in 1..=MAX_PAGES {
            let url = self.search_url(keyword, page)?;
            let body = self.client.get_text(url.as_str(), &headers, cancel).await?;
            let batch = parse_catalog_page(&body, &self.base_url)?;
            debug!("[lazada] page {} returned {} items", page, batch.len());

            let exhausted = batch.len() < PAGE_SIZE;
            products.extend(batch);
            if exhausted || products.len() >= limit {
                break;
            }
        }

        products.truncate(limit);
        Ok(products)
    }
}
