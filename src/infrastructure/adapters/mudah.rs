//! Mudah.my classifieds search, parsed from the listing page HTML.
//!
//! Classified ads carry no rating and no sold count.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::normalize::{clean_text, parse_price};
use crate::domain::{FetchError, Platform, Product, SourceAdapter};
use crate::infrastructure::http_client::HttpClient;

pub const DEFAULT_BASE_URL: &str = "https://www.mudah.my";

lazy_static! {
    static ref LISTING: Selector =
        Selector::parse(r#"[data-testid^="listing-ad-item"]"#).expect("static selector");
    static ref TITLE_LINK: Selector =
        Selector::parse(r#"a[data-testid="listing-ad-title"], a[title]"#).expect("static selector");
    static ref PRICE: Selector =
        Selector::parse(r#"[data-testid="listing-ad-price"], .price"#).expect("static selector");
    static ref SELLER: Selector =
        Selector::parse(r#"[data-testid="listing-ad-seller"]"#).expect("static selector");
}

pub struct MudahAdapter {
    client: HttpClient,
    base_url: String,
}

impl MudahAdapter {
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

fn parse_listing(listing: ElementRef<'_>, base: &Url) -> Option<Product> {
    let link = listing.select(&TITLE_LINK).next()?;
    let name = link
        .value()
        .attr("title")
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| text_of(link));
    let href = link.value().attr("href")?;
    let url = base.join(href).ok()?;
    let price = parse_price(&text_of(listing.select(&PRICE).next()?))?;
    if name.is_empty() {
        return None;
    }

    let seller = listing.select(&SELLER).next().map(text_of);
    Some(Product::new(name, price, url.to_string(), Platform::Mudah).with_merchant(seller))
}

/// Listings on one search results page. A page without any listing
/// container is treated as "no matches".
pub fn parse_listing_page(html: &str, base_url: &str) -> Result<Vec<Product>, FetchError> {
    let base = Url::parse(base_url).map_err(|e| FetchError::parse_failure(format!("bad base URL: {e}")))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&LISTING)
        .filter_map(|listing| parse_listing(listing, &base))
        .collect())
}

#[async_trait]
impl SourceAdapter for MudahAdapter {
    fn platform(&self) -> Platform {
        Platform::Mudah
    }

    async fn fetch(&self, keyword: &str, limit: usize, cancel: &CancellationToken) -> Result<Vec<Product>, FetchError> {
        let url = Url::parse_with_params(&format!("{}/malaysia/all", self.base_url), &[("q", keyword)])
            .map_err(|e| FetchError::network(format!("invalid Mudah URL: {e}")))?;
        let html = self.client.get_text(url.as_str(), &[], cancel).await?;

        let mut products = parse_listing_page(&html, &self.base_url)?;
        products.truncate(limit);
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const PAGE: &str = r#"
        <html><body>
          <div data-testid="listing-ad-item-1">
            <a data-testid="listing-ad-title" href="/iphone-charger-cable-101.htm" title="iPhone  charger cable">x</a>
            <div data-testid="listing-ad-price">RM 25</div>
            <span data-testid="listing-ad-seller">Ahmad</span>
          </div>
          <div data-testid="listing-ad-item-2">
            <a data-testid="listing-ad-title" href="https://www.mudah.my/hdmi-cable-202.htm">HDMI cable 2m</a>
            <div data-testid="listing-ad-price">RM 1,250.50</div>
          </div>
          <div data-testid="listing-ad-item-3">
            <a data-testid="listing-ad-title" href="/no-price.htm">Free stuff</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn parses_listings() {
        let products = parse_listing_page(PAGE, DEFAULT_BASE_URL).unwrap();
        assert_eq!(products.len(), 2);

        assert_eq!(products[0].name, "iPhone charger cable");
        assert_eq!(products[0].price, Decimal::from(25));
        assert_eq!(products[0].url, "https://www.mudah.my/iphone-charger-cable-101.htm");
        assert_eq!(products[0].merchant.as_deref(), Some("Ahmad"));
        assert_eq!(products[0].rating, None);
        assert_eq!(products[0].sold, None);

        assert_eq!(products[1].name, "HDMI cable 2m");
        assert_eq!(products[1].price, Decimal::new(125_050, 2));
    }

    #[test]
    fn page_without_listings_is_empty() {
        let products = parse_listing_page("<html><body>Tiada iklan</body></html>", DEFAULT_BASE_URL).unwrap();
        assert!(products.is_empty());
    }
}
