//! Tokopedia search results page, parsed through `data-testid` hooks

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::normalize::{clean_text, parse_price, parse_rating, parse_sold};
use crate::domain::{FetchError, Platform, Product, SourceAdapter};
use crate::infrastructure::http_client::HttpClient;

pub const DEFAULT_BASE_URL: &str = "https://www.tokopedia.com";

lazy_static! {
    static ref CARD: Selector = Selector::parse(r#"[data-testid="divProductWrapper"], [data-testid="master-product-card"]"#)
        .expect("static selector");
    static ref LINK: Selector = Selector::parse("a[href]").expect("static selector");
    static ref NAME: Selector = Selector::parse(r#"[data-testid="spnSRPProdName"]"#).expect("static selector");
    static ref PRICE: Selector = Selector::parse(r#"[data-testid="spnSRPProdPrice"]"#).expect("static selector");
    static ref RATING: Selector = Selector::parse(r#"[data-testid="spnSRPProdRating"]"#).expect("static selector");
    static ref SOLD: Selector = Selector::parse(r#"[data-testid="spnIntegrity"]"#).expect("static selector");
    static ref SHOP: Selector = Selector::parse(r#"[data-testid="spnSRPProdTabShopName"]"#).expect("static selector");
}

pub struct TokopediaAdapter {
    client: HttpClient,
    base_url: String,
}

impl TokopediaAdapter {
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn parse_card(card: ElementRef<'_>, base: &Url) -> Option<Product> {
    let name = first_text(card, &NAME)?;
    let price = parse_price(&first_text(card, &PRICE)?)?;
    let href = card.select(&LINK).next()?.value().attr("href")?;
    let url = base.join(href).ok()?;

    Some(
        Product::new(name, price, url.to_string(), Platform::Tokopedia)
            .with_rating(first_text(card, &RATING).as_deref().and_then(parse_rating))
            .with_sold(first_text(card, &SOLD).as_deref().and_then(parse_sold))
            .with_merchant(first_text(card, &SHOP)),
    )
}

pub fn parse_search_page(html: &str, base_url: &str) -> Result<Vec<Product>, FetchError> {
    let base = Url::parse(base_url).map_err(|e| FetchError::parse_failure(format!("bad base URL: {e}")))?;
    let document = Html::parse_document(html);
    Ok(document.select(&CARD).filter_map(|card| parse_card(card, &base)).collect())
}

#[async_trait]
impl SourceAdapter for TokopediaAdapter {
    fn platform(&self) -> Platform {
        Platform::Tokopedia
    }

    async fn fetch(&self, keyword: &str, limit: usize, cancel: &CancellationToken) -> Result<Vec<Product>, FetchError> {
        let url = Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[("st", "product"), ("q", keyword)],
        )
        .map_err(|e| FetchError::network(format!("invalid Tokopedia URL: {e}")))?;
        let html = self.client.get_text(url.as_str(), &[], cancel).await?;

        let mut products = parse_search_page(&html, &self.base_url)?;
        products.truncate(limit);
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const PAGE: &str = r#"
        <div data-testid="divProductWrapper">
          <a href="https://www.tokopedia.com/tokoabc/kabel-usb-c-1m">
            <span data-testid="spnSRPProdName">Kabel USB C 1m</span>
            <span data-testid="spnSRPProdPrice">Rp15.000</span>
            <span data-testid="spnSRPProdRating">4.9</span>
            <span data-testid="spnIntegrity">250+ terjual</span>
            <span data-testid="spnSRPProdTabShopName">Toko ABC</span>
          </a>
        </div>
        <div data-testid="divProductWrapper">
          <a href="/tokoxyz/kabel-hdmi">
            <span data-testid="spnSRPProdName">Kabel HDMI</span>
            <span data-testid="spnSRPProdPrice">Rp1.250.000</span>
            <span data-testid="spnIntegrity">1,2rb terjual</span>
          </a>
        </div>
        <div data-testid="divProductWrapper">
          <a href="/broken"><span data-testid="spnSRPProdName">No price</span></a>
        </div>
    "#;

    #[test]
    fn parses_product_cards() {
        let products = parse_search_page(PAGE, DEFAULT_BASE_URL).unwrap();
        assert_eq!(products.len(), 2);

        let first = &products[0];
        assert_eq!(first.name, "Kabel USB C 1m");
        assert_eq!(first.price, Decimal::from(15_000));
        assert_eq!(first.rating, Some(4.9));
        assert_eq!(first.sold, Some(250));
        assert_eq!(first.merchant.as_deref(), Some("Toko ABC"));

        let second = &products[1];
        assert_eq!(second.price, Decimal::from(1_250_000));
        assert_eq!(second.sold, Some(1_200));
        assert_eq!(second.rating, None);
        assert_eq!(second.url, "https://www.tokopedia.com/tokoxyz/kabel-hdmi");
    }
}
