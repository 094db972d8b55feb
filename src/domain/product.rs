use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

/// Marketplaces a search can target.
///
/// Declaration order is the canonical platform order: `BTreeMap` keys,
/// tie-breaking in platform comparison and CLI help all follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Shopee,
    Lazada,
    Mudah,
    Tokopedia,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Shopee,
        Platform::Lazada,
        Platform::Mudah,
        Platform::Tokopedia,
    ];

    /// Lowercase identifier used in logs, config keys and serialized output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shopee => "shopee",
            Self::Lazada => "lazada",
            Self::Mudah => "mudah",
            Self::Tokopedia => "tokopedia",
        }
    }

    /// Human-readable marketplace name
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Shopee => "Shopee",
            Self::Lazada => "Lazada",
            Self::Mudah => "Mudah.my",
            Self::Tokopedia => "Tokopedia",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shopee" => Ok(Self::Shopee),
            "lazada" => Ok(Self::Lazada),
            "mudah" | "mudah.my" => Ok(Self::Mudah),
            "tokopedia" => Ok(Self::Tokopedia),
            other => Err(ValidationError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Normalized listing produced by a source adapter.
///
/// `price` is kept in the platform's native unit; there is no currency
/// conversion anywhere in the pipeline. Adapters drop listings whose price
/// cannot be parsed, so every product is priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: Decimal,
    pub rating: Option<f64>,
    pub sold: Option<u64>,
    pub merchant: Option<String>,
    pub url: String,
    pub platform: Platform,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Decimal, url: impl Into<String>, platform: Platform) -> Self {
        Self {
            name: name.into(),
            price: price.max(Decimal::ZERO),
            rating: None,
            sold: None,
            merchant: None,
            url: url.into(),
            platform,
        }
    }

    /// Ratings outside [0, 5] or NaN are dropped rather than clamped
    #[must_use]
    pub fn with_rating(mut self, rating: Option<f64>) -> Self {
        self.rating = rating.filter(|r| r.is_finite() && (0.0..=5.0).contains(r));
        self
    }

    #[must_use]
    pub fn with_sold(mut self, sold: Option<u64>) -> Self {
        self.sold = sold;
        self
    }

    #[must_use]
    pub fn with_merchant(mut self, merchant: Option<String>) -> Self {
        self.merchant = merchant.filter(|m| !m.trim().is_empty());
        self
    }
}
