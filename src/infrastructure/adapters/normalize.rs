//! Text normalization for scraped listing fields
//!
//! Marketplaces render numbers for humans: `Rp 15.000`, `RM 12.50`,
//! `1,2rb terjual`, `10k sold`. These helpers turn them into typed values and
//! return `None` rather than guessing when nothing numeric is present.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"\d[\d.,]*").expect("static regex");
    static ref RATING: Regex = Regex::new(r"\d+(?:[.,]\d+)?").expect("static regex");
    static ref SOLD: Regex =
        Regex::new(r"(\d+(?:[.,]\d+)*)\s*(rb|ribu|k|jt|juta|m)?").expect("static regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static regex");
}

/// Collapse runs of whitespace and trim
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// First price in `text`, in the currency's natural unit.
///
/// A separator followed by exactly three digits is a thousands separator;
/// when both `.` and `,` appear the last one is the decimal point.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let token = NUMBER.find(text)?.as_str().trim_end_matches(['.', ',']);
    Decimal::from_str(&canonical_number(token)).ok()
}

fn canonical_number(token: &str) -> String {
    let last_dot = token.rfind('.');
    let last_comma = token.rfind(',');
    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            let (decimal, thousands) = if dot > comma { ('.', ',') } else { (',', '.') };
            token
                .chars()
                .filter(|c| *c != thousands)
                .map(|c| if c == decimal { '.' } else { c })
                .collect()
        }
        (Some(_), None) => single_separator(token, '.'),
        (None, Some(_)) => single_separator(token, ','),
        (None, None) => token.to_string(),
    }
}

fn single_separator(token: &str, separator: char) -> String {
    let groups: Vec<&str> = token.split(separator).collect();
    let is_thousands = groups.len() > 2 || groups.last().is_some_and(|g| g.len() == 3);
    if is_thousands {
        groups.concat()
    } else {
        groups.join(".")
    }
}

/// Rating in [0, 5]; values outside the range are rejected
pub fn parse_rating(text: &str) -> Option<f64> {
    let token = RATING.find(text)?.as_str().replace(',', ".");
    let rating: f64 = token.parse().ok()?;
    (0.0..=5.0).contains(&rating).then_some(rating)
}

/// Sold count from text like `250+ terjual`, `1,2rb terjual`, `10k sold`
pub fn parse_sold(text: &str) -> Option<u64> {
    let lower = text.to_lowercase();
    let captures = SOLD.captures(&lower)?;
    let digits = captures.get(1)?.as_str();

    let multiplier: f64 = match captures.get(2).map(|m| m.as_str()) {
        Some("rb" | "ribu" | "k") => 1_000.0,
        Some("jt" | "juta" | "m") => 1_000_000.0,
        _ => {
            let plain: String = digits.chars().filter(char::is_ascii_digit).collect();
            return plain.parse().ok();
        }
    };

    let value: f64 = canonical_number(digits).parse().ok()?;
    Some((value * multiplier).round() as u64)
}
