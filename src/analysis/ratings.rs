use crate::domain::{Product, RatingAnalysis, RatingDistribution};

/// Average and histogram over every rated product; `None` if nothing is rated
pub fn analyze_ratings<'a>(products: impl IntoIterator<Item = &'a Product>) -> Option<RatingAnalysis> {
    let mut distribution = RatingDistribution::default();
    let mut sum = 0.0;
    let mut count = 0usize;

    for rating in products.into_iter().filter_map(|p| p.rating) {
        sum += rating;
        count += 1;
        match rating {
            r if r >= 5.0 => distribution.five += 1,
            r if r >= 4.0 => distribution.four_to_five += 1,
            r if r >= 3.0 => distribution.three_to_four += 1,
            r if r >= 2.0 => distribution.two_to_three += 1,
            _ => distribution.below_two += 1,
        }
    }

    if count == 0 {
        return None;
    }

    Some(RatingAnalysis {
        avg: round2(sum / count as f64),
        count,
        distribution,
    })
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
