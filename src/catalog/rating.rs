use serde::Serialize;

/// Raw aggregate over a product's approved reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingTotals {
    pub count: u64,
    pub sum: u64,
}

impl RatingTotals {
    pub fn from_ratings<I: IntoIterator<Item = i32>>(ratings: I) -> Self {
        ratings.into_iter().fold(Self::default(), |acc, rating| Self {
            count: acc.count + 1,
            sum: acc.sum + rating.max(0) as u64,
        })
    }
}

/// The derived `averageRating` / `reviewCount` pair written onto a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average_rating: f64,
    pub review_count: u64,
}

impl RatingSummary {
    /// Mean rounded half-up to one decimal. Integer arithmetic keeps 4.25 at 4.3.
    pub fn from_totals(totals: RatingTotals) -> Self {
        if totals.count == 0 {
            return Self::default();
        }
        let tenths = (totals.sum * 20 + totals.count) / (totals.count * 2);
        Self {
            average_rating: tenths as f64 / 10.0,
            review_count: totals.count,
        }
    }
}
