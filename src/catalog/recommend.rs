use std::cmp::Ordering;

use crate::entities::product;

pub const RELATED_LIMIT: usize = 4;

/// Numeric portion of a possibly currency-formatted price ("₹12,500.00" → 12500).
/// Unparseable input reads as zero.
pub fn parse_price(raw: &str) -> f64 {
    let Some(start) = raw.find(|c: char| c.is_ascii_digit()) else {
        return 0.0;
    };

    let mut digits = String::new();
    let mut seen_point = false;
    for c in raw[start..].chars() {
        match c {
            '0'..='9' => digits.push(c),
            ',' => {}
            '.' if !seen_point => {
                seen_point = true;
                digits.push(c);
            }
            _ => break,
        }
    }

    digits.trim_end_matches('.').parse().unwrap_or(0.0)
}

fn price_score(current_price: f64, candidate_price: f64) -> f64 {
    if current_price <= 0.0 {
        return 0.0;
    }
    let distance = (current_price - candidate_price).abs() / current_price;
    (100.0 - 100.0 * distance).max(0.0)
}

/// `0.3·priceScore + 20·averageRating + 10 if featured + 5 if stock > 10`.
pub fn score(current_price: f64, candidate: &product::Model) -> f64 {
    let mut score = 0.3 * price_score(current_price, parse_price(&candidate.new_price))
        + 20.0 * candidate.average_rating;
    if candidate.is_featured {
        score += 10.0;
    }
    if candidate.stock > 10 {
        score += 5.0;
    }
    score
}

/// Active, in-stock products of the same category, excluding `current`.
pub fn same_category_peers(
    current: &product::Model,
    products: Vec<product::Model>,
) -> Vec<product::Model> {
    products
        .into_iter()
        .filter(|p| {
            p.id != current.id && p.category == current.category && p.is_active && p.stock > 0
        })
        .collect()
}

/// Active featured products, excluding `current`.
pub fn featured_fallback(
    current: &product::Model,
    products: Vec<product::Model>,
) -> Vec<product::Model> {
    products
        .into_iter()
        .filter(|p| p.id != current.id && p.is_featured && p.is_active)
        .collect()
}

/// Orders `candidates` by descending score, keeping insertion order on ties,
/// and keeps the best [`RELATED_LIMIT`].
pub fn rank(current: &product::Model, candidates: Vec<product::Model>) -> Vec<product::Model> {
    let current_price = parse_price(&current.new_price);
    let mut scored: Vec<(f64, product::Model)> = candidates
        .into_iter()
        .map(|candidate| (score(current_price, &candidate), candidate))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored
        .into_iter()
        .take(RELATED_LIMIT)
        .map(|(_, product)| product)
        .collect()
}

/// Full recommendation step over a pre-fetched pool of products.
pub fn related(
    current: &product::Model,
    same_category: Vec<product::Model>,
    featured: impl FnOnce() -> Vec<product::Model>,
) -> Vec<product::Model> {
    let peers = same_category_peers(current, same_category);
    if !peers.is_empty() {
        return rank(current, peers);
    }
    rank(current, featured_fallback(current, featured()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::product::Category;
    use crate::entities::{Specifications, StringList};
    use chrono::Utc;
    use uuid::Uuid;

    fn product(title: &str, price: &str, rating: f64) -> product::Model {
        let now = Utc::now();
        product::Model {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            category: Category::SolarPanels,
            new_price: price.to_string(),
            old_price: None,
            price_value: parse_price(price),
            stock: 5,
            is_active: true,
            is_featured: false,
            average_rating: rating,
            review_count: 0,
            specifications: Specifications::default(),
            images: StringList::default(),
            tags: StringList::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn titles(products: &[product::Model]) -> Vec<&str> {
        products.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price("₹12,500.00"), 12500.0);
        assert_eq!(parse_price("$ 499.99 /unit"), 499.99);
        assert_eq!(parse_price("Rs. 100"), 100.0);
        assert_eq!(parse_price("1.2.3"), 1.2);
        assert_eq!(parse_price("Call for price"), 0.0);
        assert_eq!(parse_price(""), 0.0);
    }

    #[test]
    fn test_score_terms() {
        let mut candidate = product("b", "1000", 4.0);
        // Same price: 0.3 * 100 + 20 * 4
        assert_eq!(score(1000.0, &candidate), 110.0);

        candidate.is_featured = true;
        candidate.stock = 11;
        assert_eq!(score(1000.0, &candidate), 125.0);

        // Twice the price is out of range for the price term.
        candidate.new_price = "3000".to_string();
        assert_eq!(score(1000.0, &candidate), 95.0);
    }

    #[test]
    fn test_zero_price_ignores_price_term() {
        let current = product("free", "0", 0.0);
        let cheap = product("cheap", "0", 3.0);
        let pricey = product("pricey", "9999", 4.0);

        assert_eq!(score(0.0, &cheap), 60.0);
        let ranked = rank(&current, vec![cheap, pricey]);
        assert_eq!(titles(&ranked), vec!["pricey", "cheap"]);
    }

    #[test]
    fn test_limits_and_excludes_self() {
        let current = product("current", "1000", 0.0);
        let mut pool = vec![current.clone()];
        for i in 0..6 {
            pool.push(product(&format!("p{i}"), "1000", i as f64 * 0.5));
        }

        let ranked = related(&current, pool, Vec::new);
        assert_eq!(ranked.len(), RELATED_LIMIT);
        assert!(ranked.iter().all(|p| p.id != current.id));
        assert_eq!(titles(&ranked), vec!["p5", "p4", "p3", "p2"]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let current = product("current", "1000", 0.0);
        let pool = vec![
            product("first", "1000", 4.0),
            product("second", "1000", 4.0),
            product("third", "1000", 4.0),
        ];
        assert_eq!(
            titles(&rank(&current, pool)),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_skips_inactive_and_out_of_stock() {
        let current = product("current", "1000", 0.0);
        let mut inactive = product("inactive", "1000", 5.0);
        inactive.is_active = false;
        let mut sold_out = product("sold out", "1000", 5.0);
        sold_out.stock = 0;
        let mut other_category = product("battery", "1000", 5.0);
        other_category.category = Category::Batteries;
        let ok = product("ok", "1000", 1.0);

        let ranked = related(&current, vec![inactive, sold_out, other_category, ok], Vec::new);
        assert_eq!(titles(&ranked), vec!["ok"]);
    }

    #[test]
    fn test_falls_back_to_featured() {
        let current = product("current", "1000", 0.0);
        let mut featured = product("featured", "800", 4.5);
        featured.category = Category::Inverters;
        featured.is_featured = true;
        let mut hidden = featured.clone();
        hidden.id = Uuid::new_v4();
        hidden.title = "hidden".to_string();
        hidden.is_active = false;

        let ranked = related(&current, Vec::new(), || vec![featured, hidden]);
        assert_eq!(titles(&ranked), vec!["featured"]);
    }

    #[test]
    fn test_empty_everywhere() {
        let current = product("current", "1000", 0.0);
        assert!(related(&current, vec![current.clone()], Vec::new).is_empty());
    }
}
