/// Offline deal generator.
///
/// Draws deals from fixed brand/product tables, then applies the query as a
/// case-insensitive substring filter. The filter runs after generation, so a
/// query that matches nothing yields an empty list.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use rand::Rng;

use deal_common::model::{Deal, ALL_CATEGORIES, CATEGORIES};

use crate::parser::placeholder_image_url;

const BRANDS: [&str; 10] = [
    "Samsung",
    "Sony",
    "Apple",
    "LG",
    "Dell",
    "HP",
    "Nike",
    "Adidas",
    "Cuisinart",
    "KitchenAid",
];

const SELLERS: [&str; 5] = ["Amazon", "Best Buy", "Walmart", "Target", "Newegg"];

const FREE_SHIPPING_PROBABILITY: f64 = 0.6;

fn product_names(category: &str) -> &'static [&'static str] {
    match category {
        "Home & Kitchen" => &[
            "Coffee Maker",
            "Blender",
            "Air Fryer",
            "Vacuum Cleaner",
            "Stand Mixer",
            "Toaster Oven",
        ],
        "Fashion" => &[
            "Winter Jacket",
            "Running Shoes",
            "Handbag",
            "Sunglasses",
            "Watch",
            "Sneakers",
        ],
        "Toys & Games" => &[
            "Board Game",
            "Action Figure",
            "LEGO Set",
            "Puzzle",
            "Doll House",
            "Remote Control Car",
        ],
        "Sports" => &[
            "Yoga Mat",
            "Dumbbells",
            "Treadmill",
            "Bike",
            "Fitness Tracker",
            "Tennis Racket",
        ],
        "Books" => &[
            "Bestseller Novel",
            "Cookbook",
            "Biography",
            "Self-Help Book",
            "Science Fiction",
        ],
        // Electronics, and any category without its own table.
        _ => &[
            "4K Smart TV",
            "Wireless Headphones",
            "Laptop",
            "Tablet",
            "Smart Watch",
            "Camera",
            "Gaming Console",
        ],
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MockDealGenerator;

impl MockDealGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, query: &str, category: &str) -> Vec<Deal> {
        self.generate_with(&mut rand::thread_rng(), query, category)
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R, query: &str, category: &str) -> Vec<Deal> {
        filter_by_query(self.candidates(rng, category), query)
    }

    /// The unfiltered draw: between 15 and 34 deals.
    pub fn candidates<R: Rng + ?Sized>(&self, rng: &mut R, category: &str) -> Vec<Deal> {
        let count = rng.gen_range(15..=34);
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_millis();
        let fixed_category = (!category.trim().is_empty()
            && !category.eq_ignore_ascii_case(ALL_CATEGORIES))
        .then(|| category.trim());

        (0..count)
            .map(|i| {
                let deal_category = match fixed_category {
                    Some(c) => c,
                    None => CATEGORIES.choose(rng).copied().unwrap_or(CATEGORIES[0]),
                };
                mock_deal(rng, format!("deal-{stamp}-{i}"), deal_category)
            })
            .collect()
    }
}

fn mock_deal<R: Rng + ?Sized>(rng: &mut R, id: String, category: &str) -> Deal {
    let brand = BRANDS.choose(rng).copied().unwrap_or(BRANDS[0]);
    let product = product_names(category)
        .choose(rng)
        .copied()
        .unwrap_or("Product");

    let original_price = f64::from(rng.gen_range(100u32..=999));
    let discount_percent: u32 = rng.gen_range(20..=79);
    let sale_price = original_price * (1.0 - f64::from(discount_percent) / 100.0);
    let savings = original_price - sale_price;

    let rating: f64 = rng.gen_range(3.0..=5.0);
    let shipping_cost = if rng.gen_bool(FREE_SHIPPING_PROBABILITY) {
        "FREE".to_string()
    } else {
        format!("${:.2}", rng.gen_range(5.0..=25.0))
    };

    let title = format!("{brand} {product}");
    Deal {
        id,
        description: format!("Amazing Black Friday deal on {title}. Limited time offer!"),
        title,
        category: category.to_string(),
        original_price: format!("{original_price:.2}"),
        sale_price: format!("{sale_price:.2}"),
        savings: format!("{savings:.2}"),
        discount_percent,
        rating: format!("{rating:.1}"),
        reviews: rng.gen_range(100..=5099),
        stock: rng.gen_range(10..=109),
        seller: SELLERS.choose(rng).copied().unwrap_or(SELLERS[0]).to_string(),
        shipping_cost,
        product_url: "#".to_string(),
        image_url: placeholder_image_url(product),
    }
}

/// Keep deals whose title, description or category contains `query`,
/// ignoring case. A blank query keeps everything.
pub fn filter_by_query(deals: Vec<Deal>, query: &str) -> Vec<Deal> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return deals;
    }
    deals
        .into_iter()
        .filter(|d| {
            d.title.to_lowercase().contains(&query)
                || d.description.to_lowercase().contains(&query)
                || d.category.to_lowercase().contains(&query)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn amount(s: &str) -> f64 {
        s.parse().unwrap()
    }

    #[test]
    fn candidate_count_and_ranges_hold() {
        let generator = MockDealGenerator::new();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let deals = generator.candidates(&mut rng, "all");
            assert!((15..=34).contains(&deals.len()), "seed {seed}: {}", deals.len());

            for d in &deals {
                assert!((20..=79).contains(&d.discount_percent));
                assert!((10..=109).contains(&d.stock));
                assert!((100..=5099).contains(&d.reviews));
                let rating = amount(&d.rating);
                assert!((3.0..=5.0).contains(&rating));
                assert!(CATEGORIES.contains(&d.category.as_str()));

                let original = amount(&d.original_price);
                assert!((100.0..=999.0).contains(&original));
                let expected_sale = original * (1.0 - f64::from(d.discount_percent) / 100.0);
                assert!((amount(&d.sale_price) - expected_sale).abs() <= 0.005 + 1e-9);
                let expected_savings = original - amount(&d.sale_price);
                assert!((amount(&d.savings) - expected_savings).abs() <= 0.011);

                assert!(d.shipping_cost == "FREE" || d.shipping_cost.starts_with('$'));
            }
        }
    }

    #[test]
    fn requested_category_is_used_for_every_deal() {
        let mut rng = StdRng::seed_from_u64(7);
        let deals = MockDealGenerator::new().generate_with(&mut rng, "", "Books");
        assert!(deals.len() >= 15);
        assert!(deals.iter().all(|d| d.category == "Books"));
    }

    #[test]
    fn unknown_category_uses_electronics_products() {
        let mut rng = StdRng::seed_from_u64(11);
        let deals = MockDealGenerator::new().candidates(&mut rng, "Garden");
        let electronics = product_names("Electronics");
        for d in deals {
            assert_eq!(d.category, "Garden");
            assert!(electronics.iter().any(|p| d.title.ends_with(p)));
        }
    }

    #[test]
    fn ids_are_unique_within_a_result() {
        let mut rng = StdRng::seed_from_u64(3);
        let deals = MockDealGenerator::new().candidates(&mut rng, "all");
        let mut ids: Vec<&str> = deals.iter().map(|d| d.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), deals.len());
    }

    #[test]
    fn query_filter_is_case_insensitive() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut deals = MockDealGenerator::new().candidates(&mut rng, "Electronics");
        deals.truncate(2);
        deals[0].title = "Apple Laptop".to_string();
        deals[0].description = "x".to_string();
        deals[1].title = "Sony TV".to_string();
        deals[1].description = "y".to_string();
        deals[1].category = "Electronics".to_string();

        let kept = filter_by_query(deals.clone(), "apple");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Apple Laptop");

        assert_eq!(filter_by_query(deals.clone(), "   ").len(), 2);
        assert_eq!(filter_by_query(deals, "ELECTRON").len(), 2);
    }

    #[test]
    fn non_matching_query_can_return_nothing() {
        let mut rng = StdRng::seed_from_u64(5);
        let deals = MockDealGenerator::new().generate_with(&mut rng, "zzz-no-such-product", "all");
        assert!(deals.is_empty());
    }
}
