use std::cmp::Ordering;
use std::str::FromStr;

use deal_common::model::{Deal, ALL_CATEGORIES};

/// Stock below this count is flagged as running low.
pub const LOW_STOCK_THRESHOLD: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Discount,
    PriceLow,
    PriceHigh,
    Rating,
    Savings,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "discount" => Ok(SortKey::Discount),
            "price-low" => Ok(SortKey::PriceLow),
            "price-high" => Ok(SortKey::PriceHigh),
            "rating" => Ok(SortKey::Rating),
            "savings" => Ok(SortKey::Savings),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

/// Order deals by `key`; `None` keeps the input order. The sort is stable.
pub fn sort_deals(mut deals: Vec<Deal>, key: Option<SortKey>) -> Vec<Deal> {
    let Some(key) = key else {
        return deals;
    };
    match key {
        SortKey::Discount => deals.sort_by(|a, b| b.discount_percent.cmp(&a.discount_percent)),
        SortKey::PriceLow => deals.sort_by(|a, b| cmp_amount(&a.sale_price, &b.sale_price)),
        SortKey::PriceHigh => deals.sort_by(|a, b| cmp_amount(&b.sale_price, &a.sale_price)),
        SortKey::Rating => deals.sort_by(|a, b| cmp_amount(&b.rating, &a.rating)),
        SortKey::Savings => deals.sort_by(|a, b| cmp_amount(&b.savings, &a.savings)),
    }
    deals
}

/// Numeric comparison of string amounts; unparseable values count as zero.
fn cmp_amount(a: &str, b: &str) -> Ordering {
    amount(a).total_cmp(&amount(b))
}

fn amount(s: &str) -> f64 {
    s.trim()
        .trim_start_matches('$')
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    Low,
    Ok,
}

impl StockLevel {
    pub fn of(deal: &Deal) -> Self {
        if deal.stock < LOW_STOCK_THRESHOLD {
            StockLevel::Low
        } else {
            StockLevel::Ok
        }
    }
}

/// Headline shown above a result list, e.g. "Found 3 deals in Books".
pub fn results_summary(count: usize, category: &str) -> String {
    if count == 0 {
        return "No deals found".to_string();
    }
    let plural = if count == 1 { "" } else { "s" };
    let category = category.trim();
    if category.is_empty() || category.eq_ignore_ascii_case(ALL_CATEGORIES) {
        format!("Found {count} deal{plural}")
    } else {
        format!("Found {count} deal{plural} in {category}")
    }
}
