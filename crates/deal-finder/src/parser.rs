/// Turns free-form model replies into normalized `Deal` records.
///
/// Extraction: strip a fenced code block if the reply is wrapped in one; if
/// what remains is not a bare array, take the first balanced `[...]` span.
/// Normalization fills every missing or unusable field with a fixed
/// default, element by element. Only unparseable JSON is an error.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde_json::{Map, Value};

use deal_common::model::Deal;

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

pub fn parse(text: &str, category_fallback: &str) -> Result<Vec<Deal>, ParseError> {
    let json = extract_json_array(text)?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ParseError::MalformedResponse(format!("invalid JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(ParseError::MalformedResponse(
            "expected a JSON array".to_string(),
        ));
    };

    let stamp = unix_millis();
    let empty = Map::new();
    Ok(items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let fields = item.as_object().unwrap_or(&empty);
            normalize(fields, index, stamp, category_fallback)
        })
        .collect())
}

/// Locate the JSON array inside a model reply.
fn extract_json_array(text: &str) -> Result<&str, ParseError> {
    let fence_re = Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```$").expect("valid regex");

    let trimmed = text.trim();
    let body = match fence_re.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    };

    if body.starts_with('[') && body.ends_with(']') {
        return Ok(body);
    }
    first_balanced_array(body)
        .ok_or_else(|| ParseError::MalformedResponse("no JSON array found in reply".to_string()))
}

/// First `[...]` span whose brackets balance, ignoring brackets inside JSON
/// string literals.
fn first_balanced_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn normalize(fields: &Map<String, Value>, index: usize, stamp: u128, category_fallback: &str) -> Deal {
    let title = string_field(fields, "title").unwrap_or_else(|| "Product".to_string());
    let description = string_field(fields, "description")
        .unwrap_or_else(|| format!("Black Friday deal on {title}"));
    let image_url =
        string_field(fields, "imageUrl").unwrap_or_else(|| placeholder_image_url(&title));

    Deal {
        id: string_field(fields, "id").unwrap_or_else(|| format!("deal-{stamp}-{index}")),
        category: string_field(fields, "category").unwrap_or_else(|| category_fallback.to_string()),
        original_price: price_field(fields, "originalPrice"),
        sale_price: price_field(fields, "salePrice"),
        savings: price_field(fields, "savings"),
        discount_percent: count_field(fields, "discountPercent")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        rating: string_field(fields, "rating").unwrap_or_else(|| "4.5".to_string()),
        reviews: count_field(fields, "reviews").unwrap_or(0),
        stock: count_field(fields, "stock").unwrap_or(0),
        seller: string_field(fields, "seller").unwrap_or_else(|| "Amazon".to_string()),
        shipping_cost: shipping_field(fields),
        product_url: string_field(fields, "productUrl").unwrap_or_else(|| "#".to_string()),
        title,
        description,
        image_url,
    }
}

/// Placeholder image showing `label`.
pub fn placeholder_image_url(label: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(label.as_bytes()).collect();
    format!("https://via.placeholder.com/300x300/0066cc/ffffff?text={encoded}")
}

/// Non-blank string, or a number rendered as text.
fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn price_field(fields: &Map<String, Value>, key: &str) -> String {
    let price = match fields.get(key) {
        Some(Value::String(s)) => {
            let stripped = s.trim().trim_start_matches(CURRENCY_SYMBOLS).trim();
            (!stripped.is_empty() && !stripped.starts_with('-')).then(|| stripped.to_string())
        }
        Some(Value::Number(n)) => n.as_f64().filter(|v| *v >= 0.0).map(|v| format!("{v:.2}")),
        _ => None,
    };
    price.unwrap_or_else(|| "0.00".to_string())
}

/// Non-negative integer from a number or from the leading digits of a string
/// ("35%", "1,204 reviews" is read as 1).
fn count_field(fields: &Map<String, Value>, key: &str) -> Option<u64> {
    match fields.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v.trunc() as u64)),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn shipping_field(fields: &Map<String, Value>) -> String {
    match fields.get("shippingCost") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v > 0.0 => format!("${v:.2}"),
            _ => "FREE".to_string(),
        },
        _ => "FREE".to_string(),
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = r#"[
        {"id":"a1","title":"Sony TV","description":"Big screen","category":"Electronics",
         "originalPrice":"$499.99","salePrice":"299.99","savings":"200.00","discountPercent":40,
         "rating":"4.7","reviews":1200,"stock":15,"seller":"Best Buy","shippingCost":"FREE",
         "productUrl":"https://example.com/tv","imageUrl":"https://example.com/tv.png"}
    ]"#;

    #[test]
    fn parses_bare_array() {
        let deals = parse(BARE, "General").unwrap();
        assert_eq!(deals.len(), 1);
        let d = &deals[0];
        assert_eq!(d.id, "a1");
        assert_eq!(d.original_price, "499.99");
        assert_eq!(d.sale_price, "299.99");
        assert_eq!(d.discount_percent, 40);
        assert_eq!(d.seller, "Best Buy");
        assert_eq!(d.product_url, "https://example.com/tv");
    }

    #[test]
    fn fenced_reply_matches_bare_array() {
        let fenced = format!("```json\n{BARE}\n```");
        let mut from_fence = parse(&fenced, "General").unwrap();
        let mut from_bare = parse(BARE, "General").unwrap();
        from_fence.iter_mut().for_each(|d| d.id.clear());
        from_bare.iter_mut().for_each(|d| d.id.clear());
        assert_eq!(from_fence, from_bare);

        let plain_fence = format!("```\n{BARE}\n```");
        assert_eq!(parse(&plain_fence, "General").unwrap().len(), 1);
    }

    #[test]
    fn finds_array_inside_prose() {
        let reply = "Here are the deals I found [as requested]:\n[{\"title\":\"Lamp [LED]\"}]\nEnjoy!";
        // The first bracket span is prose and not JSON, so this reply is malformed.
        assert!(parse(reply, "General").is_err());

        let reply = "Here are the deals:\n[{\"title\":\"Lamp [LED]\", \"stock\": 3}]\nEnjoy! [1]";
        let deals = parse(reply, "General").unwrap();
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].title, "Lamp [LED]");
        assert_eq!(deals[0].stock, 3);
    }

    #[test]
    fn empty_objects_are_fully_populated() {
        let deals = parse("[{}, {}, 7]", "Books").unwrap();
        assert_eq!(deals.len(), 3);
        for (i, d) in deals.iter().enumerate() {
            assert!(d.id.starts_with("deal-"));
            assert!(d.id.ends_with(&format!("-{i}")));
            assert_eq!(d.title, "Product");
            assert_eq!(d.category, "Books");
            assert_eq!(d.original_price, "0.00");
            assert_eq!(d.discount_percent, 0);
            assert_eq!(d.rating, "4.5");
            assert_eq!(d.seller, "Amazon");
            assert_eq!(d.shipping_cost, "FREE");
            assert_eq!(d.product_url, "#");
            assert!(d.image_url.contains("text=Product"));
        }
        assert_ne!(deals[0].id, deals[1].id);
    }

    #[test]
    fn coerces_numeric_fields() {
        let reply = r#"[{"discountPercent":"35%","reviews":"812","stock":-4,"rating":4.2,
            "originalPrice":120,"salePrice":"€78.5","shippingCost":4.99,"id":17}]"#;
        let d = &parse(reply, "General").unwrap()[0];
        assert_eq!(d.discount_percent, 35);
        assert_eq!(d.reviews, 812);
        assert_eq!(d.stock, 0);
        assert_eq!(d.rating, "4.2");
        assert_eq!(d.original_price, "120.00");
        assert_eq!(d.sale_price, "78.5");
        assert_eq!(d.shipping_cost, "$4.99");
        assert_eq!(d.id, "17");
    }

    #[test]
    fn negative_prices_fall_back_to_zero() {
        let reply = r#"[{"originalPrice":"-5.00","salePrice":"$-1.99","savings":-3}]"#;
        let d = &parse(reply, "General").unwrap()[0];
        assert_eq!(d.original_price, "0.00");
        assert_eq!(d.sale_price, "0.00");
        assert_eq!(d.savings, "0.00");
    }

    #[test]
    fn savings_are_not_recomputed() {
        let reply = r#"[{"originalPrice":"100.00","salePrice":"80.00","savings":"5.00"}]"#;
        assert_eq!(parse(reply, "General").unwrap()[0].savings, "5.00");
    }

    #[test]
    fn unparseable_text_is_malformed() {
        for reply in ["", "no deals today", "[{\"title\": }]", "{\"title\":\"x\"}", "[1, 2"] {
            let err = parse(reply, "General").unwrap_err();
            assert!(matches!(err, ParseError::MalformedResponse(_)), "{reply}");
        }
    }
}
