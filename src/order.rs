//! # Order Records
//!
//! The transaction data handed over by the storefront. It is consumed
//! read-only: nothing here recomputes or validates totals.
//!
//! Items arrive as loosely shaped JSON. Extraction is lenient per item: an
//! item missing its title, quantity or price is dropped, and only an order
//! with no usable items at all is rejected.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ValidationError;

/// A transaction as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub transaction_id: String,
    pub order_date: DateTime<FixedOffset>,
    /// Raw item list. Kept untyped so malformed entries can be skipped
    /// instead of failing deserialization of the whole order.
    #[serde(default)]
    pub items: Option<Value>,
    #[serde(default)]
    pub shipping_cost: f64,
    pub total_amount: f64,
}

/// A well-formed line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub title: String,
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
}

impl LineItem {
    pub fn new(title: impl Into<String>, quantity: u32, price: f64) -> Self {
        Self {
            title: title.into(),
            quantity,
            price,
        }
    }

    /// Unit price times quantity.
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Result of filtering an order's items.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidItems {
    pub items: Vec<LineItem>,
    pub dropped: usize,
}

impl OrderRecord {
    /// Build an order from typed items.
    pub fn new(
        transaction_id: impl Into<String>,
        order_date: DateTime<FixedOffset>,
        items: &[LineItem],
        shipping_cost: f64,
        total_amount: f64,
    ) -> Self {
        let items = items
            .iter()
            .map(|item| json!({"title": item.title, "quantity": item.quantity, "price": item.price}))
            .collect();

        Self {
            transaction_id: transaction_id.into(),
            order_date,
            items: Some(Value::Array(items)),
            shipping_cost,
            total_amount,
        }
    }

    /// Extract the printable items, dropping malformed ones.
    ///
    /// ## Errors
    ///
    /// - [`ValidationError::MissingItems`] when `items` is absent or null
    /// - [`ValidationError::ItemsNotAList`] when `items` is not an array
    /// - [`ValidationError::NoValidItems`] when every entry was malformed
    pub fn valid_items(&self) -> Result<ValidItems, ValidationError> {
        let raw = match &self.items {
            None | Some(Value::Null) => return Err(ValidationError::MissingItems),
            Some(Value::Array(raw)) => raw,
            Some(_) => return Err(ValidationError::ItemsNotAList),
        };

        let items: Vec<LineItem> = raw.iter().filter_map(parse_item).collect();
        let dropped = raw.len() - items.len();

        if items.is_empty() {
            return Err(ValidationError::NoValidItems { dropped });
        }

        Ok(ValidItems { items, dropped })
    }
}

/// An item is usable when it has a non-empty title, a non-zero whole
/// quantity and a non-zero finite price. Numeric strings are accepted.
fn parse_item(value: &Value) -> Option<LineItem> {
    let obj = value.as_object()?;

    let title = obj.get("title")?.as_str()?.trim();
    if title.is_empty() {
        return None;
    }

    let quantity = number(obj.get("quantity")?)?;
    if quantity <= 0.0 || quantity.fract() != 0.0 || quantity > f64::from(u32::MAX) {
        return None;
    }

    let price = number(obj.get("price")?)?;
    if price == 0.0 {
        return None;
    }

    Some(LineItem::new(title, quantity as u32, price))
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(items: Option<Value>) -> OrderRecord {
        OrderRecord {
            transaction_id: "TX-1".into(),
            order_date: DateTime::parse_from_rfc3339("2024-03-05T14:30:00+07:00").unwrap(),
            items,
            shipping_cost: 5.0,
            total_amount: 25.0,
        }
    }

    #[test]
    fn test_missing_items() {
        assert_eq!(order(None).valid_items(), Err(ValidationError::MissingItems));
        assert_eq!(
            order(Some(Value::Null)).valid_items(),
            Err(ValidationError::MissingItems)
        );
    }

    #[test]
    fn test_items_not_a_list() {
        let o = order(Some(json!({"title": "Tea"})));
        assert_eq!(o.valid_items(), Err(ValidationError::ItemsNotAList));
    }

    #[test]
    fn test_malformed_item_dropped() {
        let o = order(Some(json!([
            {"title": "Tea", "quantity": 1, "price": 3.0},
            {"title": "Cake", "quantity": 2},
            {"title": "Juice", "quantity": 1, "price": 4.5},
        ])));
        let valid = o.valid_items().unwrap();
        assert_eq!(valid.items.len(), 2);
        assert_eq!(valid.dropped, 1);
        assert_eq!(valid.items[1].title, "Juice");
    }

    #[test]
    fn test_falsy_fields_are_malformed() {
        let o = order(Some(json!([
            {"title": "", "quantity": 1, "price": 1.0},
            {"title": "A", "quantity": 0, "price": 1.0},
            {"title": "B", "quantity": 1, "price": 0},
            {"title": "C", "quantity": 1.5, "price": 1.0},
            {"title": "D", "quantity": "x", "price": 1.0},
            "not an object",
        ])));
        assert_eq!(
            o.valid_items(),
            Err(ValidationError::NoValidItems { dropped: 6 })
        );
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let o = order(Some(json!([{"title": "Tea", "quantity": "2", "price": "3.25"}])));
        let valid = o.valid_items().unwrap();
        assert_eq!(valid.items[0], LineItem::new("Tea", 2, 3.25));
    }

    #[test]
    fn test_empty_list_is_no_valid_items() {
        let o = order(Some(json!([])));
        assert_eq!(
            o.valid_items(),
            Err(ValidationError::NoValidItems { dropped: 0 })
        );
    }

    #[test]
    fn test_deserialize_camel_case() {
        let o: OrderRecord = serde_json::from_str(
            r#"{
                "transactionId": "ORD-42",
                "orderDate": "2024-03-05T14:30:00+07:00",
                "items": [{"title": "Tea", "quantity": 1, "price": 3}],
                "shippingCost": 2,
                "totalAmount": 5
            }"#,
        )
        .unwrap();
        assert_eq!(o.transaction_id, "ORD-42");
        assert_eq!(o.shipping_cost, 2.0);
        assert_eq!(o.valid_items().unwrap().items.len(), 1);
    }

    #[test]
    fn test_new_round_trips_items() {
        let o = OrderRecord::new(
            "TX",
            DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
            &[LineItem::new("Tea", 2, 1.5)],
            0.0,
            3.0,
        );
        assert_eq!(o.valid_items().unwrap().items, vec![LineItem::new("Tea", 2, 1.5)]);
    }
}
