//! # Receipt Formatter
//!
//! Turns one [`OrderRecord`] into a [`Receipt`] description:
//!
//! 1. header (store identity) centered at double height
//! 2. transaction id, order date and time
//! 3. fixed-width item table
//! 4. subtotal, shipping and total in bold
//! 5. centered footer, feed, cut
//!
//! Totals are taken from the order as given. The subtotal printed is
//! `total - shipping` even when malformed items were dropped.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    Alignment, ItemRow, NAME_WIDTH, PRICE_WIDTH, QTY_WIDTH, Receipt, ReceiptLine, TextSize,
    label_row,
};
use crate::error::ValidationError;
use crate::order::OrderRecord;

/// Money formatting rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrencyFormat {
    /// Printed before every amount.
    pub marker: String,
    pub decimals: u8,
    /// Digit grouping separator, `None` disables grouping.
    pub thousands_separator: Option<char>,
    pub decimal_point: char,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            marker: "$".into(),
            decimals: 2,
            thousands_separator: Some(','),
            decimal_point: '.',
        }
    }
}

impl CurrencyFormat {
    /// Format an amount without the marker, e.g. `1,234.50`.
    pub fn amount(&self, value: f64) -> String {
        let decimals = u32::from(self.decimals.min(6));
        let scale = 10u64.pow(decimals);
        let scaled = (value.abs() * scale as f64).round() as u64;
        let (whole, frac) = (scaled / scale, scaled % scale);

        let digits = whole.to_string();
        let mut out = String::new();
        if value < 0.0 && scaled != 0 {
            out.push('-');
        }
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                if let Some(sep) = self.thousands_separator {
                    out.push(sep);
                }
            }
            out.push(ch);
        }
        if decimals > 0 {
            out.push(self.decimal_point);
            let _ = write!(out, "{frac:0width$}", width = decimals as usize);
        }
        out
    }

    /// Format an amount with the marker, e.g. `$1,234.50`.
    pub fn display(&self, value: f64) -> String {
        format!("{}{}", self.marker, self.amount(value))
    }
}

/// Store identity and receipt wording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreProfile {
    pub name: String,
    /// Fixed lines printed under the store name.
    pub header_lines: Vec<String>,
    /// Fixed lines printed centered at the bottom.
    pub footer_lines: Vec<String>,
    pub currency: CurrencyFormat,
    /// `strftime` format for the order date.
    pub date_format: String,
    /// `strftime` format for the order time.
    pub time_format: String,
}

impl Default for StoreProfile {
    fn default() -> Self {
        Self {
            name: "CORNER CAFE".into(),
            header_lines: vec!["Food & Beverage".into()],
            footer_lines: vec![
                "Thank you for your order!".into(),
                "Goods sold are non-returnable.".into(),
            ],
            currency: CurrencyFormat::default(),
            date_format: "%d/%m/%Y".into(),
            time_format: "%H:%M".into(),
        }
    }
}

/// Builds receipt descriptions for one store.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    profile: StoreProfile,
}

impl Formatter {
    pub fn new(profile: StoreProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &StoreProfile {
        &self.profile
    }

    /// Format an order into a receipt description.
    ///
    /// Deterministic: the same order always yields the same description.
    ///
    /// ## Errors
    ///
    /// Returns a [`ValidationError`] when the order has no item list or no
    /// valid items. Individual malformed items are skipped.
    pub fn format(&self, order: &OrderRecord) -> Result<Receipt, ValidationError> {
        let valid = order.valid_items()?;
        if valid.dropped > 0 {
            warn!(
                transaction = %order.transaction_id,
                dropped = valid.dropped,
                "Skipping malformed order items"
            );
        }

        let currency = &self.profile.currency;
        let mut lines = Vec::new();

        // Header
        lines.push(ReceiptLine::Init);
        lines.push(ReceiptLine::Align(Alignment::Center));
        lines.push(ReceiptLine::Size(TextSize::DoubleHeight));
        lines.push(ReceiptLine::Text(self.profile.name.clone()));
        for header in &self.profile.header_lines {
            lines.push(ReceiptLine::Text(header.clone()));
        }
        lines.push(ReceiptLine::Size(TextSize::Normal));
        lines.push(ReceiptLine::Bold(false));
        lines.push(ReceiptLine::Align(Alignment::Left));
        lines.push(ReceiptLine::Feed(1));

        // Metadata
        lines.push(ReceiptLine::Text(format!(
            "Transaction: {}",
            order.transaction_id
        )));
        lines.push(ReceiptLine::Text(format!(
            "Date: {}",
            format_timestamp(&order.order_date, &self.profile.date_format)
        )));
        lines.push(ReceiptLine::Text(format!(
            "Time: {}",
            format_timestamp(&order.order_date, &self.profile.time_format)
        )));
        lines.push(ReceiptLine::Rule);

        // Item table
        lines.push(ReceiptLine::Text(format!(
            "{:<NAME_WIDTH$} {:>QTY_WIDTH$} {:>w$}",
            "Item",
            "Qty",
            "Price",
            w = PRICE_WIDTH + currency.marker.chars().count(),
        )));
        lines.push(ReceiptLine::Rule);
        for item in &valid.items {
            let row = ItemRow {
                name: item.title.clone(),
                quantity: item.quantity,
                price: currency.amount(item.line_total()),
                currency: currency.marker.clone(),
            };
            if row.overflows() {
                warn!(item = %row.name, price = %row.price, "Item row exceeds column width");
            }
            lines.push(ReceiptLine::Item(row));
        }
        lines.push(ReceiptLine::Rule);

        // Totals
        let subtotal = order.total_amount - order.shipping_cost;
        lines.push(ReceiptLine::Bold(true));
        lines.push(ReceiptLine::Text(label_row(
            "Subtotal",
            &currency.display(subtotal),
        )));
        lines.push(ReceiptLine::Text(label_row(
            "Shipping",
            &currency.display(order.shipping_cost),
        )));
        lines.push(ReceiptLine::Text(label_row(
            "Total",
            &currency.display(order.total_amount),
        )));
        lines.push(ReceiptLine::Bold(false));
        lines.push(ReceiptLine::Rule);

        // Footer
        lines.push(ReceiptLine::Align(Alignment::Center));
        for footer in &self.profile.footer_lines {
            lines.push(ReceiptLine::Text(footer.clone()));
        }
        lines.push(ReceiptLine::Align(Alignment::Left));
        lines.push(ReceiptLine::Feed(3));
        lines.push(ReceiptLine::Cut);

        debug!(
            transaction = %order.transaction_id,
            items = valid.items.len(),
            lines = lines.len(),
            "Formatted receipt"
        );

        Ok(Receipt::new(lines))
    }
}

/// Format with a `strftime` pattern, falling back to RFC 3339 when the
/// pattern is invalid (chrono reports that as a `fmt::Error`).
fn format_timestamp(ts: &DateTime<FixedOffset>, pattern: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", ts.format(pattern)).is_err() {
        warn!(pattern, "Invalid date/time format, using RFC 3339");
        return ts.to_rfc3339();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::LineItem;
    use crate::receipt::LINE_WIDTH;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-05T14:30:00+07:00").unwrap()
    }

    fn order() -> OrderRecord {
        OrderRecord::new(
            "ORD-1001",
            date(),
            &[
                LineItem::new("Iced Coffee", 2, 25.0),
                LineItem::new("Chocolate Croissant", 1, 18.5),
            ],
            10.0,
            78.5,
        )
    }

    #[test]
    fn test_amount_formatting() {
        let c = CurrencyFormat::default();
        assert_eq!(c.amount(0.0), "0.00");
        assert_eq!(c.amount(3.5), "3.50");
        assert_eq!(c.amount(1234567.891), "1,234,567.89");
        assert_eq!(c.amount(-12.3), "-12.30");
        assert_eq!(c.display(999.999), "$1,000.00");
    }

    #[test]
    fn test_amount_without_decimals() {
        let c = CurrencyFormat {
            marker: "Rp".into(),
            decimals: 0,
            thousands_separator: Some('.'),
            decimal_point: ',',
        };
        assert_eq!(c.amount(45000.0), "45.000");
        assert_eq!(c.display(1500000.0), "Rp1.500.000");
    }

    #[test]
    fn test_format_is_deterministic() {
        let f = Formatter::default();
        assert_eq!(f.format(&order()).unwrap(), f.format(&order()).unwrap());
    }

    #[test]
    fn test_preview_layout() {
        let receipt = Formatter::default().format(&order()).unwrap();
        let preview = receipt.preview();

        assert!(preview.contains(&"Transaction: ORD-1001".to_string()));
        assert!(preview.contains(&"Date: 05/03/2024".to_string()));
        assert!(preview.contains(&"Time: 14:30".to_string()));
        assert!(preview.contains(&"Iced Coffee       2 $     50.00".to_string()));
        assert!(preview.contains(&"Chocolate Crois   1 $     18.50".to_string()));
        assert!(preview.contains(&"sant".to_string()));
        assert!(preview.contains(&label_row("Subtotal", "$68.50")));
        assert!(preview.contains(&label_row("Shipping", "$10.00")));
        assert!(preview.contains(&label_row("Total", "$78.50")));

        for line in &preview {
            assert!(line.chars().count() <= LINE_WIDTH, "too wide: {line:?}");
        }
    }

    #[test]
    fn test_structure() {
        let receipt = Formatter::default().format(&order()).unwrap();
        let lines = receipt.lines();

        assert_eq!(lines[0], ReceiptLine::Init);
        assert_eq!(lines[1], ReceiptLine::Align(Alignment::Center));
        assert_eq!(lines[2], ReceiptLine::Size(TextSize::DoubleHeight));
        assert_eq!(lines[lines.len() - 1], ReceiptLine::Cut);
        assert_eq!(lines[lines.len() - 2], ReceiptLine::Feed(3));

        // Totals are wrapped in bold
        let bold_on = lines.iter().position(|l| *l == ReceiptLine::Bold(true)).unwrap();
        assert!(matches!(&lines[bold_on + 1], ReceiptLine::Text(t) if t.starts_with("Subtotal")));
        assert_eq!(lines[bold_on + 4], ReceiptLine::Bold(false));
    }

    #[test]
    fn test_subtotal_trusts_caller_total() {
        let mut o = OrderRecord::new(
            "ORD-2",
            date(),
            &[LineItem::new("Tea", 1, 3.0)],
            2.0,
            100.0,
        );
        o.items = Some(json!([
            {"title": "Tea", "quantity": 1, "price": 3.0},
            {"title": "Broken", "quantity": 1},
        ]));

        let receipt = Formatter::default().format(&o).unwrap();
        assert_eq!(receipt.items().count(), 1);
        assert!(receipt.preview().contains(&label_row("Subtotal", "$98.00")));
    }

    #[test]
    fn test_one_malformed_of_three_prints_two_rows() {
        let mut o = order();
        o.items = Some(json!([
            {"title": "Tea", "quantity": 1, "price": 3.0},
            {"title": "Cake", "quantity": 1},
            {"title": "Juice", "quantity": 2, "price": 4.0},
        ]));
        let receipt = Formatter::default().format(&o).unwrap();
        let names: Vec<_> = receipt.items().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Tea", "Juice"]);
    }

    #[test]
    fn test_no_valid_items_is_validation_error() {
        let mut o = order();
        o.items = Some(json!([{"title": "Cake"}]));
        assert_eq!(
            Formatter::default().format(&o),
            Err(ValidationError::NoValidItems { dropped: 1 })
        );

        o.items = None;
        assert_eq!(
            Formatter::default().format(&o),
            Err(ValidationError::MissingItems)
        );
    }

    #[test]
    fn test_invalid_time_format_falls_back() {
        let profile = StoreProfile {
            time_format: "%Q".into(),
            ..Default::default()
        };
        let receipt = Formatter::new(profile).format(&order()).unwrap();
        assert!(
            receipt
                .preview()
                .contains(&"Time: 2024-03-05T14:30:00+07:00".to_string())
        );
    }
}
