//! # Receipt Description
//!
//! The printer-agnostic intermediate form between the
//! [`Formatter`](format::Formatter) and the [encoder](crate::protocol::encode).
//!
//! ```text
//! OrderRecord ──► Formatter ──► Receipt (Vec<ReceiptLine>) ──► encode ──► bytes
//! ```
//!
//! A [`Receipt`] is built once per print job and never mutated afterwards.
//!
//! ## Column Layout (32-column paper)
//!
//! ```text
//! 0              15  16-18  20 21-30
//! |name (15)     | |qty| |$|price (10)|
//! Iced Coffee       2 $     50.00
//! Very long produ   1 $      9.00
//! ct name
//! ```
//!
//! The widths are fixed; changing them breaks alignment on paper.

pub mod format;

/// Characters per printed line.
pub const LINE_WIDTH: usize = 32;

/// Width of the item-name column.
pub const NAME_WIDTH: usize = 15;

/// Width of the right-justified quantity field.
pub const QTY_WIDTH: usize = 3;

/// Width of the right-justified price field (after the currency marker).
pub const PRICE_WIDTH: usize = 10;

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Character size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSize {
    #[default]
    Normal,
    DoubleHeight,
    DoubleWidth,
    Double,
}

/// One itemized row: name, quantity and the already formatted line price.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRow {
    pub name: String,
    pub quantity: u32,
    /// Line price (unit price times quantity), formatted without marker.
    pub price: String,
    /// Currency marker printed directly before the price field.
    pub currency: String,
}

impl ItemRow {
    /// Lay the row out in fixed-width columns.
    ///
    /// The name is split into [`NAME_WIDTH`]-character segments. The first
    /// shares the line with quantity and price; each further segment becomes
    /// a continuation line at the same left margin.
    pub fn lines(&self) -> Vec<String> {
        let mut segments = split_chars(&self.name, NAME_WIDTH).into_iter();
        let first = segments.next().unwrap_or_default();

        let mut lines = vec![format!(
            "{first:<name_w$} {qty:>qty_w$} {cur}{price:>price_w$}",
            qty = self.quantity,
            cur = self.currency,
            price = self.price,
            name_w = NAME_WIDTH,
            qty_w = QTY_WIDTH,
            price_w = PRICE_WIDTH,
        )];
        lines.extend(segments);
        lines
    }

    /// True when quantity or price do not fit their fields.
    pub fn overflows(&self) -> bool {
        self.quantity.to_string().chars().count() > QTY_WIDTH
            || self.price.chars().count() > PRICE_WIDTH
    }
}

/// A single instruction in a receipt description.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptLine {
    /// Reset the printer to its defaults.
    Init,
    /// Alignment for following lines.
    Align(Alignment),
    /// Emphasis on/off.
    Bold(bool),
    /// Character size for following lines.
    Size(TextSize),
    /// A plain text line.
    Text(String),
    /// An itemized row (may span several printed lines).
    Item(ItemRow),
    /// Full-width divider.
    Rule,
    /// Blank lines.
    Feed(u8),
    /// Feed to the cutter and cut.
    Cut,
}

/// An immutable, ordered receipt description.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    lines: Vec<ReceiptLine>,
}

impl Receipt {
    pub fn new(lines: Vec<ReceiptLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[ReceiptLine] {
        &self.lines
    }

    /// Itemized rows in print order.
    pub fn items(&self) -> impl Iterator<Item = &ItemRow> {
        self.lines.iter().filter_map(|line| match line {
            ReceiptLine::Item(row) => Some(row),
            _ => None,
        })
    }

    /// Render the receipt as the text lines that end up on paper.
    ///
    /// Control intents are applied (alignment pads the line), everything
    /// that does not print characters is skipped.
    pub fn preview(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut alignment = Alignment::Left;

        for line in &self.lines {
            match line {
                ReceiptLine::Init => alignment = Alignment::Left,
                ReceiptLine::Align(a) => alignment = *a,
                ReceiptLine::Text(text) => out.push(align_text(text, alignment)),
                ReceiptLine::Item(row) => out.extend(row.lines()),
                ReceiptLine::Rule => out.push(rule()),
                ReceiptLine::Feed(n) => out.extend((0..*n).map(|_| String::new())),
                ReceiptLine::Bold(_) | ReceiptLine::Size(_) | ReceiptLine::Cut => {}
            }
        }

        out
    }
}

/// The divider line.
pub fn rule() -> String {
    "-".repeat(LINE_WIDTH)
}

/// A label on the left, a value right-aligned to the line edge.
///
/// When both do not fit they are separated by a single space.
pub fn label_row(label: &str, value: &str) -> String {
    let used = label.chars().count() + value.chars().count();
    if used < LINE_WIDTH {
        format!("{label}{value:>w$}", w = LINE_WIDTH - label.chars().count())
    } else {
        format!("{label} {value}")
    }
}

fn align_text(text: &str, alignment: Alignment) -> String {
    let len = text.chars().count();
    if len >= LINE_WIDTH {
        return text.to_string();
    }
    match alignment {
        Alignment::Left => text.to_string(),
        Alignment::Center => format!("{}{}", " ".repeat((LINE_WIDTH - len) / 2), text),
        Alignment::Right => format!("{text:>LINE_WIDTH$}"),
    }
}

/// Split a string into segments of at most `width` characters.
fn split_chars(s: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
