//! Common utilities for document generation.
//!
//! Shared helpers for amount formatting, Typst string escaping and output naming.

use chrono::{DateTime, Local};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places printed for amounts. New Taiwan dollars are whole numbers.
pub const AMOUNT_DECIMALS: u32 = 0;

/// Currency prefix printed before totals.
pub const CURRENCY_PREFIX: &str = "NT$";

/// Round to [`AMOUNT_DECIMALS`] (half away from zero) and group thousands,
/// e.g. `1234.5` becomes `"1,235"`.
pub fn format_currency(amount: Decimal) -> String {
    let rounded =
        amount.round_dp_with_strategy(AMOUNT_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", AMOUNT_DECIMALS as usize, rounded.abs());

    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Amount with the currency prefix, e.g. `"NT$ 1,500"`.
pub fn format_amount(amount: Decimal) -> String {
    format!("{} {}", CURRENCY_PREFIX, format_currency(amount))
}

/// Escape special characters for Typst strings.
pub fn escape_typst_string(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', r#"\""#)
        .replace('\r', "")
        .replace('\n', r"\n")
        .replace('\t', r"\t")
}

/// Quote a value as a Typst string literal.
pub fn typst_str(value: &str) -> String {
    format!("\"{}\"", escape_typst_string(value))
}

/// Download name for a rendered request, e.g. `20250315_142501.pdf`.
pub fn download_filename(at: DateTime<Local>) -> String {
    format!("{}.pdf", at.format("%Y%m%d_%H%M%S"))
}
