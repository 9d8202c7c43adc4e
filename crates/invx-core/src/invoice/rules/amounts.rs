//! Amount extraction and clean-price parsing.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{AMOUNT_PATTERN, CURRENCY_CODE};
use super::{ExtractionMatch, FieldExtractor};

/// Monetary amount extractor over free text.
///
/// Only amounts with two decimals or a leading currency symbol are
/// reported, and only when they are not glued to a date, code or unit.
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for caps in AMOUNT_PATTERN.captures_iter(text) {
            let Some(number) = caps.get(2) else {
                continue;
            };
            let symbol = caps.get(1);

            if symbol.is_none() && !has_decimal_part(number.as_str()) {
                continue;
            }

            let start = symbol.map(|s| s.start()).unwrap_or(number.start());
            if !is_isolated(text, start, number.end()) {
                continue;
            }

            if let Some(amount) = parse_amount(number.as_str()) {
                let confidence = if symbol.is_some() { 0.9 } else { 0.8 };
                results.push(
                    ExtractionMatch::new(amount, confidence, &text[start..number.end()])
                        .with_position(start, number.end()),
                );
            }
        }

        results
    }
}

fn has_decimal_part(number: &str) -> bool {
    let bytes = number.as_bytes();
    bytes.len() > 3
        && matches!(bytes[bytes.len() - 3], b'.' | b',')
        && bytes[bytes.len() - 2..].iter().all(u8::is_ascii_digit)
}

/// The amount at `start..end` is not part of a larger token.
fn is_isolated(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    if matches!(before, Some(c) if c.is_alphanumeric() || matches!(c, '.' | ',' | '/' | '-')) {
        return false;
    }

    let mut after = text[end..].chars();
    match after.next() {
        Some(c) if c.is_alphanumeric() => {
            // "12.00GBP" is still an amount
            let rest = &text[end..];
            ["GBP", "EUR", "USD"].iter().any(|code| rest.starts_with(code))
        }
        Some('.' | ',' | '/' | '-') => !after.next().is_some_and(|c| c.is_ascii_digit()),
        _ => true,
    }
}

/// True when the amount ending at `end` is immediately followed by `%`.
pub fn is_percentage(text: &str, end: usize) -> bool {
    text[end..].trim_start().starts_with('%')
}

/// Parse a printed amount ("£1,234.56", "1.234,56", "(12.00)", "42.66 GBP").
///
/// Currency symbols and codes are stripped. Anything else that is not part
/// of a number makes the parse fail, so "12kg" is not an amount.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let mut text = s.trim();
    let mut negative = false;

    if text.starts_with('(') && text.ends_with(')') && text.len() > 2 {
        negative = true;
        text = &text[1..text.len() - 1];
    }

    let stripped = CURRENCY_CODE.replace_all(text, "");
    let mut cleaned: String = stripped
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ' ' | '\u{00a0}' | '\u{202f}'))
        .collect();

    if let Some(rest) = cleaned.strip_prefix('-') {
        negative = !negative;
        cleaned = rest.to_string();
    } else if let Some(rest) = cleaned.strip_suffix('-') {
        // Credit notation: "12.00-"
        negative = !negative;
        cleaned = rest.to_string();
    }

    if cleaned.is_empty()
        || !cleaned.chars().any(|c| c.is_ascii_digit())
        || !cleaned.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return None;
    }

    let normalized = normalize_separators(&cleaned)?;
    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

fn normalize_separators(cleaned: &str) -> Option<String> {
    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();

    let normalized = match (commas, dots) {
        (0, 0) => cleaned.to_string(),
        (0, 1) => cleaned.to_string(),
        (0, _) => cleaned.replace('.', ""),
        (1, 0) => {
            // "12,50" is a decimal comma, "1,234" a thousands separator
            let decimals = cleaned.len() - cleaned.rfind(',')? - 1;
            if decimals == 3 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (_, 0) => cleaned.replace(',', ""),
        _ => {
            let comma_pos = cleaned.rfind(',')?;
            let dot_pos = cleaned.rfind('.')?;
            if comma_pos > dot_pos {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
    };

    if normalized.matches('.').count() > 1 {
        return None;
    }
    Some(normalized)
}

/// True when the token text is a number once currency symbols are removed.
pub fn is_numeric_text(s: &str) -> bool {
    parse_amount(s.trim_end_matches('%')).is_some()
}

/// Format an amount with thousands separators ("£1,234.56").
pub fn format_amount(amount: Decimal, currency: Option<&str>) -> String {
    let s = format!("{:.2}", amount.abs());
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(*c);
    }

    let symbol = match currency {
        Some("GBP") => "£",
        Some("EUR") => "€",
        Some("USD") => "$",
        _ => "",
    };
    let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };

    format!("{}{}{}.{}", sign, symbol, formatted, decimal_part)
}
