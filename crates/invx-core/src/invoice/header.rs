//! Header fields and the grand total, read from the full page text.
//!
//! Everything here is independent of the line-item table: the grand total
//! is chosen by keyword proximity and vertical position, the supplier from
//! labels or capitalized text near the top of the page.

use std::cmp::Ordering;

use chrono::NaiveDate;
use tracing::debug;

use crate::layout::rows::group_lines;
use crate::models::config::HeaderConfig;
use crate::models::invoice::Money;
use crate::models::token::Token;

use super::rules::{
    extract_invoice_date, is_percentage, is_skip_line, is_table_header, AmountExtractor,
    FieldExtractor, CURRENCY_CODE, CURRENCY_SYMBOL, INVOICE_NUMBER, INVOICE_NUMBER_HASH,
    INVOICE_NUMBER_PREFIXED, NON_GRAND_TOTAL, PRIORITY_TOTAL, SUBTOTAL_LABEL, SUPPLIER_LABEL,
    VAT_LABEL, VAT_REGISTRATION,
};

/// Fields found outside the line-item table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderFields {
    pub supplier: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub currency: Option<String>,
    pub subtotal: Option<Money>,
    pub vat_total: Option<Money>,
    pub grand_total: Option<Money>,
}

/// A scored grand total candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalCandidate {
    pub value: Money,
    /// 0-based line index in the page text.
    pub line: usize,
    /// Byte offset within the line.
    pub offset: usize,
    pub score: f64,
}

/// Header and grand total extractor.
pub struct HeaderExtractor {
    config: HeaderConfig,
}

impl HeaderExtractor {
    pub fn new(config: HeaderConfig) -> Self {
        Self { config }
    }

    /// Extract every header field.
    ///
    /// Token geometry is used for the supplier search when available.
    pub fn extract(
        &self,
        text: &str,
        tokens: &[Token],
        page_height: f64,
        y_tolerance: f64,
    ) -> HeaderFields {
        let fields = HeaderFields {
            supplier: self.supplier(text, tokens, page_height, y_tolerance),
            invoice_date: extract_invoice_date(text).map(|m| m.value),
            invoice_number: extract_invoice_number(text),
            currency: detect_currency(text),
            subtotal: labeled_amount(text, |line| SUBTOTAL_LABEL.find(line).map(|m| m.end())),
            vat_total: labeled_amount(text, vat_label_end),
            grand_total: self.grand_total(text),
        };

        debug!(
            "Header: supplier {:?}, date {:?}, number {:?}, total {:?}",
            fields.supplier, fields.invoice_date, fields.invoice_number, fields.grand_total
        );

        fields
    }

    /// Score every amount on the page, best first.
    ///
    /// Ties prefer the candidate lower on the page.
    pub fn total_candidates(&self, text: &str) -> Vec<TotalCandidate> {
        let lines: Vec<&str> = text.lines().collect();
        let line_count = lines.len().max(1) as f64;
        let extractor = AmountExtractor::new();

        let mut candidates = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let amounts: Vec<_> = extractor
                .extract_all(line)
                .into_iter()
                .filter(|m| m.position.is_some_and(|(_, end)| !is_percentage(line, end)))
                .collect();

            let keyword_here = has_priority_keyword(line);
            // A label alone on the line above
            let keyword_above = idx > 0
                && has_priority_keyword(lines[idx - 1])
                && !is_table_header(lines[idx - 1])
                && extractor.extract_all(lines[idx - 1]).is_empty();

            for amount in amounts {
                let mut score = 1.0;
                if keyword_here || keyword_above {
                    score *= self.config.keyword_boost;
                }
                if idx as f64 / line_count >= self.config.bottom_region {
                    score *= self.config.bottom_boost;
                }

                candidates.push(TotalCandidate {
                    value: amount.value,
                    line: idx,
                    offset: amount.position.map(|(start, _)| start).unwrap_or(0),
                    score,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.line.cmp(&a.line))
                .then_with(|| b.offset.cmp(&a.offset))
        });
        candidates
    }

    /// The grand total: best candidate that passes the sanity check.
    pub fn grand_total(&self, text: &str) -> Option<Money> {
        let candidates = self.total_candidates(text);

        let plausible = candidates.iter().find(|c| {
            let implausible = c.value.abs() < self.config.min_plausible_total
                && candidates
                    .iter()
                    .any(|o| {
                        c.value
                            .abs()
                            .checked_mul(self.config.outlier_ratio)
                            .is_some_and(|limit| o.value.abs() >= limit)
                            && o != *c
                    });
            if implausible {
                debug!("Grand total: rejecting {} on line {}", c.value, c.line);
            }
            !implausible
        });

        plausible.or(candidates.first()).map(|c| c.value)
    }

    /// Supplier name: labeled, else the first strongly capitalized line in
    /// the top region of the page.
    pub fn supplier(
        &self,
        text: &str,
        tokens: &[Token],
        page_height: f64,
        y_tolerance: f64,
    ) -> Option<String> {
        if let Some(name) = SUPPLIER_LABEL
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .find(|name| name.chars().any(char::is_alphabetic))
        {
            return Some(name);
        }

        let top_lines: Vec<String> = if !tokens.is_empty() && page_height > 0.0 {
            let limit = page_height * self.config.top_region;
            group_lines(tokens, y_tolerance)
                .into_iter()
                .filter(|line| line.first().is_some_and(|t| t.center_y() <= limit))
                .map(|line| {
                    line.iter()
                        .map(|t| t.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect()
        } else {
            let lines: Vec<&str> = text.lines().collect();
            let count = lines.len().max(1) as f64;
            lines
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx as f64 / count <= self.config.top_region)
                .map(|(_, line)| line.to_string())
                .collect()
        };

        top_lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .find(|line| is_supplier_like(line))
    }
}

fn has_priority_keyword(line: &str) -> bool {
    PRIORITY_TOTAL.is_match(&NON_GRAND_TOTAL.replace_all(line, ""))
}

fn is_supplier_like(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    let digits = line.chars().filter(|c| c.is_ascii_digit()).count();

    if letters.len() < 3 || digits > letters.len() {
        return false;
    }
    if is_skip_line(line) || is_table_header(line) {
        return false;
    }

    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    upper as f64 / letters.len() as f64 >= 0.6
}

/// End of a VAT label on the line, unless the line is a VAT registration
/// number, a subtotal or a VAT-inclusive grand total.
fn vat_label_end(line: &str) -> Option<usize> {
    if VAT_REGISTRATION.is_match(line) || SUBTOTAL_LABEL.is_match(line) || has_priority_keyword(line) {
        return None;
    }
    VAT_LABEL.find(line).map(|m| m.end())
}

/// Last non-percentage amount after the label on the first labeled line.
/// A label alone on its line takes the first amount of the next line.
fn labeled_amount(text: &str, label_end: impl Fn(&str) -> Option<usize>) -> Option<Money> {
    let extractor = AmountExtractor::new();
    let lines: Vec<&str> = text.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let Some(end) = label_end(line) else {
            continue;
        };

        let rest = &line[end..];
        let amounts: Vec<Money> = extractor
            .extract_all(rest)
            .into_iter()
            .filter(|m| m.position.is_some_and(|(_, e)| !is_percentage(rest, e)))
            .map(|m| m.value)
            .collect();

        if let Some(value) = amounts.last() {
            return Some(*value);
        }

        if let Some(next) = lines.get(idx + 1) {
            if let Some(m) = extractor.extract(next) {
                return Some(m.value);
            }
        }
    }

    None
}

/// Invoice number: the earliest labeled, prefixed or hash-style match.
pub fn extract_invoice_number(text: &str) -> Option<String> {
    [&*INVOICE_NUMBER, &*INVOICE_NUMBER_PREFIXED, &*INVOICE_NUMBER_HASH]
        .iter()
        .enumerate()
        .flat_map(|(priority, re)| {
            re.captures_iter(text).filter_map(move |caps| {
                let value = caps.get(1)?;
                value
                    .as_str()
                    .chars()
                    .any(|c| c.is_ascii_digit())
                    .then(|| (value.start(), priority, value.as_str().to_string()))
            })
        })
        .min_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, _, number)| number)
}

/// ISO currency code by symbol and code frequency.
pub fn detect_currency(text: &str) -> Option<String> {
    let mut counts = [("GBP", 0usize), ("EUR", 0), ("USD", 0)];

    for m in CURRENCY_SYMBOL.find_iter(text) {
        let idx = match m.as_str() {
            "£" => 0,
            "€" => 1,
            _ => 2,
        };
        counts[idx].1 += 1;
    }
    for caps in CURRENCY_CODE.captures_iter(text) {
        if let Some(slot) = counts.iter_mut().find(|(code, _)| *code == &caps[1]) {
            slot.1 += 1;
        }
    }

    // Earlier entries win ties
    counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .fold(None, |best: Option<(&str, usize)>, (code, n)| match best {
            Some((_, b)) if b >= *n => best,
            _ => Some((*code, *n)),
        })
        .map(|(code, _)| code.to_string())
}
