//! Statistical column role assignment.
//!
//! The description column is the one that looks most like prose: long
//! tokens made mostly of letters. Every other role is decided relative to
//! it, so the same rules handle `[Desc][Qty][Price][Total]` and
//! `[Qty][Desc][Price][Total]` layouts.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::invoice::rules::parse_amount;
use crate::layout::rows::RowCandidate;

/// Semantic role of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Description,
    Quantity,
    UnitPrice,
    Total,
    Unknown,
}

/// Text-likelihood of a column: average token length x letter fraction.
pub fn text_score<'a>(tokens: impl IntoIterator<Item = &'a str>) -> f64 {
    let mut token_count = 0usize;
    let mut char_count = 0usize;
    let mut letter_count = 0usize;

    for text in tokens {
        token_count += 1;
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            char_count += 1;
            if c.is_alphabetic() {
                letter_count += 1;
            }
        }
    }

    if token_count == 0 || char_count == 0 {
        return 0.0;
    }

    let avg_len = char_count as f64 / token_count as f64;
    let letter_fraction = letter_count as f64 / char_count as f64;
    avg_len * letter_fraction
}

/// Assign a role to every column index in `0..column_count`.
///
/// Returns all `Unknown` when no sampled column contains letters.
pub fn profile_columns(samples: &[&RowCandidate], column_count: usize) -> Vec<ColumnRole> {
    let mut roles = vec![ColumnRole::Unknown; column_count];

    let column_tokens = |col: usize| -> Vec<&str> {
        samples
            .iter()
            .filter_map(|row| row.columns.get(&col))
            .flatten()
            .map(|t| t.text.as_str())
            .collect()
    };

    let scores: Vec<f64> = (0..column_count)
        .map(|col| text_score(column_tokens(col)))
        .collect();

    // Strict comparison keeps the leftmost column on ties
    let mut description: Option<(usize, f64)> = None;
    for (col, score) in scores.iter().enumerate() {
        if *score > 0.0 && description.is_none_or(|(_, best)| *score > best) {
            description = Some((col, *score));
        }
    }

    let Some((desc_col, _)) = description else {
        debug!("Column profile: no text-like column in {} samples", samples.len());
        return roles;
    };
    roles[desc_col] = ColumnRole::Description;

    let populated = |col: usize| !column_tokens(col).is_empty();

    let mut has_left_quantity = false;
    for col in (0..desc_col).filter(|c| populated(*c)) {
        roles[col] = ColumnRole::Quantity;
        has_left_quantity = true;
    }

    let right: Vec<usize> = (desc_col + 1..column_count).filter(|c| populated(*c)).collect();
    match right.as_slice() {
        [] => {}
        [only] => roles[*only] = ColumnRole::Total,
        [first, last] => {
            if !has_left_quantity && is_integer_column(&column_tokens(*first)) {
                roles[*first] = ColumnRole::Quantity;
            } else {
                roles[*first] = ColumnRole::UnitPrice;
            }
            roles[*last] = ColumnRole::Total;
        }
        [first, .., price, last] => {
            if has_left_quantity {
                roles[*first] = ColumnRole::UnitPrice;
            } else {
                roles[*first] = ColumnRole::Quantity;
                roles[*price] = ColumnRole::UnitPrice;
            }
            roles[*last] = ColumnRole::Total;
        }
    }

    debug!("Column profile: scores {:?}, roles {:?}", scores, roles);
    roles
}

/// Every token is a whole number printed without separators.
fn is_integer_column(tokens: &[&str]) -> bool {
    !tokens.is_empty()
        && tokens.iter().all(|t| {
            !t.contains(['.', ',']) && parse_amount(t).is_some_and(|v| v.fract().is_zero())
        })
}
