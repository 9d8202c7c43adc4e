//! Row bucketing by y-proximity and column assignment.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::layout::columns::ColumnBoundaries;
use crate::models::token::Token;

/// One physical row of the table, with its tokens bucketed by column.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCandidate {
    /// Mean y-centroid of the row's tokens.
    pub y_center: f64,
    /// Tokens per column index, each bucket in x-order.
    pub columns: BTreeMap<usize, Vec<Token>>,
}

impl RowCandidate {
    /// Bucket a line of tokens into columns.
    pub fn from_line(line: &[Token], boundaries: &ColumnBoundaries) -> Self {
        let mut columns: BTreeMap<usize, Vec<Token>> = BTreeMap::new();
        for token in line {
            columns
                .entry(boundaries.column_of(token.center_x()))
                .or_default()
                .push(token.clone());
        }
        for bucket in columns.values_mut() {
            bucket.sort_by(reading_order);
        }

        let y_center = if line.is_empty() {
            0.0
        } else {
            line.iter().map(Token::center_y).sum::<f64>() / line.len() as f64
        };

        Self { y_center, columns }
    }

    /// Concatenated text of one column, if it has tokens.
    pub fn column_text(&self, column: usize) -> Option<String> {
        self.columns
            .get(&column)
            .filter(|tokens| !tokens.is_empty())
            .map(|tokens| join_text(tokens))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.columns.values().flatten()
    }

    /// Whole row text in column order.
    pub fn text(&self) -> String {
        self.columns
            .values()
            .map(|tokens| join_text(tokens))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn mean_confidence(&self) -> f64 {
        let (sum, count) = self
            .tokens()
            .fold((0.0, 0usize), |(s, n), t| (s + t.confidence, n + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

fn join_text(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Left-to-right then top-to-bottom, with text as the final tie-break.
fn reading_order(a: &Token, b: &Token) -> Ordering {
    a.center_x()
        .total_cmp(&b.center_x())
        .then_with(|| a.center_y().total_cmp(&b.center_y()))
        .then_with(|| a.text.cmp(&b.text))
}

/// Group tokens into lines.
///
/// Tokens are sorted by y-centroid and merged into the current line while
/// they lie within `y_tolerance` of the line's first token. Each line is
/// returned in x-order.
pub fn group_lines(tokens: &[Token], y_tolerance: f64) -> Vec<Vec<Token>> {
    let mut sorted: Vec<&Token> = tokens.iter().collect();
    sorted.sort_by(|a, b| {
        a.center_y()
            .total_cmp(&b.center_y())
            .then_with(|| reading_order(a, b))
    });

    let mut lines: Vec<Vec<Token>> = Vec::new();
    let mut anchor = f64::NEG_INFINITY;

    for token in sorted {
        match lines.last_mut() {
            Some(line) if (token.center_y() - anchor).abs() <= y_tolerance => {
                line.push(token.clone());
            }
            _ => {
                anchor = token.center_y();
                lines.push(vec![token.clone()]);
            }
        }
    }

    for line in &mut lines {
        line.sort_by(reading_order);
    }

    lines
}

/// Bucket every line into columns.
pub fn reconstruct_rows(lines: &[Vec<Token>], boundaries: &ColumnBoundaries) -> Vec<RowCandidate> {
    lines
        .iter()
        .map(|line| RowCandidate::from_line(line, boundaries))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::BBox;

    fn token(text: &str, x: f64, y: f64) -> Token {
        Token::new(text, BBox::new(x, y, 40.0, 20.0), 0.9, 1)
    }

    #[test]
    fn test_group_lines_within_tolerance() {
        let tokens = vec![
            token("42.66", 1180.0, 104.0),
            token("Crate", 10.0, 100.0),
            token("12", 780.0, 98.0),
            token("Total", 10.0, 300.0),
        ];

        let lines = group_lines(&tokens, 20.0);
        assert_eq!(lines.len(), 2);
        let first: Vec<&str> = lines[0].iter().map(|t| t.text.as_str()).collect();
        assert_eq!(first, vec!["Crate", "12", "42.66"]);
        assert_eq!(lines[1][0].text, "Total");
    }

    #[test]
    fn test_anchor_does_not_drift() {
        // Each token is within tolerance of the previous one but the third
        // is too far from the first.
        let tokens = vec![
            token("a", 10.0, 100.0),
            token("b", 60.0, 115.0),
            token("c", 110.0, 130.0),
        ];
        let lines = group_lines(&tokens, 20.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1][0].text, "c");
    }

    #[test]
    fn test_row_candidate_columns() {
        let boundaries = ColumnBoundaries::new(vec![0.0, 750.0, 900.0, 1100.0]).unwrap();
        let line = vec![
            token("Crate", 10.0, 100.0),
            token("of", 60.0, 100.0),
            token("Beer", 90.0, 100.0),
            token("12", 780.0, 100.0),
            token("3.56", 980.0, 100.0),
            token("42.66", 1180.0, 100.0),
        ];

        let row = RowCandidate::from_line(&line, &boundaries);
        assert_eq!(row.column_text(0).as_deref(), Some("Crate of Beer"));
        assert_eq!(row.column_text(1).as_deref(), Some("12"));
        assert_eq!(row.column_text(2).as_deref(), Some("3.56"));
        assert_eq!(row.column_text(3).as_deref(), Some("42.66"));
        assert_eq!(row.column_text(4), None);
        assert_eq!(row.y_center, 110.0);
        assert!((row.mean_confidence() - 0.9).abs() < 1e-9);
    }
}
