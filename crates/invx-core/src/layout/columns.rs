//! Column boundary detection by horizontal gap analysis.

use tracing::debug;

use crate::invoice::rules::is_numeric_text;
use crate::models::config::LayoutConfig;
use crate::models::token::Token;

/// Ordered x-coordinates partitioning the page into columns.
///
/// Column `i` spans `[bounds[i], bounds[i + 1])`; the last column extends
/// to the page edge. Always strictly increasing with a first value >= 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBoundaries(Vec<f64>);

impl ColumnBoundaries {
    /// Returns `None` unless the bounds are finite, non-empty, start at or
    /// after 0 and are strictly increasing.
    pub fn new(bounds: Vec<f64>) -> Option<Self> {
        let valid = !bounds.is_empty()
            && bounds.iter().all(|b| b.is_finite())
            && bounds[0] >= 0.0
            && bounds.windows(2).all(|w| w[0] < w[1]);
        valid.then_some(Self(bounds))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn column_count(&self) -> usize {
        self.0.len()
    }

    /// Index of the column containing `x`. Positions left of the first
    /// boundary belong to column 0.
    pub fn column_of(&self, x: f64) -> usize {
        self.0.iter().rposition(|b| *b <= x).unwrap_or(0)
    }
}

/// Detect column boundaries from the x-centroids of numeric tokens.
///
/// Returns `None` when fewer than two distinct positions exist.
pub fn cluster_columns(
    numeric_x: &[f64],
    image_width: f64,
    layout: &LayoutConfig,
) -> Option<ColumnBoundaries> {
    let mut xs: Vec<f64> = numeric_x.iter().copied().filter(|x| x.is_finite()).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();

    if xs.len() < 2 {
        debug!("Column clustering: {} distinct numeric x-positions", xs.len());
        return None;
    }

    let threshold = layout.gap_threshold(image_width);

    // Midpoints of gaps wider than the threshold, with the gap width
    let gaps: Vec<(f64, f64)> = xs
        .windows(2)
        .filter(|w| w[1] - w[0] > threshold)
        .map(|w| ((w[0] + w[1]) / 2.0, w[1] - w[0]))
        .collect();

    let first_x = xs[0];
    let description_end = first_x - layout.left_padding;

    let bounds = if description_end > 0.0 {
        let mut bounds = vec![0.0, description_end];
        bounds.extend(gaps.iter().map(|(mid, _)| *mid));
        bounds
    } else {
        // Numbers start at the left edge: description and a single value column
        let widest = gaps
            .iter()
            .copied()
            .fold(None, |best: Option<(f64, f64)>, gap| match best {
                Some(b) if b.1 >= gap.1 => Some(b),
                _ => Some(gap),
            })?;
        vec![0.0, widest.0]
    };

    let boundaries = ColumnBoundaries::new(bounds)?;
    debug!(
        "Column clustering: threshold {:.0}px, {} columns at {:?}",
        threshold,
        boundaries.column_count(),
        boundaries.as_slice()
    );

    Some(boundaries)
}

/// Split columns in which every text row starts with a number.
///
/// Gap clustering only sees numeric tokens, so a leading quantity column
/// (`[Qty][Desc][Price][Total]`) shares a column with the description.
/// The split falls halfway between the leading numbers and the text.
pub fn split_leading_numbers(boundaries: &ColumnBoundaries, lines: &[Vec<Token>]) -> ColumnBoundaries {
    let bounds = boundaries.as_slice();
    let mut splits = Vec::new();

    for col in 0..bounds.len() {
        let mut numbers_end = f64::NEG_INFINITY;
        let mut text_start = f64::INFINITY;
        let mut rows = 0usize;
        let mut consistent = true;

        for line in lines {
            let mut cell: Vec<&Token> = line
                .iter()
                .filter(|t| boundaries.column_of(t.center_x()) == col)
                .collect();
            if !cell.iter().any(|t| t.text.chars().any(char::is_alphabetic)) {
                continue;
            }
            cell.sort_by(|a, b| a.bbox.x.total_cmp(&b.bbox.x));

            match cell.split_first() {
                Some((first, rest)) if is_numeric_text(&first.text) && !rest.is_empty() => {
                    numbers_end = numbers_end.max(first.bbox.right());
                    text_start = text_start.min(rest[0].bbox.x);
                    rows += 1;
                }
                _ => {
                    consistent = false;
                    break;
                }
            }
        }

        if !consistent || rows == 0 || numbers_end >= text_start {
            continue;
        }

        let split = (numbers_end + text_start) / 2.0;
        let upper = bounds.get(col + 1).copied().unwrap_or(f64::INFINITY);
        if split > bounds[col] && split < upper {
            debug!("Column clustering: leading numbers in column {}, split at {:.1}", col, split);
            splits.push(split);
        }
    }

    if splits.is_empty() {
        return boundaries.clone();
    }

    let mut all = bounds.to_vec();
    all.extend(splits);
    all.sort_by(f64::total_cmp);
    ColumnBoundaries::new(all).unwrap_or_else(|| boundaries.clone())
}
