//! Canonicalization of OCR word records into [`Token`]s.

use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::layout::rows::group_lines;
use crate::models::config::BoxFormat;
use crate::models::token::{BBox, RawBBox, RawWord, Token};

/// Convert one raw word into a token.
///
/// Returns `Ok(None)` for words whose text is empty after trimming.
pub fn normalize_word(
    word: &RawWord,
    default_page: u32,
    box_format: BoxFormat,
) -> Result<Option<Token>, ExtractionError> {
    let text = word.text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let degenerate = |reason: &str| ExtractionError::DegenerateGeometry {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let bbox = match &word.bbox {
        None => return Err(degenerate("missing bounding box")),
        Some(raw) => to_bbox(raw, box_format).ok_or_else(|| degenerate("unsupported box shape"))?,
    };

    if let Some(reason) = bbox.degeneracy() {
        return Err(degenerate(reason));
    }

    Ok(Some(Token::new(
        text,
        bbox,
        normalize_confidence(word.confidence),
        word.page.unwrap_or(default_page),
    )))
}

fn to_bbox(raw: &RawBBox, box_format: BoxFormat) -> Option<BBox> {
    match raw {
        RawBBox::Quad(points) if !points.is_empty() => Some(BBox::from_points(points)),
        RawBBox::Quad(_) => None,
        RawBBox::Flat(values) => match values.len() {
            8 => {
                let points: Vec<[f64; 2]> = values.chunks(2).map(|p| [p[0], p[1]]).collect();
                Some(BBox::from_points(&points))
            }
            4 => Some(match box_format {
                BoxFormat::Xyxy => BBox::from_corners(values[0], values[1], values[2], values[3]),
                BoxFormat::Xywh => BBox::new(values[0], values[1], values[2], values[3]),
            }),
            _ => None,
        },
        RawBBox::Rect { x, y, w, h } => Some(BBox::new(*x, *y, *w, *h)),
        RawBBox::Sized {
            x,
            y,
            width,
            height,
        } => Some(BBox::new(*x, *y, *width, *height)),
        RawBBox::Corners { x1, y1, x2, y2 } => Some(BBox::from_corners(*x1, *y1, *x2, *y2)),
    }
}

/// Missing confidence means the engine did not report one. Values above 1
/// are percentages.
fn normalize_confidence(confidence: Option<f64>) -> f64 {
    match confidence {
        None => 1.0,
        Some(c) if !c.is_finite() => 0.0,
        Some(c) if c > 1.0 => (c / 100.0).clamp(0.0, 1.0),
        Some(c) => c.max(0.0),
    }
}

/// Normalize all words of a page. Degenerate words are logged and dropped.
pub fn normalize_words(words: &[RawWord], page: u32, box_format: BoxFormat) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(words.len());
    let mut dropped = 0usize;

    for word in words {
        match normalize_word(word, page, box_format) {
            Ok(Some(token)) => tokens.push(token),
            Ok(None) => {}
            Err(e) => {
                dropped += 1;
                warn!("Excluding token on page {}: {}", page, e);
            }
        }
    }

    debug!(
        "Normalized {} tokens on page {} ({} degenerate)",
        tokens.len(),
        page,
        dropped
    );

    tokens
}

/// Drop already-built tokens whose geometry cannot be used.
pub fn usable_tokens(tokens: &[Token]) -> Vec<Token> {
    tokens
        .iter()
        .filter(|token| match token.bbox.degeneracy() {
            Some(reason) => {
                let err = ExtractionError::DegenerateGeometry {
                    text: token.text.clone(),
                    reason: reason.to_string(),
                };
                warn!("Excluding token on page {}: {}", token.page, err);
                false
            }
            None => !token.text.trim().is_empty(),
        })
        .cloned()
        .collect()
}

/// Page extent in token coordinates: host dimensions when given, else the
/// span of the token boxes.
pub fn page_extent(tokens: &[Token], width: Option<f64>, height: Option<f64>) -> (f64, f64) {
    let span_w = tokens.iter().map(|t| t.bbox.right()).fold(0.0, f64::max);
    let span_h = tokens.iter().map(|t| t.bbox.bottom()).fold(0.0, f64::max);

    let pick = |given: Option<f64>, span: f64| match given {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => span,
    };

    (pick(width, span_w), pick(height, span_h))
}

/// Rebuild linear page text: lines by y-proximity, words left to right.
pub fn reading_order_text(tokens: &[Token], y_tolerance: f64) -> String {
    group_lines(tokens, y_tolerance)
        .iter()
        .map(|line| {
            line.iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, bbox: RawBBox, confidence: Option<f64>) -> RawWord {
        RawWord {
            text: text.to_string(),
            bbox: Some(bbox),
            confidence,
            page: None,
        }
    }

    #[test]
    fn test_box_shapes() {
        let quad = word(
            "Beer",
            RawBBox::Quad(vec![[10.0, 20.0], [60.0, 20.0], [60.0, 40.0], [10.0, 40.0]]),
            Some(0.9),
        );
        let token = normalize_word(&quad, 1, BoxFormat::Xyxy).unwrap().unwrap();
        assert_eq!(token.bbox, BBox::new(10.0, 20.0, 50.0, 20.0));

        let flat = word("Beer", RawBBox::Flat(vec![10.0, 20.0, 60.0, 40.0]), None);
        let token = normalize_word(&flat, 1, BoxFormat::Xyxy).unwrap().unwrap();
        assert_eq!(token.bbox, BBox::new(10.0, 20.0, 50.0, 20.0));

        let token = normalize_word(&flat, 1, BoxFormat::Xywh).unwrap().unwrap();
        assert_eq!(token.bbox, BBox::new(10.0, 20.0, 60.0, 40.0));
    }

    #[test]
    fn test_confidence_scale() {
        assert_eq!(normalize_confidence(None), 1.0);
        assert_eq!(normalize_confidence(Some(96.0)), 0.96);
        assert_eq!(normalize_confidence(Some(0.5)), 0.5);
        assert_eq!(normalize_confidence(Some(-1.0)), 0.0);
    }

    #[test]
    fn test_degenerate_words_are_dropped() {
        let words = vec![
            word("zero", RawBBox::Flat(vec![0.0, 0.0, 0.0, 0.0]), None),
            word("flat", RawBBox::Rect { x: 5.0, y: 5.0, w: 0.0, h: 3.0 }, None),
            RawWord {
                text: "nobox".to_string(),
                bbox: None,
                confidence: None,
                page: None,
            },
            word("   ", RawBBox::Rect { x: 5.0, y: 5.0, w: 3.0, h: 3.0 }, None),
            word(" ok ", RawBBox::Rect { x: 5.0, y: 5.0, w: 3.0, h: 3.0 }, None),
        ];

        let tokens = normalize_words(&words, 2, BoxFormat::Xyxy);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "ok");
        assert_eq!(tokens[0].page, 2);
    }

    #[test]
    fn test_degenerate_reason() {
        let w = word("12", RawBBox::Flat(vec![0.0, 0.0, 0.0, 0.0]), None);
        assert_eq!(
            normalize_word(&w, 1, BoxFormat::Xyxy),
            Err(ExtractionError::DegenerateGeometry {
                text: "12".to_string(),
                reason: "all-zero box".to_string(),
            })
        );
    }

    #[test]
    fn test_usable_tokens() {
        let tokens = vec![
            Token::new("7.00", BBox::default(), 1.0, 1),
            Token::new("9.99", BBox::new(500.0, 100.0, 0.0, 20.0), 1.0, 1),
            Token::new(" ", BBox::new(500.0, 100.0, 10.0, 20.0), 1.0, 1),
            Token::new("Beer", BBox::new(10.0, 100.0, 50.0, 20.0), 1.0, 1),
        ];
        let usable = usable_tokens(&tokens);
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].text, "Beer");
    }

    #[test]
    fn test_page_extent() {
        let tokens = vec![Token::new("a", BBox::new(10.0, 10.0, 100.0, 20.0), 1.0, 1)];
        assert_eq!(page_extent(&tokens, None, None), (110.0, 30.0));
        assert_eq!(page_extent(&tokens, Some(2480.0), Some(3508.0)), (2480.0, 3508.0));
        assert_eq!(page_extent(&tokens, Some(0.0), None), (110.0, 30.0));
    }

    #[test]
    fn test_reading_order_text() {
        let tokens = vec![
            Token::new("Total", BBox::new(10.0, 200.0, 50.0, 20.0), 1.0, 1),
            Token::new("Beer", BBox::new(80.0, 102.0, 50.0, 20.0), 1.0, 1),
            Token::new("Crate", BBox::new(10.0, 100.0, 50.0, 20.0), 1.0, 1),
        ];
        assert_eq!(reading_order_text(&tokens, 20.0), "Crate Beer\nTotal");
    }
}
