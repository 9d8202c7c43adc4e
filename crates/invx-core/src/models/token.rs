//! Positioned OCR tokens and the page-level input handed over by the host.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box `(x, y, w, h)` in page pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Build from two corners, in any order.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            w: (x2 - x1).abs(),
            h: (y2 - y1).abs(),
        }
    }

    /// Bounding rectangle of a polygon.
    pub fn from_points(points: &[[f64; 2]]) -> Self {
        let min_x = points.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
        let max_x = points.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max);
        let min_y = points.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max);
        Self::from_corners(min_x, min_y, max_x, max_y)
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.w / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.h / 2.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Why this box cannot be used as geometry, if it cannot.
    pub fn degeneracy(&self) -> Option<&'static str> {
        if ![self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite()) {
            Some("non-finite coordinates")
        } else if self.x == 0.0 && self.y == 0.0 && self.w == 0.0 && self.h == 0.0 {
            Some("all-zero box")
        } else if self.w <= 0.0 || self.h <= 0.0 {
            Some("zero area")
        } else {
            None
        }
    }
}

/// A single OCR-recognized word. Immutable once normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Recognized text, trimmed.
    pub text: String,

    /// Axis-aligned bounding box.
    pub bbox: BBox,

    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f64,

    /// 1-based page number.
    pub page: u32,
}

impl Token {
    pub fn new(text: impl Into<String>, bbox: BBox, confidence: f64, page: u32) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
            page,
        }
    }

    pub fn center_x(&self) -> f64 {
        self.bbox.center_x()
    }

    pub fn center_y(&self) -> f64 {
        self.bbox.center_y()
    }
}

/// Bounding box shapes produced by common OCR engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBBox {
    /// Four `[x, y]` corner points.
    Quad(Vec<[f64; 2]>),
    /// Flat list of numbers: 8 for a quadrilateral, 4 for a rectangle.
    Flat(Vec<f64>),
    /// `{x, y, w, h}` object.
    Rect { x: f64, y: f64, w: f64, h: f64 },
    /// `{x, y, width, height}` object.
    Sized { x: f64, y: f64, width: f64, height: f64 },
    /// `{x1, y1, x2, y2}` object.
    Corners { x1: f64, y1: f64, x2: f64, y2: f64 },
}

/// A word record as delivered by the OCR collaborator, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWord {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<RawBBox>,

    /// Confidence, either 0-1 or a percentage.
    #[serde(default, alias = "score", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, alias = "page_num", skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Everything the core needs about one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInput {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,

    /// Page width in the token coordinate space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    /// Page height in the token coordinate space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    /// Full linear text of the page. Rebuilt from the words when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// OCR words.
    #[serde(default)]
    pub words: Vec<RawWord>,
}

fn default_page() -> u32 {
    1
}

/// A multi-page document or a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentInput {
    Pages { pages: Vec<PageInput> },
    Single(PageInput),
}

impl DocumentInput {
    /// Parse a host JSON payload.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_pages(self) -> Vec<PageInput> {
        match self {
            DocumentInput::Pages { pages } => pages,
            DocumentInput::Single(page) => vec![page],
        }
    }
}
