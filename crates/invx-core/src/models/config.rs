//! Configuration structures for the extraction pipeline.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::InvxError;

/// Main configuration for the invx pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvxConfig {
    /// Geometry thresholds for the spatial strategy.
    pub layout: LayoutConfig,

    /// Hybrid selector thresholds.
    pub selection: SelectionConfig,

    /// Header and grand total scoring.
    pub header: HeaderConfig,

    /// Arithmetic validation tolerances.
    pub validation: ValidationConfig,

    /// Per-supplier layout overrides, keyed by a case-insensitive
    /// fragment of the supplier name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub vendors: BTreeMap<String, LayoutOverride>,
}

/// How a bare 4-number bounding box should be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxFormat {
    /// `[x1, y1, x2, y2]` corners.
    #[default]
    Xyxy,
    /// `[x, y, width, height]`.
    Xywh,
}

/// Geometry thresholds. The ratios were tuned for 150-600 DPI scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Column gap as a fraction of page width.
    pub gap_ratio: f64,

    /// Lower bound for the column gap, in pixels.
    pub min_gap: f64,

    /// Space reserved left of the first numeric column, in pixels.
    pub left_padding: f64,

    /// Row tolerance as a fraction of page height.
    pub y_tolerance_ratio: f64,

    /// Lower bound for the row tolerance, in pixels.
    pub min_y_tolerance: f64,

    /// Number of rows sampled by the column profiler.
    pub profile_sample_rows: usize,

    /// Interpretation of 4-number bounding boxes.
    pub box_format: BoxFormat,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            gap_ratio: 0.02,
            min_gap: 30.0,
            left_padding: 50.0,
            y_tolerance_ratio: 0.01,
            min_y_tolerance: 20.0,
            profile_sample_rows: 5,
            box_format: BoxFormat::Xyxy,
        }
    }
}

impl LayoutConfig {
    /// Gap threshold for a page of the given width.
    pub fn gap_threshold(&self, image_width: f64) -> f64 {
        self.min_gap.max((image_width * self.gap_ratio).round())
    }

    /// Row tolerance for a page of the given height.
    pub fn y_tolerance(&self, image_height: f64) -> f64 {
        self.min_y_tolerance
            .max((image_height * self.y_tolerance_ratio).round())
    }

    /// Apply a vendor override on top of these settings.
    pub fn with_override(&self, over: &LayoutOverride) -> Self {
        Self {
            gap_ratio: over.gap_ratio.unwrap_or(self.gap_ratio),
            min_gap: over.min_gap.unwrap_or(self.min_gap),
            left_padding: over.left_padding.unwrap_or(self.left_padding),
            y_tolerance_ratio: over.y_tolerance_ratio.unwrap_or(self.y_tolerance_ratio),
            min_y_tolerance: over.min_y_tolerance.unwrap_or(self.min_y_tolerance),
            profile_sample_rows: self.profile_sample_rows,
            box_format: self.box_format,
        }
    }
}

/// Partial layout settings for a single supplier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_gap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_padding: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_tolerance_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_y_tolerance: Option<f64>,
}

/// Hybrid selector thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum spatial item count for spatial to win outright.
    pub spatial_min_items: usize,

    /// Spatial confidence must be strictly above this to win outright.
    pub spatial_min_confidence: f64,

    /// Fill missing numeric fields of the winner from the loser when both
    /// methods produced the same number of items.
    pub merge_equal_counts: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            spatial_min_items: 2,
            spatial_min_confidence: 0.5,
            merge_equal_counts: true,
        }
    }
}

/// Header and grand total scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Multiplier for amounts next to a priority keyword.
    pub keyword_boost: f64,

    /// Multiplier for amounts in the bottom region of the page.
    pub bottom_boost: f64,

    /// Start of the bottom region, as a fraction of page height.
    pub bottom_region: f64,

    /// End of the supplier search region, as a fraction of page height.
    pub top_region: f64,

    /// A winning total below this is rejected when a much larger
    /// candidate exists.
    pub min_plausible_total: Decimal,

    /// How much larger the competing candidate must be.
    pub outlier_ratio: Decimal,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            keyword_boost: 10.0,
            bottom_boost: 2.0,
            bottom_region: 0.7,
            top_region: 0.25,
            min_plausible_total: Decimal::new(50, 0),
            outlier_ratio: Decimal::new(10, 0),
        }
    }
}

/// Arithmetic validation tolerances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Relative tolerance for quantity x unit price against line total.
    pub line_tolerance: Decimal,

    /// Relative tolerance for the line total sum against the grand total.
    pub total_tolerance: Decimal,

    /// Relative tolerance for subtotal + VAT against the grand total.
    pub vat_tolerance: Decimal,

    /// Confidence ceiling applied when a result needs review.
    pub review_confidence_cap: f64,

    /// Description fragments of rows excluded from the line total sum.
    pub meta_rows: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            line_tolerance: Decimal::new(2, 2),
            total_tolerance: Decimal::new(10, 2),
            vat_tolerance: Decimal::new(1, 2),
            review_confidence_cap: 0.5,
            meta_rows: ["change", "rounding", "cash", "card", "tip"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl InvxConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> crate::Result<()> {
        self.validate()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject thresholds the pipeline cannot work with.
    pub fn validate(&self) -> crate::Result<()> {
        let layout = &self.layout;
        let non_negative = [
            ("layout.gap_ratio", layout.gap_ratio),
            ("layout.min_gap", layout.min_gap),
            ("layout.left_padding", layout.left_padding),
            ("layout.y_tolerance_ratio", layout.y_tolerance_ratio),
            ("layout.min_y_tolerance", layout.min_y_tolerance),
        ];
        for (key, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(InvxError::Config(format!("{} must be a non-negative number, got {}", key, value)));
            }
        }

        let unit = [
            ("selection.spatial_min_confidence", self.selection.spatial_min_confidence),
            ("header.bottom_region", self.header.bottom_region),
            ("header.top_region", self.header.top_region),
            ("validation.review_confidence_cap", self.validation.review_confidence_cap),
        ];
        for (key, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(InvxError::Config(format!("{} must be between 0 and 1, got {}", key, value)));
            }
        }

        if layout.profile_sample_rows == 0 {
            return Err(InvxError::Config("layout.profile_sample_rows must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Layout settings for a supplier, with any matching vendor override applied.
    ///
    /// The first key (in sorted order) contained in the supplier name wins.
    pub fn layout_for(&self, supplier: Option<&str>) -> LayoutConfig {
        let Some(name) = supplier.map(str::to_lowercase) else {
            return self.layout.clone();
        };

        self.vendors
            .iter()
            .find(|(key, _)| !key.is_empty() && name.contains(&key.to_lowercase()))
            .map(|(_, over)| self.layout.with_override(over))
            .unwrap_or_else(|| self.layout.clone())
    }
}
