//! Token geometry: normalization, column detection and row reconstruction.

pub mod columns;
pub mod normalize;
pub mod profile;
pub mod rows;
pub mod spatial;

pub use columns::{cluster_columns, split_leading_numbers, ColumnBoundaries};
pub use normalize::{normalize_word, normalize_words, page_extent, reading_order_text, usable_tokens};
pub use profile::{profile_columns, text_score, ColumnRole};
pub use rows::{group_lines, reconstruct_rows, RowCandidate};
pub use spatial::{SpatialExtractor, StrategyOutcome};
