// Voice Timeline - Ordered, contiguous chord/rest sequences
// Structural, time-warping, contour and pitch operations on one performable line

pub mod build;
pub mod contour;
pub mod item;
pub mod palette;
pub mod pitch;
pub mod timeline;
pub mod warp;

pub use build::VoiceBuildOptions;
pub use contour::{contour, CONTOUR_COUNT, MAX_PARTITIONS};
pub use item::{ChordContent, DurationItem, ItemKind};
pub use palette::{DurationDef, Palette, PaletteError};
pub use timeline::VoiceTimeline;

use thiserror::Error;

/// Precondition failures of voice operations
///
/// A failed mutating call may leave the timeline partially changed; callers
/// that need to retry should work on a clone.
#[derive(Debug, Error, PartialEq)]
pub enum VoiceError {
    #[error("Voice timeline cannot be empty")]
    EmptyTimeline,

    #[error("Removing the only item would empty the voice")]
    WouldEmpty,

    #[error("Index {index} out of range for voice of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Index range {start}..{end} is empty")]
    EmptyRange { start: usize, end: usize },

    #[error("Anchors out of order: need {anchor1} < {target} < {anchor2}")]
    AnchorOrder {
        anchor1: usize,
        target: usize,
        anchor2: usize,
    },

    #[error("Target position {position_ms} ms is not strictly between {lower} ms and {upper} ms")]
    TargetOutOfBounds {
        position_ms: u64,
        lower: u64,
        upper: u64,
    },

    #[error("Operation needs a non-zero duration")]
    ZeroDuration,

    #[error("Contour number {0} is outside 1..=12")]
    ContourNumber(u8),

    #[error("Axis number {0} is outside 1..=12")]
    AxisNumber(u8),

    #[error("Partition count {0} is outside 1..=7")]
    PartitionCount(usize),

    #[error("Partition {partition} has invalid size {size}")]
    PartitionSize { partition: usize, size: usize },

    #[error("Partitions of {total} items from index {start} overrun voice of {len} items")]
    PartitionOverrun { start: usize, total: usize, len: usize },

    #[error("Permutation index {index} is outside 1..={palette_len}")]
    PermutationIndex { index: usize, palette_len: usize },

    #[error("Permutation is empty")]
    EmptyPermutation,

    #[error("Palette is empty")]
    EmptyPalette,

    #[error("Velocity factor {0} must be finite and non-negative")]
    Factor(f64),
}
