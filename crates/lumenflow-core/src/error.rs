//! Error types for snapshot validation and configuration
use thiserror::Error;

/// Reasons a mapping snapshot is rejected at publication time.
///
/// Validation happens once, when a snapshot is built; the previously
/// published snapshot stays active when it fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// Two ranges claim the same entity id.
    #[error("entity ranges [{a_from}, {a_to}] and [{b_from}, {b_to}] overlap")]
    Overlap {
        /// First id of the earlier range.
        a_from: u32,
        /// Last id of the earlier range.
        a_to: u32,
        /// First id of the later range.
        b_from: u32,
        /// Last id of the later range.
        b_to: u32,
    },

    /// A range's channel run does not fit inside the 512-channel universe.
    #[error("range [{from}, {to}] spans channels {start}..={end}, outside 1..=512")]
    OutOfRange {
        /// First entity id of the offending range.
        from: u32,
        /// Last entity id of the offending range.
        to: u32,
        /// First DMX channel the range would use (1-based).
        start: u32,
        /// Last DMX channel the range would use (1-based).
        end: u32,
    },

    /// A channel layout listed no components, or more than four.
    #[error("channel layout must have 1 to 4 components, got {count}")]
    BadLayout {
        /// Number of components in the rejected layout.
        count: usize,
    },

    /// `from` exceeds `to`, so the range contains no entities.
    #[error("entity range [{from}, {to}] is empty")]
    EmptyRange {
        /// Declared first id.
        from: u32,
        /// Declared last id.
        to: u32,
    },
}

/// Reasons a patch snapshot is rejected at publication time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The rules form a directed cycle on channels of one universe.
    #[error("patch rules cycle through channel {channel} of universe {universe}")]
    Cycle {
        /// Universe the cycle lives in.
        universe: u16,
        /// A channel on the cycle (1-based).
        channel: u16,
    },

    /// A rule references a channel outside the universe.
    #[error("patch rule channel {channel} in universe {universe} is outside 1..=512")]
    OutOfRange {
        /// Universe of the offending rule.
        universe: u16,
        /// The out-of-range channel (1-based).
        channel: u16,
    },
}

/// Errors surfaced when turning a raw configuration into snapshots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Mapping list failed validation.
    #[error("mapping: {0}")]
    Mapping(#[from] MappingError),

    /// Patch list failed validation.
    #[error("patch: {0}")]
    Patch(#[from] PatchError),
}
