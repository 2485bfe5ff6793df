//! Error types for vvc-eval operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vvc-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while sweeping the encoder or comparing runs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A rate value was zero, negative, or not finite.
    #[error("Non-positive rate {rate} at frame {frame}, QP {qp}")]
    NonPositiveRate {
        /// Frame of the offending record.
        frame: u32,
        /// Quality parameter of the offending record.
        qp: u32,
        /// The rate value.
        rate: f64,
    },

    /// Comparison and reference tables differ in length.
    #[error("Table length mismatch: comparison has {cmp} rows, reference has {reference}")]
    LengthMismatch {
        /// Rows in the comparison table.
        cmp: usize,
        /// Rows in the reference table.
        reference: usize,
    },

    /// Table length is not a multiple of the group size.
    #[error("{len} rows do not divide into groups of {group_size} ({remainder} left over)")]
    PartialGroup {
        /// Table length.
        len: usize,
        /// Configured group size.
        group_size: usize,
        /// Rows in the trailing partial group.
        remainder: usize,
    },

    /// Comparison and reference groups describe different frames.
    #[error("Group {group} mismatch: comparison frame {cmp_frame}, reference frame {ref_frame}")]
    GroupMismatch {
        /// Group index.
        group: usize,
        /// First frame of the comparison group.
        cmp_frame: u32,
        /// First frame of the reference group.
        ref_frame: u32,
    },

    /// A group holds rows of more than one frame, usually because the group
    /// size differs from the number of QPs per frame.
    #[error("Group {group} spans frames {frame} and {other_frame}")]
    MixedGroup {
        /// Group index.
        group: usize,
        /// First frame of the group.
        frame: u32,
        /// A different frame found in the same group.
        other_frame: u32,
    },

    /// Group size too small to fit a curve.
    #[error("Invalid group size {0} (need at least 2 points per curve)")]
    InvalidGroupSize(usize),

    /// The two curves share no distortion range.
    #[error("No distortion overlap at frame {frame}: [{lower}, {upper}] is empty")]
    NoOverlap {
        /// Frame of the group.
        frame: u32,
        /// Lower bound of the intersected range.
        lower: f64,
        /// Upper bound of the intersected range.
        upper: f64,
    },

    /// A curve cannot be fitted (repeated distortion values).
    #[error("Degenerate curve: {0}")]
    DegenerateCurve(String),

    /// Invalid simulation configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error importing CSV data.
    #[error("CSV import error at line {line}: {reason}")]
    CsvImport {
        /// Line number where the error occurred.
        line: usize,
        /// Reason for the failure.
        reason: String,
    },

    /// Failed to parse an encoder log.
    #[error("VTM log error: {path}: {reason}")]
    VtmLog {
        /// Path to the log.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// The external encoder failed to start or exited with an error.
    #[error("Encoder error ({job}): {message}")]
    Encoder {
        /// Job identifier.
        job: String,
        /// Error message.
        message: String,
    },

    /// Error producing a report or chart.
    #[error("Report error: {0}")]
    Report(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
