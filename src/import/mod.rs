//! Import of run measurements produced outside this crate.
//!
//! Two sources are supported:
//!
//! - CSV tables with one row per (frame, QP), via [`RunTableImporter`]
//! - raw VTM encoder logs, via [`vtm_log`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use vvc_eval::import::{RunTableImporter, RunTableSchema};
//!
//! let schema = RunTableSchema::builder()
//!     .frame_column("poc")
//!     .rate_column("kbps")
//!     .distortion_column("y_psnr")
//!     .build();
//!
//! let table = RunTableImporter::new(schema).import("precise_ra.csv")?;
//! ```

pub mod vtm_log;

use std::path::Path;

use crate::error::{Error, Result};
use crate::table::{RunRecord, RunTable};

/// Column names for CSV import. Unset columns fall back to common aliases.
#[derive(Debug, Clone, Default)]
pub struct RunTableSchema {
    /// Column name for the frame index.
    pub frame_column: Option<String>,
    /// Column name for the quality parameter.
    pub qp_column: Option<String>,
    /// Column name for the rate.
    pub rate_column: Option<String>,
    /// Column name for the distortion metric.
    pub distortion_column: Option<String>,
}

impl RunTableSchema {
    /// Create a schema builder.
    #[must_use]
    pub fn builder() -> RunTableSchemaBuilder {
        RunTableSchemaBuilder::default()
    }

    /// Create a schema that auto-detects columns from common names.
    #[must_use]
    pub fn auto_detect() -> Self {
        Self::default()
    }

    fn find_column(
        headers: &[&str],
        primary: Option<&str>,
        aliases: &[&str],
    ) -> Option<usize> {
        if let Some(name) = primary {
            if let Some(idx) = find_header_index(headers, name) {
                return Some(idx);
            }
        }

        aliases
            .iter()
            .find_map(|alias| find_header_index(headers, alias))
    }
}

/// Builder for [`RunTableSchema`].
#[derive(Debug, Default)]
pub struct RunTableSchemaBuilder {
    schema: RunTableSchema,
}

impl RunTableSchemaBuilder {
    /// Set the frame column name.
    #[must_use]
    pub fn frame_column(mut self, name: impl Into<String>) -> Self {
        self.schema.frame_column = Some(name.into());
        self
    }

    /// Set the QP column name.
    #[must_use]
    pub fn qp_column(mut self, name: impl Into<String>) -> Self {
        self.schema.qp_column = Some(name.into());
        self
    }

    /// Set the rate column name.
    #[must_use]
    pub fn rate_column(mut self, name: impl Into<String>) -> Self {
        self.schema.rate_column = Some(name.into());
        self
    }

    /// Set the distortion column name.
    #[must_use]
    pub fn distortion_column(mut self, name: impl Into<String>) -> Self {
        self.schema.distortion_column = Some(name.into());
        self
    }

    /// Build the schema.
    #[must_use]
    pub fn build(self) -> RunTableSchema {
        self.schema
    }
}

/// CSV importer for run tables.
pub struct RunTableImporter {
    schema: RunTableSchema,
}

impl RunTableImporter {
    /// Create a new importer with the given schema.
    #[must_use]
    pub fn new(schema: RunTableSchema) -> Self {
        Self { schema }
    }

    /// Create an importer that auto-detects columns.
    #[must_use]
    pub fn auto_detect() -> Self {
        Self::new(RunTableSchema::auto_detect())
    }

    /// Import a run table from a CSV file.
    ///
    /// Every row must carry all four values; a missing or unparsable cell is
    /// reported with its line number rather than skipped.
    pub fn import(&self, path: impl AsRef<Path>) -> Result<RunTable> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        self.read(&mut reader)
    }

    /// Import a run table from any CSV reader.
    pub fn read<R: std::io::Read>(&self, reader: &mut csv::Reader<R>) -> Result<RunTable> {
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();

        let column = |primary: Option<&str>, aliases: &[&str], what: &str| {
            RunTableSchema::find_column(&header_refs, primary, aliases).ok_or_else(|| {
                Error::CsvImport {
                    line: 0,
                    reason: format!("Could not find {what} column"),
                }
            })
        };

        let frame_idx = column(
            self.schema.frame_column.as_deref(),
            &["frame", "poc", "frame_idx"],
            "frame",
        )?;
        let qp_idx = column(self.schema.qp_column.as_deref(), &["qp", "quality"], "qp")?;
        let rate_idx = column(
            self.schema.rate_column.as_deref(),
            &["rate", "bitrate", "bits", "kbps"],
            "rate",
        )?;
        let distortion_idx = column(
            self.schema.distortion_column.as_deref(),
            &["distortion", "psnr", "y_psnr", "ypsnr", "y-psnr"],
            "distortion",
        )?;

        let mut table = RunTable::default();

        for (line_num, record) in reader.records().enumerate() {
            let line = line_num + 2; // 1-based plus header
            let record = record.map_err(|e| Error::CsvImport {
                line,
                reason: e.to_string(),
            })?;

            table.push(RunRecord {
                frame: parse_cell(&record, frame_idx, "frame", line)?,
                qp: parse_cell(&record, qp_idx, "qp", line)?,
                rate: parse_cell(&record, rate_idx, "rate", line)?,
                distortion: parse_cell(&record, distortion_idx, "distortion", line)?,
            });
        }

        Ok(table)
    }
}

fn parse_cell<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<T> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse().map_err(|_| Error::CsvImport {
        line,
        reason: format!("invalid {name} value {raw:?}"),
    })
}

/// Find a header index by name (case-insensitive).
fn find_header_index(headers: &[&str], name: &str) -> Option<usize> {
    let name_lower = name.to_lowercase();
    headers
        .iter()
        .position(|h| h.trim().to_lowercase() == name_lower)
}
