//! Per-run rate/distortion measurements.
//!
//! A [`RunTable`] holds every (frame, QP) measurement for one
//! (video, configuration, version) triple. After [`RunTable::sort`], groups of
//! consecutive rows sharing a frame form that frame's rate-distortion curve.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One encoder measurement for a single frame at a single QP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Frame index (picture order count).
    pub frame: u32,
    /// Quality parameter used for the run.
    pub qp: u32,
    /// Rate (bits or kbps). Must be positive for BD-rate.
    pub rate: f64,
    /// Distortion metric (Y-PSNR in dB).
    pub distortion: f64,
}

impl RunRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(frame: u32, qp: u32, rate: f64, distortion: f64) -> Self {
        Self {
            frame,
            qp,
            rate,
            distortion,
        }
    }
}

/// Ordered collection of [`RunRecord`]s for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTable {
    records: Vec<RunRecord>,
}

impl RunTable {
    /// Create a table from records, keeping their order.
    #[must_use]
    pub fn new(records: Vec<RunRecord>) -> Self {
        Self { records }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in their current order.
    #[must_use]
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// Add a record at the end.
    pub fn push(&mut self, record: RunRecord) {
        self.records.push(record);
    }

    /// Sort by (frame, qp) ascending.
    pub fn sort(&mut self) {
        self.records.sort_by_key(|r| (r.frame, r.qp));
    }

    /// Sorted copy of this table.
    #[must_use]
    pub fn sorted(&self) -> Self {
        let mut table = self.clone();
        table.sort();
        table
    }

    /// Distinct frame numbers, ascending.
    #[must_use]
    pub fn frames(&self) -> Vec<u32> {
        let mut frames: Vec<u32> = self.records.iter().map(|r| r.frame).collect();
        frames.sort_unstable();
        frames.dedup();
        frames
    }

    /// Import a table from CSV using header auto-detection.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        crate::import::RunTableImporter::auto_detect().import(path)
    }

    /// Merge the per-frame lines of several VTM encoder logs into one table.
    ///
    /// Each log is paired with the QP it was encoded at. That QP replaces the
    /// per-picture slice QP, which carries temporal-layer offsets in RA and LB
    /// configurations.
    pub fn from_vtm_logs<P: AsRef<Path>>(logs: &[(u32, P)]) -> Result<Self> {
        let mut table = Self::default();
        for (qp, path) in logs {
            let records = crate::import::vtm_log::parse_log_file(path.as_ref())?;
            table
                .records
                .extend(records.into_iter().map(|r| RunRecord { qp: *qp, ..r }));
        }
        Ok(table)
    }

    /// Write the table as CSV with `frame,qp,rate,distortion` headers.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl FromIterator<RunRecord> for RunTable {
    fn from_iter<I: IntoIterator<Item = RunRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_frame_then_qp() {
        let table = RunTable::new(vec![
            RunRecord::new(1, 22, 10.0, 40.0),
            RunRecord::new(0, 27, 8.0, 38.0),
            RunRecord::new(0, 22, 12.0, 41.0),
        ]);

        let sorted = table.sorted();
        let keys: Vec<_> = sorted.records().iter().map(|r| (r.frame, r.qp)).collect();
        assert_eq!(keys, vec![(0, 22), (0, 27), (1, 22)]);
        // Original untouched
        assert_eq!(table.records()[0].frame, 1);
    }

    #[test]
    fn test_frames_distinct() {
        let table: RunTable = [
            RunRecord::new(2, 22, 1.0, 1.0),
            RunRecord::new(0, 22, 1.0, 1.0),
            RunRecord::new(2, 27, 1.0, 1.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(table.frames(), vec![0, 2]);
    }

    #[test]
    fn test_csv_write_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let table = RunTable::new(vec![
            RunRecord::new(0, 22, 1000.0, 30.0),
            RunRecord::new(0, 27, 800.0, 31.0),
        ]);
        table.write_csv(&path).unwrap();

        let loaded = RunTable::from_csv(&path).unwrap();
        assert_eq!(loaded, table);
    }
}
