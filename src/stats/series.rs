//! Keyed collection of BD-rate results.
//!
//! A [`BdRateSeries`] maps (version, video, configuration, frame) to a BD-rate
//! value. Entries keep insertion order and [`BdRateSeries::append`]
//! concatenates, so colliding keys are kept side by side rather than merged.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stats::bd_rate::{ComparatorConfig, bd_rate_groups};
use crate::stats::chart::{BarChart, BarSeries, ChartConfig, colors, generate_bar_svg};
use crate::table::RunTable;

/// Composite key of a BD-rate value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Encoder version label.
    pub version: String,
    /// Video identifier.
    pub video: String,
    /// Encoder configuration name.
    pub cfg: String,
    /// First frame of the group.
    pub frame: u32,
}

/// The (version, video, configuration) triple a comparison is labelled with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesLabels {
    /// Encoder version label.
    pub version: String,
    /// Video identifier.
    pub video: String,
    /// Encoder configuration name.
    pub cfg: String,
}

impl SeriesLabels {
    /// Create a new label triple.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        video: impl Into<String>,
        cfg: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            video: video.into(),
            cfg: cfg.into(),
        }
    }

    /// Key for a frame under these labels.
    #[must_use]
    pub fn key(&self, frame: u32) -> SeriesKey {
        SeriesKey {
            version: self.version.clone(),
            video: self.video.clone(),
            cfg: self.cfg.clone(),
            frame,
        }
    }
}

/// One BD-rate value with its key, flat for JSON and CSV output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BdRateEntry {
    /// Encoder version label.
    pub version: String,
    /// Video identifier.
    pub video: String,
    /// Encoder configuration name.
    pub cfg: String,
    /// First frame of the group.
    pub frame: u32,
    /// BD-rate in percent.
    pub bd_rate: f64,
}

impl BdRateEntry {
    /// The entry's composite key.
    #[must_use]
    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            version: self.version.clone(),
            video: self.video.clone(),
            cfg: self.cfg.clone(),
            frame: self.frame,
        }
    }

    fn matches(&self, key: &SeriesKey) -> bool {
        self.frame == key.frame
            && self.version == key.version
            && self.video == key.video
            && self.cfg == key.cfg
    }
}

/// A pair of runs to compare, with the labels for the resulting entries.
#[derive(Debug, Clone)]
pub struct BdRateJob {
    /// Labels attached to every group of this pair.
    pub labels: SeriesLabels,
    /// Comparison run.
    pub cmp: RunTable,
    /// Reference run.
    pub reference: RunTable,
}

/// Reduced value for one (version, configuration) of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastFrameValue {
    /// Encoder version label.
    pub version: String,
    /// Encoder configuration name.
    pub cfg: String,
    /// The last frame seen for this pair.
    pub frame: u32,
    /// BD-rate at that frame.
    pub bd_rate: f64,
}

/// Ordered BD-rate values keyed by (version, video, cfg, frame).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BdRateSeries {
    entries: Vec<BdRateEntry>,
}

impl BdRateSeries {
    /// Create an empty series.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute a fresh series for one pair of runs.
    pub fn from_runs(
        labels: &SeriesLabels,
        cmp: &RunTable,
        reference: &RunTable,
        config: &ComparatorConfig,
    ) -> Result<Self> {
        let entries = bd_rate_groups(cmp, reference, config)?
            .into_iter()
            .map(|g| BdRateEntry {
                version: labels.version.clone(),
                video: labels.video.clone(),
                cfg: labels.cfg.clone(),
                frame: g.frame,
                bd_rate: g.bd_rate,
            })
            .collect();
        Ok(Self { entries })
    }

    /// Replace the contents with the series computed for one pair of runs.
    ///
    /// On error the previous contents are left untouched.
    pub fn compute(
        &mut self,
        labels: &SeriesLabels,
        cmp: &RunTable,
        reference: &RunTable,
        config: &ComparatorConfig,
    ) -> Result<()> {
        *self = Self::from_runs(labels, cmp, reference, config)?;
        Ok(())
    }

    /// Compute many independent pairs in parallel.
    ///
    /// Results are appended in job order regardless of completion order. The
    /// first failing job fails the whole batch.
    pub fn compute_batch(jobs: &[BdRateJob], config: &ComparatorConfig) -> Result<Self> {
        let parts = jobs
            .par_iter()
            .map(|job| Self::from_runs(&job.labels, &job.cmp, &job.reference, config))
            .collect::<Result<Vec<_>>>()?;

        let mut series = Self::new();
        for part in &parts {
            series.append(part);
        }
        Ok(series)
    }

    /// Concatenate another series onto this one. Duplicate keys are kept.
    pub fn append(&mut self, other: &Self) {
        self.entries.extend_from_slice(&other.entries);
    }

    /// Add a single value.
    pub fn push(&mut self, key: SeriesKey, bd_rate: f64) {
        self.entries.push(BdRateEntry {
            version: key.version,
            video: key.video,
            cfg: key.cfg,
            frame: key.frame,
            bd_rate,
        });
    }

    /// Number of entries, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the series has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[BdRateEntry] {
        &self.entries
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &BdRateEntry> {
        self.entries.iter()
    }

    /// Value of the first entry with this key.
    #[must_use]
    pub fn get(&self, key: &SeriesKey) -> Option<f64> {
        self.entries.iter().find(|e| e.matches(key)).map(|e| e.bd_rate)
    }

    /// Distinct videos, in first-appearance order.
    #[must_use]
    pub fn videos(&self) -> Vec<&str> {
        first_appearance(self.entries.iter().map(|e| e.video.as_str()))
    }

    /// For one video, the value at the last frame of every (version, cfg).
    ///
    /// Pairs come back in first-appearance order. When the last frame
    /// appears more than once, the latest insertion wins.
    #[must_use]
    pub fn last_frame_values(&self, video: &str) -> Vec<LastFrameValue> {
        let mut reduced: Vec<LastFrameValue> = Vec::new();
        for e in self.entries.iter().filter(|e| e.video == video) {
            match reduced
                .iter_mut()
                .find(|r| r.version == e.version && r.cfg == e.cfg)
            {
                Some(r) if e.frame >= r.frame => {
                    r.frame = e.frame;
                    r.bd_rate = e.bd_rate;
                }
                Some(_) => {}
                None => reduced.push(LastFrameValue {
                    version: e.version.clone(),
                    cfg: e.cfg.clone(),
                    frame: e.frame,
                    bd_rate: e.bd_rate,
                }),
            }
        }
        reduced
    }

    /// Grouped bar chart data for one video: a cluster per configuration and
    /// a bar per version, each bar the last-frame value.
    #[must_use]
    pub fn bar_chart(&self, video: &str) -> BarChart {
        let values = self.last_frame_values(video);
        let categories: Vec<String> =
            first_appearance(values.iter().map(|v| v.cfg.as_str()))
                .into_iter()
                .map(String::from)
                .collect();
        let versions = first_appearance(values.iter().map(|v| v.version.as_str()));

        let series = versions
            .iter()
            .enumerate()
            .map(|(i, version)| BarSeries {
                name: (*version).to_string(),
                color: colors::nth(i).to_string(),
                values: categories
                    .iter()
                    .map(|cfg| {
                        values
                            .iter()
                            .find(|v| v.version == *version && v.cfg == *cfg)
                            .map(|v| v.bd_rate)
                    })
                    .collect(),
            })
            .collect();

        BarChart { categories, series }
    }

    /// Render the bar chart for one video as SVG.
    pub fn render_svg(&self, video: &str) -> Result<String> {
        let chart = self.bar_chart(video);
        let config = ChartConfig::new(format!("BD-Rate by configuration for \"{video}\""))
            .with_x_label("Configuration Parameter")
            .with_y_label("BD-Rate (%)");
        let svg = generate_bar_svg(&chart, &config);
        if svg.is_empty() {
            return Err(Error::Report(format!("no BD-rate values for video {video:?}")));
        }
        Ok(svg)
    }

    /// Write the chart for one video to `dir/bdr_<video>.svg`.
    pub fn save_chart(&self, video: &str, dir: &Path) -> Result<PathBuf> {
        let svg = self.render_svg(video)?;
        fs::create_dir_all(dir)?;
        let path = chart_path(dir, video);
        fs::write(&path, svg)?;
        log::info!("chart written to {}", path.display());
        Ok(path)
    }

    /// Serialize as a JSON array of entries.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a JSON array of entries.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a series from a `.json` or `.csv` file.
    pub fn load(path: &Path) -> Result<Self> {
        if has_extension(path, "csv") {
            let mut reader = csv::Reader::from_path(path)?;
            let entries = reader
                .deserialize()
                .collect::<std::result::Result<Vec<BdRateEntry>, _>>()?;
            Ok(Self { entries })
        } else {
            Self::from_json(&fs::read_to_string(path)?)
        }
    }

    /// Save as CSV when the path ends in `.csv`, JSON otherwise.
    pub fn save(&self, path: &Path) -> Result<()> {
        if has_extension(path, "csv") {
            let mut writer = csv::Writer::from_path(path)?;
            for entry in &self.entries {
                writer.serialize(entry)?;
            }
            writer.flush()?;
        } else {
            fs::write(path, self.to_json()?)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a BdRateSeries {
    type Item = &'a BdRateEntry;
    type IntoIter = std::slice::Iter<'a, BdRateEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Conventional chart file name for a video.
#[must_use]
pub fn chart_path(dir: &Path, video: &str) -> PathBuf {
    dir.join(format!("bdr_{video}.svg"))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn first_appearance<'a>(items: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::new();
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RunRecord;

    fn run(frames: u32, scale: f64) -> RunTable {
        (0..frames)
            .flat_map(|f| {
                [(22, 5000.0, 42.0), (27, 2600.0, 39.5), (32, 1300.0, 36.8), (37, 700.0, 34.1)]
                    .into_iter()
                    .map(move |(qp, rate, psnr)| RunRecord::new(f, qp, rate * scale, psnr))
            })
            .collect()
    }

    fn key(version: &str, video: &str, cfg: &str, frame: u32) -> SeriesKey {
        SeriesLabels::new(version, video, cfg).key(frame)
    }

    #[test]
    fn test_compute_keys_each_group() {
        let labels = SeriesLabels::new("Approx", "BasketballPass", "RA");
        let config = ComparatorConfig::default();
        let series =
            BdRateSeries::from_runs(&labels, &run(3, 1.05), &run(3, 1.0), &config).unwrap();

        assert_eq!(series.len(), 3);
        let frames: Vec<u32> = series.iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![0, 1, 2]);
        let value = series.get(&key("Approx", "BasketballPass", "RA", 2)).unwrap();
        assert!((value - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_compute_replaces_contents() {
        let config = ComparatorConfig::default();
        let (a, b) = (SeriesLabels::new("a", "v", "AI"), SeriesLabels::new("b", "v", "AI"));
        let mut series = BdRateSeries::new();
        series.compute(&a, &run(2, 1.0), &run(2, 1.0), &config).unwrap();
        series.compute(&b, &run(1, 1.0), &run(1, 1.0), &config).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.entries()[0].version, "b");
    }

    #[test]
    fn test_failed_compute_keeps_contents() {
        let config = ComparatorConfig::default();
        let (a, b) = (SeriesLabels::new("a", "v", "AI"), SeriesLabels::new("b", "v", "AI"));
        let mut series = BdRateSeries::new();
        series.compute(&a, &run(2, 1.0), &run(2, 1.0), &config).unwrap();
        let err = series.compute(&b, &run(1, 1.0), &run(2, 1.0), &config);
        assert!(err.is_err());
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_append_keeps_duplicates() {
        let mut a = BdRateSeries::new();
        a.push(key("a", "v", "AI", 0), 1.0);
        a.push(key("a", "v", "AI", 1), 2.0);
        let mut b = BdRateSeries::new();
        b.push(key("a", "v", "AI", 0), 9.0);

        a.append(&b);
        assert_eq!(a.len(), 3);
        // First match wins on lookup
        assert_eq!(a.get(&key("a", "v", "AI", 0)), Some(1.0));
    }

    #[test]
    fn test_compute_batch_preserves_job_order() {
        let jobs: Vec<BdRateJob> = ["AI", "RA", "LB"]
            .iter()
            .enumerate()
            .map(|(i, cfg)| BdRateJob {
                labels: SeriesLabels::new("Approx", "v", *cfg),
                cmp: run(2, 1.0 + i as f64 * 0.01),
                reference: run(2, 1.0),
            })
            .collect();

        let series = BdRateSeries::compute_batch(&jobs, &ComparatorConfig::default()).unwrap();
        assert_eq!(series.len(), 6);
        let cfgs: Vec<&str> = series.iter().map(|e| e.cfg.as_str()).collect();
        assert_eq!(cfgs, vec!["AI", "AI", "RA", "RA", "LB", "LB"]);
    }

    #[test]
    fn test_compute_batch_propagates_error() {
        let jobs = vec![
            BdRateJob {
                labels: SeriesLabels::new("a", "v", "AI"),
                cmp: run(1, 1.0),
                reference: run(1, 1.0),
            },
            BdRateJob {
                labels: SeriesLabels::new("a", "v", "RA"),
                cmp: run(1, 1.0),
                reference: run(2, 1.0),
            },
        ];
        assert!(matches!(
            BdRateSeries::compute_batch(&jobs, &ComparatorConfig::default()),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_last_frame_values() {
        let mut s = BdRateSeries::new();
        s.push(key("Approx", "v", "AI", 0), 1.0);
        s.push(key("Approx", "v", "AI", 31), 3.0);
        s.push(key("Approx", "v", "AI", 8), 2.0);
        s.push(key("Approx", "v", "RA", 31), -1.0);
        s.push(key("Approx", "other", "AI", 40), 99.0);
        s.push(key("Approx", "v", "AI", 31), 4.0);

        let values = s.last_frame_values("v");
        assert_eq!(values.len(), 2);
        assert_eq!((values[0].cfg.as_str(), values[0].frame, values[0].bd_rate), ("AI", 31, 4.0));
        assert_eq!((values[1].cfg.as_str(), values[1].bd_rate), ("RA", -1.0));
    }

    #[test]
    fn test_bar_chart_layout() {
        let mut s = BdRateSeries::new();
        s.push(key("Precise", "v", "AI", 31), 0.0);
        s.push(key("Approx", "v", "AI", 31), 1.5);
        s.push(key("Approx", "v", "RA", 31), 2.5);

        let chart = s.bar_chart("v");
        assert_eq!(chart.categories, vec!["AI", "RA"]);
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].name, "Precise");
        assert_eq!(chart.series[0].values, vec![Some(0.0), None]);
        assert_eq!(chart.series[1].values, vec![Some(1.5), Some(2.5)]);
    }

    #[test]
    fn test_render_unknown_video_is_error() {
        let s = BdRateSeries::new();
        assert!(matches!(s.render_svg("missing"), Err(Error::Report(_))));
    }

    #[test]
    fn test_save_chart_names_file_by_video() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = BdRateSeries::new();
        s.push(key("Approx", "BQMall", "RA", 31), 1.0);

        let path = s.save_chart("BQMall", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("bdr_BQMall.svg"));
        assert!(fs::read_to_string(path).unwrap().contains("BQMall"));
    }

    #[test]
    fn test_save_and_load_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = BdRateSeries::new();
        s.push(key("Approx", "v", "AI", 0), -0.25);
        s.push(key("Approx", "v", "AI", 0), 0.5);

        for name in ["bdr.json", "bdr.csv"] {
            let path = dir.path().join(name);
            s.save(&path).unwrap();
            assert_eq!(BdRateSeries::load(&path).unwrap(), s, "{name}");
        }
    }

    #[test]
    fn test_videos_first_appearance() {
        let mut s = BdRateSeries::new();
        s.push(key("a", "B", "AI", 0), 0.0);
        s.push(key("a", "A", "AI", 0), 0.0);
        s.push(key("b", "B", "AI", 0), 0.0);
        assert_eq!(s.videos(), vec!["B", "A"]);
    }
}
