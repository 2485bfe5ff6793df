//! # vvc-eval
//!
//! Encoder sweep driver and BD-rate comparison for the VTM reference encoder.
//!
//! A sweep encodes every (video, encoder configuration, QP) combination of a
//! [`Simulation`] and keeps one log per run. Two sweeps of different encoder
//! versions are then compared frame-group by frame-group with the
//! Bjøntegaard-delta rate, and the results are plotted as grouped bar charts.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vvc_eval::{BdRateSeries, ComparatorConfig, RunTable, SeriesLabels};
//!
//! let cmp = RunTable::from_csv("approx.csv")?;
//! let reference = RunTable::from_csv("precise.csv")?;
//!
//! let series = BdRateSeries::from_runs(
//!     &SeriesLabels::new("Approx", "BQMall", "RA"),
//!     &cmp,
//!     &reference,
//!     &ComparatorConfig::default(),
//! )?;
//! series.save_chart("BQMall", "./charts".as_ref())?;
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`table`]: Per-run rate/distortion tables
//! - [`import`]: CSV and VTM log import
//! - [`stats`]: BD-rate, result series and charts
//! - [`sim`]: Encoder sweep driver

pub mod error;
pub mod import;
pub mod sim;
pub mod stats;
pub mod table;

// Re-export commonly used types
pub use error::{Error, Result};
pub use import::{RunTableImporter, RunTableSchema};
pub use sim::{Encoder, Simulation, SimulationConfig, SweepReport, VtmEncoder};
pub use stats::{
    BdRateSeries, ComparatorConfig, CurveFit, SeriesKey, SeriesLabels, Summary, TrailingGroup,
};
pub use table::{RunRecord, RunTable};
