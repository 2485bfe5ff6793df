//! Simulation configuration files.
//!
//! A configuration names the three directories a sweep needs and may override
//! any sweep parameter:
//!
//! ```toml
//! cfg = "/data/vvc/cfg/per-sequence"
//! vtm = "/opt/VVCSoftware_VTM"
//! out = "./runs"
//!
//! version = "Approx"
//! qps = [22, 27, 32, 37]
//! encoder = ["AI", "RA"]
//! n_frames = 32
//! bg_exec = true
//! ```
//!
//! JSON with the same keys is accepted when the file ends in `.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Contents of a simulation configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Directory of per-video `.cfg` files.
    pub cfg: PathBuf,
    /// VTM source tree (binary under `bin/`, encoder configs under `cfg/`).
    pub vtm: PathBuf,
    /// Output directory for logs and bitstreams.
    pub out: PathBuf,
    /// Version label for this sweep.
    #[serde(default)]
    pub version: Option<String>,
    /// Quality parameters to sweep.
    #[serde(default)]
    pub qps: Option<Vec<u32>>,
    /// Encoder configuration names (AI, RA, LB, LP or a file name).
    #[serde(default)]
    pub encoder: Option<Vec<String>>,
    /// Frames to encode per run.
    #[serde(default)]
    pub n_frames: Option<u32>,
    /// Run encoder jobs concurrently.
    #[serde(default)]
    pub bg_exec: Option<bool>,
}

impl SimulationConfig {
    /// Load from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&text),
            Some("json") => Ok(serde_json::from_str(&text)?),
            _ => Err(Error::Config(format!(
                "unsupported configuration format: {} (expected .toml or .json)",
                path.display()
            ))),
        }
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
