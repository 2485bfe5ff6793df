//! On-disk layout of sweep output.
//!
//! ```text
//! <out>/<version>/sweep.json
//! <out>/<version>/<video>/<cfg>/QP<qp>.log
//! <out>/<version>/<video>/<cfg>/QP<qp>.bin
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::table::RunTable;

/// Directory holding every run of one version.
#[must_use]
pub fn version_dir(out: &Path, version: &str) -> PathBuf {
    out.join(version)
}

/// Directory holding the runs of one (version, video, cfg).
#[must_use]
pub fn run_dir(out: &Path, version: &str, video: &str, cfg: &str) -> PathBuf {
    version_dir(out, version).join(video).join(cfg)
}

/// Encoder log of one run.
#[must_use]
pub fn log_path(out: &Path, version: &str, video: &str, cfg: &str, qp: u32) -> PathBuf {
    run_dir(out, version, video, cfg).join(format!("QP{qp}.log"))
}

/// Bitstream of one run.
#[must_use]
pub fn bitstream_path(out: &Path, version: &str, video: &str, cfg: &str, qp: u32) -> PathBuf {
    run_dir(out, version, video, cfg).join(format!("QP{qp}.bin"))
}

/// Sweep report of one version.
#[must_use]
pub fn report_path(out: &Path, version: &str) -> PathBuf {
    version_dir(out, version).join("sweep.json")
}

/// Load the logs of every QP for one (version, video, cfg) into a table.
/// Records carry the swept QP of the log they came from.
pub fn load_run_table(
    out: &Path,
    version: &str,
    video: &str,
    cfg: &str,
    qps: &[u32],
) -> Result<RunTable> {
    let logs: Vec<(u32, PathBuf)> = qps
        .iter()
        .map(|&qp| (qp, log_path(out, version, video, cfg, qp)))
        .collect();
    RunTable::from_vtm_logs(&logs)
}

/// Subdirectory names of `dir`, sorted.
pub fn subdirs(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "directory does not exist: {}",
            dir.display()
        )));
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Videos present in the output of one version.
pub fn videos(out: &Path, version: &str) -> Result<Vec<String>> {
    subdirs(&version_dir(out, version))
}

/// Encoder configurations present for one video of one version.
pub fn configs(out: &Path, version: &str, video: &str) -> Result<Vec<String>> {
    subdirs(&version_dir(out, version).join(video))
}
