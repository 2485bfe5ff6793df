//! Encoder sweep driver.
//!
//! A [`Simulation`] holds the sweep parameters: which videos, which encoder
//! configurations, which QPs, how many frames, and where the VTM tree and
//! output directory live. [`Simulation::run`] invokes an [`Encoder`] once per
//! (video, configuration, QP) combination.
//!
//! ```rust,ignore
//! use vvc_eval::sim::{Simulation, VtmEncoder};
//!
//! let mut sim = Simulation::from_config_file("sim.toml".as_ref())?;
//! sim.set_version("Approx");
//! let encoder = VtmEncoder::new(sim.vtm_dir().unwrap());
//! let report = sim.run(&encoder)?;
//! ```

pub mod config;
pub mod encoder;
pub mod layout;
mod sweep;

pub use config::SimulationConfig;
pub use encoder::{EncodeJob, Encoder, VtmEncoder, rebuild_vtm};
pub use sweep::{JobReport, SweepReport};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Extension of per-video configuration files.
pub const VIDEO_CFG_EXTENSION: &str = "cfg";

/// Default quality parameters.
pub const DEFAULT_QPS: [u32; 4] = [22, 27, 32, 37];

/// Default encoder configurations.
pub const DEFAULT_ENCODERS: [&str; 3] = ["AI", "RA", "LB"];

/// Default frames per run.
pub const DEFAULT_FRAMES: u32 = 32;

/// Default version label.
pub const DEFAULT_VERSION: &str = "Precise";

/// Sweep parameters.
#[derive(Debug, Clone)]
pub struct Simulation {
    out_dir: Option<PathBuf>,
    vtm_dir: Option<PathBuf>,
    cfg_dir: Option<PathBuf>,
    version: String,
    qps: Vec<u32>,
    encoder: Vec<String>,
    n_frames: u32,
    bg_exec: bool,
    videos: Vec<PathBuf>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            out_dir: None,
            vtm_dir: None,
            cfg_dir: None,
            version: DEFAULT_VERSION.to_string(),
            qps: DEFAULT_QPS.to_vec(),
            encoder: DEFAULT_ENCODERS.iter().map(|s| (*s).to_string()).collect(),
            n_frames: DEFAULT_FRAMES,
            bg_exec: true,
            videos: Vec::new(),
        }
    }
}

impl Simulation {
    /// Create a simulation with the given sweep parameters and no paths.
    pub fn new(
        n_frames: u32,
        version: impl Into<String>,
        qps: Vec<u32>,
        encoder: Vec<String>,
    ) -> Result<Self> {
        let mut sim = Self::default();
        sim.set_n_frames(n_frames)?;
        sim.set_version(version);
        sim.set_qps(qps);
        sim.set_encoder(encoder);
        Ok(sim)
    }

    /// Build from a parsed configuration. Paths are validated as if set
    /// through the setters.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        let mut sim = Self::default();
        if let Some(version) = &config.version {
            sim.set_version(version.clone());
        }
        if let Some(qps) = &config.qps {
            sim.set_qps(qps.clone());
        }
        if let Some(encoder) = &config.encoder {
            sim.set_encoder(encoder.clone());
        }
        if let Some(n_frames) = config.n_frames {
            sim.set_n_frames(n_frames)?;
        }
        match config.bg_exec {
            Some(false) => sim.disable_bg_exec(),
            _ => sim.enable_bg_exec(),
        }
        sim.set_paths(&config.out, &config.vtm, &config.cfg)?;
        Ok(sim)
    }

    /// Load a configuration file and build from it.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Self::from_config(&SimulationConfig::load(path)?)
    }

    //=========================================================================
    // Setters
    //=========================================================================

    /// Set output, VTM and video configuration directories.
    pub fn set_paths(&mut self, out_dir: &Path, vtm_dir: &Path, cfg_dir: &Path) -> Result<()> {
        self.set_out_dir(out_dir)?;
        self.set_vtm_dir(vtm_dir)?;
        self.set_cfg_dir(cfg_dir)
    }

    /// Set the output directory, creating it if absent.
    pub fn set_out_dir(&mut self, out_dir: &Path) -> Result<()> {
        if out_dir.exists() && !out_dir.is_dir() {
            return Err(Error::Config(format!(
                "output path is not a directory: {}",
                out_dir.display()
            )));
        }
        fs::create_dir_all(out_dir)?;
        self.out_dir = Some(out_dir.to_path_buf());
        Ok(())
    }

    /// Set the VTM tree.
    pub fn set_vtm_dir(&mut self, vtm_dir: &Path) -> Result<()> {
        if !vtm_dir.is_dir() {
            return Err(Error::Config(format!(
                "VTM directory does not exist: {}",
                vtm_dir.display()
            )));
        }
        self.vtm_dir = Some(vtm_dir.to_path_buf());
        Ok(())
    }

    /// Set the video configuration directory and replace the video list with
    /// the `.cfg` files found there.
    pub fn set_cfg_dir(&mut self, cfg_dir: &Path) -> Result<()> {
        self.videos = config_files_in_dir(cfg_dir)?;
        self.cfg_dir = Some(cfg_dir.to_path_buf());
        Ok(())
    }

    /// Set the version label.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Set the quality parameters.
    pub fn set_qps(&mut self, qps: Vec<u32>) {
        self.qps = qps;
    }

    /// Set the encoder configuration names.
    pub fn set_encoder(&mut self, encoder: Vec<String>) {
        self.encoder = encoder;
    }

    /// Set the frame count. Must be positive.
    pub fn set_n_frames(&mut self, n_frames: u32) -> Result<()> {
        if n_frames == 0 {
            return Err(Error::Config("frame count must be positive".to_string()));
        }
        self.n_frames = n_frames;
        Ok(())
    }

    /// Run encoder jobs concurrently.
    pub fn enable_bg_exec(&mut self) {
        self.bg_exec = true;
    }

    /// Run encoder jobs one after another.
    pub fn disable_bg_exec(&mut self) {
        self.bg_exec = false;
    }

    //=========================================================================
    // Video list
    //=========================================================================

    /// Add a video configuration file. It must end in `.cfg` and exist.
    /// Relative paths resolve against the configuration directory.
    pub fn append_video(&mut self, file: impl Into<PathBuf>) -> Result<()> {
        let file = file.into();
        if !has_cfg_extension(&file) {
            return Err(Error::Config(format!(
                "video configuration must end with .{}: {}",
                VIDEO_CFG_EXTENSION,
                file.display()
            )));
        }
        if !self.video_path(&file).is_file() {
            return Err(Error::Config(format!("file not found: {}", file.display())));
        }
        self.videos.push(file);
        Ok(())
    }

    /// Remove the video at `index`.
    pub fn remove_video(&mut self, index: usize) -> Result<PathBuf> {
        if index >= self.videos.len() {
            return Err(Error::Config(format!(
                "video index {} out of range ({} videos)",
                index,
                self.videos.len()
            )));
        }
        Ok(self.videos.remove(index))
    }

    /// Remove the first video with this name.
    pub fn remove_video_by_name(&mut self, name: &Path) -> Result<PathBuf> {
        let index = self
            .videos
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| Error::Config(format!("video not in list: {}", name.display())))?;
        Ok(self.videos.remove(index))
    }

    /// Switch to a new encoder version: copy `new_file` over `old_file` in
    /// the VTM tree, rebuild the encoder with `builder` (usually
    /// [`rebuild_vtm`]) and set the label.
    ///
    /// The label only changes once the rebuild succeeds.
    pub fn change_version<B>(
        &mut self,
        new_version: impl Into<String>,
        old_file: &Path,
        new_file: &Path,
        builder: B,
    ) -> Result<()>
    where
        B: FnOnce(&Path) -> Result<()>,
    {
        let vtm_dir = require(self.vtm_dir.as_deref(), "VTM directory")?;
        replace_source(new_file, old_file)?;
        builder(vtm_dir)?;
        self.set_version(new_version);
        Ok(())
    }

    //=========================================================================
    // Accessors
    //=========================================================================

    /// Output directory.
    #[must_use]
    pub fn out_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }

    /// VTM tree.
    #[must_use]
    pub fn vtm_dir(&self) -> Option<&Path> {
        self.vtm_dir.as_deref()
    }

    /// Video configuration directory.
    #[must_use]
    pub fn cfg_dir(&self) -> Option<&Path> {
        self.cfg_dir.as_deref()
    }

    /// Version label.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Quality parameters.
    #[must_use]
    pub fn qps(&self) -> &[u32] {
        &self.qps
    }

    /// Encoder configuration names.
    #[must_use]
    pub fn encoder(&self) -> &[String] {
        &self.encoder
    }

    /// Frames per run.
    #[must_use]
    pub fn n_frames(&self) -> u32 {
        self.n_frames
    }

    /// Whether jobs run concurrently.
    #[must_use]
    pub fn bg_exec(&self) -> bool {
        self.bg_exec
    }

    /// Video configuration files, as listed.
    #[must_use]
    pub fn videos(&self) -> &[PathBuf] {
        &self.videos
    }

    /// Number of encoder runs the sweep performs.
    #[must_use]
    pub fn total_runs(&self) -> usize {
        self.videos.len() * self.qps.len() * self.encoder.len()
    }

    /// Snapshot of the parameters for display or serialization.
    #[must_use]
    pub fn info(&self) -> SimulationInfo {
        SimulationInfo {
            out_dir: self.out_dir.clone(),
            vtm_dir: self.vtm_dir.clone(),
            cfg_dir: self.cfg_dir.clone(),
            version: self.version.clone(),
            qps: self.qps.clone(),
            encoder: self.encoder.clone(),
            n_frames: self.n_frames,
            bg_exec: self.bg_exec,
            videos: self.videos.clone(),
            total_runs: self.total_runs(),
        }
    }

    /// Every encoder job of the sweep, ordered by video, then configuration,
    /// then QP.
    pub fn jobs(&self) -> Result<Vec<EncodeJob>> {
        let out_dir = require(self.out_dir.as_deref(), "output directory")?;

        let mut jobs = Vec::with_capacity(self.total_runs());
        for video in &self.videos {
            let video_cfg = self.video_path(video);
            let name = video_name(video);
            for cfg in &self.encoder {
                for &qp in &self.qps {
                    jobs.push(EncodeJob {
                        version: self.version.clone(),
                        video: name.clone(),
                        video_cfg: video_cfg.clone(),
                        encoder_cfg: cfg.clone(),
                        qp,
                        n_frames: self.n_frames,
                        log_path: layout::log_path(out_dir, &self.version, &name, cfg, qp),
                        bitstream_path: layout::bitstream_path(
                            out_dir,
                            &self.version,
                            &name,
                            cfg,
                            qp,
                        ),
                    });
                }
            }
        }
        Ok(jobs)
    }

    fn video_path(&self, video: &Path) -> PathBuf {
        match &self.cfg_dir {
            Some(dir) => dir.join(video),
            None => video.to_path_buf(),
        }
    }
}

fn require<'a>(value: Option<&'a Path>, what: &str) -> Result<&'a Path> {
    value.ok_or_else(|| Error::Config(format!("{what} not set")))
}

/// Serializable snapshot of a [`Simulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInfo {
    /// Output directory.
    pub out_dir: Option<PathBuf>,
    /// VTM tree.
    pub vtm_dir: Option<PathBuf>,
    /// Video configuration directory.
    pub cfg_dir: Option<PathBuf>,
    /// Version label.
    pub version: String,
    /// Quality parameters.
    pub qps: Vec<u32>,
    /// Encoder configuration names.
    pub encoder: Vec<String>,
    /// Frames per run.
    pub n_frames: u32,
    /// Concurrent execution.
    pub bg_exec: bool,
    /// Video configuration files.
    pub videos: Vec<PathBuf>,
    /// videos × qps × encoder.
    pub total_runs: usize,
}

impl fmt::Display for SimulationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(46);
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string())
        };

        writeln!(f, "{rule}")?;
        writeln!(f, "out directory     {}", path(&self.out_dir))?;
        writeln!(f, "vtm directory     {}", path(&self.vtm_dir))?;
        writeln!(f, "cfg directory     {}", path(&self.cfg_dir))?;
        writeln!(f, "{rule}")?;
        writeln!(f, "version :         {}", self.version)?;
        writeln!(f, "qps :             {:?}", self.qps)?;
        writeln!(f, "encoder :         {:?}", self.encoder)?;
        writeln!(f, "n_frames :        {}", self.n_frames)?;
        writeln!(f, "background exec : {}", self.bg_exec)?;
        writeln!(f, "videos :          [")?;
        for (i, video) in self.videos.iter().enumerate() {
            writeln!(f, "                      {:2}. {}", i, video.display())?;
        }
        writeln!(f, "                  ]")?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "Total execution {} x {} x {} = {} simulations",
            self.videos.len(),
            self.qps.len(),
            self.encoder.len(),
            self.total_runs
        )?;
        write!(f, "{rule}")
    }
}

/// Video identifier: the configuration file stem.
#[must_use]
pub fn video_name(video_cfg: &Path) -> String {
    video_cfg
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video")
        .to_string()
}

/// Copy `new_file` over `old_file`.
pub fn replace_source(new_file: &Path, old_file: &Path) -> Result<()> {
    if !new_file.is_file() {
        return Err(Error::Config(format!(
            "replacement file not found: {}",
            new_file.display()
        )));
    }
    if let Some(parent) = old_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(Error::Config(format!(
                "target directory does not exist: {}",
                parent.display()
            )));
        }
    }
    fs::copy(new_file, old_file)?;
    log::info!("replaced {} with {}", old_file.display(), new_file.display());
    Ok(())
}

fn has_cfg_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == VIDEO_CFG_EXTENSION)
}

/// `.cfg` file names in a directory, sorted.
fn config_files_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "video config directory does not exist: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_cfg_extension(&path) {
            if let Some(name) = path.file_name() {
                files.push(PathBuf::from(name));
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dirs {
        _root: tempfile::TempDir,
        out: PathBuf,
        vtm: PathBuf,
        cfg: PathBuf,
    }

    fn dirs(videos: &[&str]) -> Dirs {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        let vtm = root.path().join("vtm");
        let cfg = root.path().join("cfg");
        fs::create_dir_all(&vtm).unwrap();
        fs::create_dir_all(&cfg).unwrap();
        for v in videos {
            fs::write(cfg.join(v), "InputFile : x.yuv\n").unwrap();
        }
        Dirs {
            _root: root,
            out,
            vtm,
            cfg,
        }
    }

    #[test]
    fn test_defaults() {
        let sim = Simulation::default();
        assert_eq!(sim.version(), "Precise");
        assert_eq!(sim.qps(), &[22, 27, 32, 37]);
        assert_eq!(sim.encoder(), &["AI", "RA", "LB"]);
        assert_eq!(sim.n_frames(), 32);
        assert!(sim.bg_exec());
    }

    #[test]
    fn test_zero_frames_rejected() {
        assert!(matches!(
            Simulation::new(0, "v", vec![22], vec!["AI".to_string()]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_set_paths_scans_and_creates_out() {
        let d = dirs(&["BQMall.cfg", "BasketballPass.cfg", "notes.txt"]);
        let mut sim = Simulation::default();
        sim.set_paths(&d.out, &d.vtm, &d.cfg).unwrap();

        assert!(d.out.is_dir());
        assert_eq!(
            sim.videos(),
            &[PathBuf::from("BQMall.cfg"), PathBuf::from("BasketballPass.cfg")]
        );
    }

    #[test]
    fn test_set_cfg_dir_replaces_list() {
        let a = dirs(&["A.cfg", "B.cfg"]);
        let b = dirs(&["C.cfg"]);
        let mut sim = Simulation::default();
        sim.set_cfg_dir(&a.cfg).unwrap();
        sim.set_cfg_dir(&b.cfg).unwrap();
        assert_eq!(sim.videos(), &[PathBuf::from("C.cfg")]);
    }

    #[test]
    fn test_missing_dirs_rejected() {
        let d = dirs(&[]);
        let mut sim = Simulation::default();
        assert!(matches!(sim.set_cfg_dir(&d.cfg.join("nope")), Err(Error::Config(_))));
        assert!(matches!(sim.set_vtm_dir(&d.vtm.join("nope")), Err(Error::Config(_))));

        let file = d.vtm.join("file");
        fs::write(&file, "").unwrap();
        assert!(matches!(sim.set_out_dir(&file), Err(Error::Config(_))));
    }

    #[test]
    fn test_append_video_validation() {
        let d = dirs(&["A.cfg"]);
        fs::write(d.cfg.join("B.txt"), "").unwrap();
        let mut sim = Simulation::default();
        sim.set_cfg_dir(&d.cfg).unwrap();

        assert!(matches!(sim.append_video("B.txt"), Err(Error::Config(_))));
        assert!(matches!(sim.append_video("Missing.cfg"), Err(Error::Config(_))));

        // Absolute path outside the directory is accepted as-is
        let outside = d.vtm.join("Extra.cfg");
        fs::write(&outside, "").unwrap();
        sim.append_video(outside.clone()).unwrap();
        assert_eq!(sim.videos().len(), 2);
        assert_eq!(sim.videos()[1], outside);
    }

    #[test]
    fn test_remove_video() {
        let d = dirs(&["A.cfg", "B.cfg", "C.cfg"]);
        let mut sim = Simulation::default();
        sim.set_cfg_dir(&d.cfg).unwrap();

        assert_eq!(sim.remove_video(1).unwrap(), PathBuf::from("B.cfg"));
        assert!(matches!(sim.remove_video(5), Err(Error::Config(_))));
        assert_eq!(
            sim.remove_video_by_name(Path::new("C.cfg")).unwrap(),
            PathBuf::from("C.cfg")
        );
        assert!(matches!(
            sim.remove_video_by_name(Path::new("C.cfg")),
            Err(Error::Config(_))
        ));
        assert_eq!(sim.videos(), &[PathBuf::from("A.cfg")]);
    }

    #[test]
    fn test_jobs_cross_product_order() {
        let d = dirs(&["A.cfg", "B.cfg"]);
        let encoders = vec!["AI".to_string(), "RA".to_string()];
        let mut sim = Simulation::new(8, "Approx", vec![22, 37], encoders).unwrap();
        sim.set_paths(&d.out, &d.vtm, &d.cfg).unwrap();

        let jobs = sim.jobs().unwrap();
        assert_eq!(jobs.len(), sim.total_runs());
        assert_eq!(jobs.len(), 8);
        let order: Vec<(&str, &str, u32)> = jobs
            .iter()
            .map(|j| (j.video.as_str(), j.encoder_cfg.as_str(), j.qp))
            .collect();
        assert_eq!(order[..3], [("A", "AI", 22), ("A", "AI", 37), ("A", "RA", 22)]);
        assert_eq!(order[7], ("B", "RA", 37));
        assert_eq!(jobs[0].video_cfg, d.cfg.join("A.cfg"));
        assert_eq!(jobs[0].n_frames, 8);
        assert_eq!(jobs[0].log_path, d.out.join("Approx/A/AI/QP22.log"));
    }

    #[test]
    fn test_jobs_require_out_dir() {
        assert!(matches!(Simulation::default().jobs(), Err(Error::Config(_))));
    }

    #[test]
    fn test_info_display() {
        let d = dirs(&["A.cfg"]);
        let mut sim = Simulation::default();
        sim.set_paths(&d.out, &d.vtm, &d.cfg).unwrap();

        let info = sim.info();
        assert_eq!(info.total_runs, 12);
        let text = info.to_string();
        assert!(text.contains("Total execution 1 x 4 x 3 = 12 simulations"));
        assert!(text.contains(" 0. A.cfg"));
    }

    #[test]
    fn test_from_config() {
        let d = dirs(&["A.cfg"]);
        let config = SimulationConfig {
            cfg: d.cfg.clone(),
            vtm: d.vtm.clone(),
            out: d.out.clone(),
            version: Some("Approx".to_string()),
            qps: None,
            encoder: Some(vec!["RA".to_string()]),
            n_frames: Some(4),
            bg_exec: Some(false),
        };
        let sim = Simulation::from_config(&config).unwrap();
        assert_eq!(sim.version(), "Approx");
        assert_eq!(sim.qps(), &DEFAULT_QPS);
        assert_eq!(sim.encoder(), &["RA"]);
        assert_eq!(sim.n_frames(), 4);
        assert!(!sim.bg_exec());
        assert_eq!(sim.videos().len(), 1);
    }

    #[test]
    fn test_replace_source() {
        let d = dirs(&[]);
        let new_file = d.vtm.join("RdCost.new.cpp");
        let old_file = d.vtm.join("RdCost.cpp");
        fs::write(&new_file, "approx").unwrap();
        fs::write(&old_file, "precise").unwrap();

        replace_source(&new_file, &old_file).unwrap();
        assert_eq!(fs::read_to_string(&old_file).unwrap(), "approx");
        assert!(replace_source(&d.vtm.join("missing.cpp"), &old_file).is_err());
    }

    #[test]
    fn test_change_version_rebuilds_then_relabels() {
        let d = dirs(&[]);
        let old_file = d.vtm.join("RdCost.cpp");
        let new_file = d.vtm.join("RdCost.approx.cpp");
        fs::write(&old_file, "precise").unwrap();
        fs::write(&new_file, "approx").unwrap();

        let mut sim = Simulation::default();
        sim.set_vtm_dir(&d.vtm).unwrap();

        let mut built = None;
        sim.change_version("Approx", &old_file, &new_file, |vtm| {
            built = Some(vtm.to_path_buf());
            Ok(())
        })
        .unwrap();
        assert_eq!(built.as_deref(), Some(d.vtm.as_path()));
        assert_eq!(sim.version(), "Approx");
        assert_eq!(fs::read_to_string(&old_file).unwrap(), "approx");
    }

    #[test]
    fn test_failed_rebuild_keeps_version() {
        let d = dirs(&[]);
        let old_file = d.vtm.join("RdCost.cpp");
        let new_file = d.vtm.join("RdCost.approx.cpp");
        fs::write(&old_file, "precise").unwrap();
        fs::write(&new_file, "approx").unwrap();

        let mut sim = Simulation::default();
        sim.set_vtm_dir(&d.vtm).unwrap();

        // No build directory in the tree, so the default builder fails
        let err = sim
            .change_version("Approx", &old_file, &new_file, rebuild_vtm)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(sim.version(), DEFAULT_VERSION);

        let err = sim
            .change_version("Approx", &old_file, &d.vtm.join("missing.cpp"), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(sim.version(), DEFAULT_VERSION);
    }

    #[test]
    fn test_video_name_is_stem() {
        assert_eq!(video_name(Path::new("/x/BQMall.cfg")), "BQMall");
    }
}
