//! Invocation of the external VTM encoder.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the statically linked encoder binary under `<vtm>/bin`.
pub const VTM_ENCODER_BINARY: &str = "EncoderAppStatic";

/// Reconstruction target when reconstructed video is not kept.
pub const NULL_DEVICE: &str = if cfg!(windows) { "NUL" } else { "/dev/null" };

/// One encoder run of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeJob {
    /// Version label.
    pub version: String,
    /// Video identifier.
    pub video: String,
    /// Per-video configuration file.
    pub video_cfg: PathBuf,
    /// Encoder configuration name (AI, RA, LB, LP or a file name).
    pub encoder_cfg: String,
    /// Quality parameter.
    pub qp: u32,
    /// Frames to encode.
    pub n_frames: u32,
    /// Where the encoder's console output goes.
    pub log_path: PathBuf,
    /// Where the bitstream goes.
    pub bitstream_path: PathBuf,
}

impl EncodeJob {
    /// Short identifier for messages.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}/{}/QP{}", self.version, self.video, self.encoder_cfg, self.qp)
    }
}

/// Something that can carry out an [`EncodeJob`].
///
/// Implementations must write the job's log to `job.log_path`; the sweep
/// creates its parent directory beforehand.
pub trait Encoder: Sync {
    /// Run one job to completion.
    fn encode(&self, job: &EncodeJob) -> Result<()>;
}

/// Runs the VTM `EncoderAppStatic` binary.
#[derive(Debug, Clone)]
pub struct VtmEncoder {
    binary: PathBuf,
    cfg_dir: PathBuf,
    keep_recon: bool,
}

impl VtmEncoder {
    /// Encoder from a VTM tree: binary in `bin/`, encoder configs in `cfg/`.
    #[must_use]
    pub fn new(vtm_dir: &Path) -> Self {
        Self {
            binary: vtm_dir.join("bin").join(VTM_ENCODER_BINARY),
            cfg_dir: vtm_dir.join("cfg"),
            keep_recon: false,
        }
    }

    /// Write reconstructed video next to each bitstream as `QP<qp>.yuv`
    /// instead of discarding it.
    #[must_use]
    pub fn with_recon(mut self, keep: bool) -> Self {
        self.keep_recon = keep;
        self
    }

    /// Reconstruction output for a job.
    #[must_use]
    pub fn recon_path(&self, job: &EncodeJob) -> PathBuf {
        if self.keep_recon {
            job.bitstream_path.with_extension("yuv")
        } else {
            PathBuf::from(NULL_DEVICE)
        }
    }

    /// Use a different binary.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Path of the encoder configuration file for a configuration name.
    #[must_use]
    pub fn encoder_cfg_path(&self, name: &str) -> PathBuf {
        self.cfg_dir.join(encoder_cfg_file(name))
    }

    /// Build the command line for a job (without output redirection).
    #[must_use]
    pub fn command(&self, job: &EncodeJob) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-c")
            .arg(self.encoder_cfg_path(&job.encoder_cfg))
            .arg("-c")
            .arg(&job.video_cfg)
            .arg("-q")
            .arg(job.qp.to_string())
            .arg("-f")
            .arg(job.n_frames.to_string())
            .arg("-b")
            .arg(&job.bitstream_path)
            .arg("-o")
            .arg(self.recon_path(job));
        cmd
    }
}

impl Encoder for VtmEncoder {
    fn encode(&self, job: &EncodeJob) -> Result<()> {
        if !self.binary.is_file() {
            return Err(Error::Encoder {
                job: job.label(),
                message: format!("encoder binary not found: {}", self.binary.display()),
            });
        }

        let log_file = File::create(&job.log_path)?;
        let mut cmd = self.command(job);
        cmd.stdout(Stdio::from(log_file)).stderr(Stdio::piped());
        log::debug!("running {:?}", cmd);

        let output = cmd.output().map_err(|e| Error::Encoder {
            job: job.label(),
            message: format!("failed to start {}: {}", self.binary.display(), e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("{} failed: {}", job.label(), stderr.trim());
            return Err(Error::Encoder {
                job: job.label(),
                message: format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }
        Ok(())
    }
}

/// Encoder configuration file for a configuration name. Unknown names are
/// taken as file names.
#[must_use]
pub fn encoder_cfg_file(name: &str) -> String {
    match name {
        "AI" => "encoder_intra_vtm.cfg".to_string(),
        "RA" => "encoder_randomaccess_vtm.cfg".to_string(),
        "LB" => "encoder_lowdelay_vtm.cfg".to_string(),
        "LP" => "encoder_lowdelay_P_vtm.cfg".to_string(),
        other => other.to_string(),
    }
}

/// Rebuild the encoder with `make` in `<vtm>/build`. This is the default
/// builder for [`Simulation::change_version`](crate::sim::Simulation::change_version).
pub fn rebuild_vtm(vtm_dir: &Path) -> Result<()> {
    let build_dir = vtm_dir.join("build");
    if !build_dir.is_dir() {
        return Err(Error::Config(format!(
            "VTM build directory does not exist: {}",
            build_dir.display()
        )));
    }

    log::info!("rebuilding VTM in {}", build_dir.display());
    let output = Command::new("make")
        .arg("-j")
        .current_dir(&build_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| Error::Encoder {
            job: "build".to_string(),
            message: format!("failed to start make: {e}"),
        })?;

    if !output.status.success() {
        return Err(Error::Encoder {
            job: "build".to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    fs::metadata(vtm_dir.join("bin").join(VTM_ENCODER_BINARY)).map_err(|_| Error::Encoder {
        job: "build".to_string(),
        message: format!("build finished without producing {VTM_ENCODER_BINARY}"),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path) -> EncodeJob {
        EncodeJob {
            version: "Approx".to_string(),
            video: "BQMall".to_string(),
            video_cfg: dir.join("BQMall.cfg"),
            encoder_cfg: "RA".to_string(),
            qp: 27,
            n_frames: 16,
            log_path: dir.join("QP27.log"),
            bitstream_path: dir.join("QP27.bin"),
        }
    }

    #[test]
    fn test_encoder_cfg_mapping() {
        assert_eq!(encoder_cfg_file("AI"), "encoder_intra_vtm.cfg");
        assert_eq!(encoder_cfg_file("LB"), "encoder_lowdelay_vtm.cfg");
        assert_eq!(encoder_cfg_file("custom.cfg"), "custom.cfg");
    }

    #[test]
    fn test_command_arguments() {
        let vtm = Path::new("/opt/vtm");
        let encoder = VtmEncoder::new(vtm);
        let cmd = encoder.command(&job(Path::new("/tmp/run")));

        assert_eq!(cmd.get_program(), vtm.join("bin/EncoderAppStatic").as_os_str());
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-c",
                "/opt/vtm/cfg/encoder_randomaccess_vtm.cfg",
                "-c",
                "/tmp/run/BQMall.cfg",
                "-q",
                "27",
                "-f",
                "16",
                "-b",
                "/tmp/run/QP27.bin",
                "-o",
                NULL_DEVICE,
            ]
        );
    }

    #[test]
    fn test_recon_kept_next_to_bitstream() {
        let encoder = VtmEncoder::new(Path::new("/opt/vtm")).with_recon(true);
        let cmd = encoder.command(&job(Path::new("/tmp/run")));
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args[args.len() - 2], "-o");
        assert_eq!(args[args.len() - 1], "/tmp/run/QP27.yuv");
    }

    #[test]
    fn test_missing_binary_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = VtmEncoder::new(dir.path());
        let err = encoder.encode(&job(dir.path())).unwrap_err();
        assert!(matches!(err, Error::Encoder { .. }));
        assert!(err.to_string().contains("Approx/BQMall/RA/QP27"));
    }

    #[test]
    fn test_rebuild_requires_build_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(rebuild_vtm(dir.path()), Err(Error::Config(_))));
    }
}
