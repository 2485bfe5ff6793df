use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sim::encoder::{EncodeJob, Encoder};
use crate::sim::{Simulation, layout};

/// Outcome of one encoder run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Video identifier.
    pub video: String,
    /// Encoder configuration name.
    pub encoder_cfg: String,
    /// Quality parameter.
    pub qp: u32,
    /// Encoder log.
    pub log_path: PathBuf,
    /// When the job started.
    pub started_at: DateTime<Utc>,
    /// Wall time in milliseconds.
    pub elapsed_ms: u64,
}

/// Record of a whole sweep, written to `<out>/<version>/sweep.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Version label.
    pub version: String,
    /// Frames per run.
    pub n_frames: u32,
    /// Whether jobs ran concurrently.
    pub background: bool,
    /// Sweep start.
    pub started_at: DateTime<Utc>,
    /// Sweep end.
    pub finished_at: DateTime<Utc>,
    /// Per-job results, in sweep order.
    pub jobs: Vec<JobReport>,
}

impl Simulation {
    /// Run every job of the sweep.
    ///
    /// With background execution enabled the jobs run concurrently on the
    /// rayon pool and all of them are awaited before returning. The first
    /// failure is returned; no job is retried. A hung encoder blocks the
    /// sweep, as there is no timeout.
    pub fn run<E: Encoder + ?Sized>(&self, encoder: &E) -> Result<SweepReport> {
        let jobs = self.jobs()?;
        log::info!(
            "sweep {}: {} runs ({} videos x {} configs x {} QPs), {}",
            self.version(),
            jobs.len(),
            self.videos().len(),
            self.encoder().len(),
            self.qps().len(),
            if self.bg_exec() { "background" } else { "sequential" }
        );

        for job in &jobs {
            if let Some(parent) = job.log_path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let started_at = Utc::now();
        let reports = if self.bg_exec() {
            jobs.par_iter()
                .map(|job| run_job(encoder, job))
                .collect::<Result<Vec<_>>>()?
        } else {
            jobs.iter()
                .map(|job| run_job(encoder, job))
                .collect::<Result<Vec<_>>>()?
        };

        let report = SweepReport {
            version: self.version().to_string(),
            n_frames: self.n_frames(),
            background: self.bg_exec(),
            started_at,
            finished_at: Utc::now(),
            jobs: reports,
        };

        if let Some(out) = self.out_dir() {
            let path = layout::report_path(out, self.version());
            fs::write(&path, serde_json::to_string_pretty(&report)?)?;
            log::info!("sweep report written to {}", path.display());
        }

        Ok(report)
    }
}

fn run_job<E: Encoder + ?Sized>(encoder: &E, job: &EncodeJob) -> Result<JobReport> {
    let started_at = Utc::now();
    let start = Instant::now();
    log::debug!("encoding {}", job.label());

    encoder.encode(job)?;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    log::info!("{} done in {} ms", job.label(), elapsed_ms);
    Ok(JobReport {
        video: job.video.clone(),
        encoder_cfg: job.encoder_cfg.clone(),
        qp: job.qp,
        log_path: job.log_path.clone(),
        started_at,
        elapsed_ms,
    })
}
