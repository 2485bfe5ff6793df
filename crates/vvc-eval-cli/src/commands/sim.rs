//! Encoder sweep command.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use vvc_eval::sim::{Simulation, VtmEncoder, rebuild_vtm};

#[derive(Args)]
pub struct SimArgs {
    /// Simulation configuration (.toml or .json)
    #[arg(short, long)]
    config: PathBuf,

    /// Version label (overrides the configuration)
    #[arg(long)]
    version: Option<String>,

    /// Quality parameters, comma separated
    #[arg(long, value_delimiter = ',')]
    qps: Vec<u32>,

    /// Encoder configurations (AI, RA, LB, LP), comma separated
    #[arg(long, value_delimiter = ',')]
    encoder: Vec<String>,

    /// Frames per run
    #[arg(long)]
    frames: Option<u32>,

    /// Run encoder jobs one after another
    #[arg(long)]
    foreground: bool,

    /// Only these video configuration files instead of the whole directory
    #[arg(long)]
    video: Vec<PathBuf>,

    /// Source file in the VTM tree to replace before the sweep
    #[arg(long, requires = "new_source")]
    old_source: Option<PathBuf>,

    /// Replacement source file; VTM is rebuilt afterwards
    #[arg(long, requires = "old_source")]
    new_source: Option<PathBuf>,

    /// Keep reconstructed video as QP<qp>.yuv next to each bitstream
    #[arg(long)]
    keep_recon: bool,

    /// Print the jobs without running the encoder
    #[arg(long)]
    dry_run: bool,
}

pub fn run(args: SimArgs) -> Result<()> {
    let mut sim = Simulation::from_config_file(&args.config)
        .with_context(|| format!("Failed to load simulation from {}", args.config.display()))?;

    if let Some(version) = &args.version {
        sim.set_version(version.clone());
    }
    if !args.qps.is_empty() {
        sim.set_qps(args.qps.clone());
    }
    if !args.encoder.is_empty() {
        sim.set_encoder(args.encoder.clone());
    }
    if let Some(frames) = args.frames {
        sim.set_n_frames(frames)?;
    }
    if args.foreground {
        sim.disable_bg_exec();
    }
    if !args.video.is_empty() {
        while !sim.videos().is_empty() {
            sim.remove_video(0)?;
        }
        for video in &args.video {
            sim.append_video(video.clone())?;
        }
    }

    if let (Some(old), Some(new)) = (&args.old_source, &args.new_source) {
        let version = sim.version().to_string();
        sim.change_version(version, old, new, rebuild_vtm)
            .context("Failed to switch encoder source")?;
    }

    println!("{}", sim.info());

    if sim.total_runs() == 0 {
        bail!("Nothing to run: no videos, QPs or encoder configurations");
    }

    if args.dry_run {
        for job in sim.jobs()? {
            println!("{}", job.label());
        }
        return Ok(());
    }

    let Some(vtm_dir) = sim.vtm_dir() else {
        bail!("VTM directory not set");
    };
    let encoder = VtmEncoder::new(vtm_dir).with_recon(args.keep_recon);
    let report = sim.run(&encoder).context("Sweep failed")?;

    let elapsed = report.finished_at - report.started_at;
    println!(
        "Finished {} runs of {} in {}s",
        report.jobs.len(),
        report.version,
        elapsed.num_seconds()
    );
    Ok(())
}
