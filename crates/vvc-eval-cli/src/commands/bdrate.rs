//! BD-rate command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use vvc_eval::sim::{DEFAULT_QPS, layout};
use vvc_eval::stats::bd_rate::DEFAULT_GROUP_SIZE;
use vvc_eval::stats::{
    BdRateJob, BdRateSeries, ComparatorConfig, CurveFit, Summary, TrailingGroup,
};
use vvc_eval::{RunTable, SeriesLabels};

#[derive(Args)]
pub struct BdrateArgs {
    /// Sweep output directory
    #[arg(long, required_unless_present = "cmp_csv")]
    out: Option<PathBuf>,

    /// Version under test
    #[arg(long)]
    cmp: String,

    /// Reference version
    #[arg(long = "ref", default_value = "Precise")]
    reference: String,

    /// Videos to compare (all videos of the compared version when omitted)
    #[arg(long)]
    video: Vec<String>,

    /// Encoder configurations to compare (all present when omitted)
    #[arg(long)]
    cfg: Vec<String>,

    /// Quality parameters whose logs are read, comma separated
    #[arg(long, value_delimiter = ',')]
    qps: Vec<u32>,

    /// Run table CSV of the version under test
    #[arg(long, requires_all = ["ref_csv", "video", "cfg"], conflicts_with = "out")]
    cmp_csv: Option<PathBuf>,

    /// Run table CSV of the reference version
    #[arg(long, requires = "cmp_csv")]
    ref_csv: Option<PathBuf>,

    /// Rows per frame group (defaults to the number of QPs)
    #[arg(long)]
    group_size: Option<usize>,

    /// Drop a trailing partial group instead of failing
    #[arg(long)]
    drop_partial: bool,

    /// Piecewise linear interpolation instead of PCHIP
    #[arg(long)]
    linear: bool,

    /// Output file (.json or .csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write one bar chart per video into this directory
    #[arg(long)]
    chart_dir: Option<PathBuf>,
}

pub fn run(args: BdrateArgs) -> Result<()> {
    let (jobs, group_size) = match (&args.cmp_csv, &args.ref_csv, &args.out) {
        (Some(cmp_csv), Some(ref_csv), _) => (
            csv_jobs(&args, cmp_csv, ref_csv)?,
            args.group_size.unwrap_or(DEFAULT_GROUP_SIZE),
        ),
        (None, _, Some(out)) => {
            let qps = sweep_qps(&args);
            let group_size = sweep_group_size(args.group_size, &qps)?;
            (sweep_jobs(&args, out, &qps)?, group_size)
        }
        _ => bail!("Either --out or --cmp-csv/--ref-csv is required"),
    };
    log::info!("comparing {} run pairs, groups of {}", jobs.len(), group_size);

    let mut config = ComparatorConfig::default().with_group_size(group_size);
    if args.drop_partial {
        config = config.with_trailing(TrailingGroup::Drop);
    }
    if args.linear {
        config = config.with_fit(CurveFit::Linear);
    }

    let series =
        BdRateSeries::compute_batch(&jobs, &config).context("BD-rate computation failed")?;

    print_series(&series);
    println!();
    print_summary(&series);

    if let Some(output) = &args.output {
        series
            .save(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!();
        println!("Series written to: {}", output.display());
    }

    if let Some(dir) = &args.chart_dir {
        for video in series.videos() {
            let path = series.save_chart(video, dir)?;
            println!("Chart written to: {}", path.display());
        }
    }

    Ok(())
}

fn csv_jobs(args: &BdrateArgs, cmp_csv: &Path, ref_csv: &Path) -> Result<Vec<BdRateJob>> {
    if args.video.len() != 1 || args.cfg.len() != 1 {
        bail!("CSV input needs exactly one --video and one --cfg");
    }

    let cmp = RunTable::from_csv(cmp_csv)
        .with_context(|| format!("Failed to import {}", cmp_csv.display()))?;
    let reference = RunTable::from_csv(ref_csv)
        .with_context(|| format!("Failed to import {}", ref_csv.display()))?;

    Ok(vec![BdRateJob {
        labels: SeriesLabels::new(args.cmp.as_str(), args.video[0].as_str(), args.cfg[0].as_str()),
        cmp,
        reference,
    }])
}

fn sweep_qps(args: &BdrateArgs) -> Vec<u32> {
    if args.qps.is_empty() {
        DEFAULT_QPS.to_vec()
    } else {
        args.qps.clone()
    }
}

/// Sweep logs hold one row per (frame, QP), so a group is one frame only
/// when its size equals the QP count.
fn sweep_group_size(requested: Option<usize>, qps: &[u32]) -> Result<usize> {
    let group_size = requested.unwrap_or(qps.len());
    if group_size != qps.len() {
        bail!(
            "--group-size {} does not match the {} QPs read per frame",
            group_size,
            qps.len()
        );
    }
    Ok(group_size)
}

fn sweep_jobs(args: &BdrateArgs, out: &Path, qps: &[u32]) -> Result<Vec<BdRateJob>> {
    let videos = if args.video.is_empty() {
        layout::videos(out, &args.cmp)
            .with_context(|| format!("No runs of version {} in {}", args.cmp, out.display()))?
    } else {
        args.video.clone()
    };

    let mut jobs = Vec::new();
    for video in &videos {
        let cfgs = if args.cfg.is_empty() {
            layout::configs(out, &args.cmp, video)?
        } else {
            args.cfg.clone()
        };

        for cfg in &cfgs {
            let cmp = layout::load_run_table(out, &args.cmp, video, cfg, qps)
                .with_context(|| format!("Failed to load {}/{}/{}", args.cmp, video, cfg))?;
            let reference = layout::load_run_table(out, &args.reference, video, cfg, qps)
                .with_context(|| format!("Failed to load {}/{}/{}", args.reference, video, cfg))?;
            jobs.push(BdRateJob {
                labels: SeriesLabels::new(args.cmp.as_str(), video.as_str(), cfg.as_str()),
                cmp,
                reference,
            });
        }
    }
    Ok(jobs)
}

fn print_series(series: &BdRateSeries) {
    println!(
        "{:<12} {:<20} {:<8} {:>6} {:>10}",
        "Version", "Video", "Config", "Frame", "BD-Rate"
    );
    println!("{:-<60}", "");
    for entry in series {
        println!(
            "{:<12} {:<20} {:<8} {:>6} {:>9.3}%",
            entry.version, entry.video, entry.cfg, entry.frame, entry.bd_rate
        );
    }
}

fn print_summary(series: &BdRateSeries) {
    println!("Summary by Config:");
    println!("{:-<60}", "");

    let mut by_cfg: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for entry in series {
        by_cfg.entry(entry.cfg.as_str()).or_default().push(entry.bd_rate);
    }

    println!(
        "{:<8} {:>6} {:>10} {:>10} {:>10} {:>10}",
        "Config", "Groups", "Mean", "Median", "Min", "Max"
    );
    for (cfg, values) in by_cfg {
        if let Some(s) = Summary::compute(&values) {
            println!(
                "{:<8} {:>6} {:>9.3}% {:>9.3}% {:>9.3}% {:>9.3}%",
                cfg, s.count, s.mean, s.median, s.min, s.max
            );
        }
    }
}
