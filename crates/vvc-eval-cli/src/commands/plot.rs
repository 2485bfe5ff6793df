//! Chart command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use vvc_eval::BdRateSeries;

pub fn run(input: PathBuf, video: &str, output_dir: Option<PathBuf>) -> Result<()> {
    let series = BdRateSeries::load(&input)
        .with_context(|| format!("Failed to load series from {}", input.display()))?;
    log::debug!("loaded {} BD-rate values", series.len());

    match output_dir {
        Some(dir) => {
            let path = series
                .save_chart(video, &dir)
                .with_context(|| format!("Failed to plot {video}"))?;
            println!("Chart written to: {}", path.display());
        }
        None => {
            let svg = series
                .render_svg(video)
                .with_context(|| format!("Failed to plot {video}"))?;
            println!("{svg}");
        }
    }
    Ok(())
}
