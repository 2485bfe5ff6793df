//! vvc-eval CLI - VTM encoder sweeps and BD-rate comparison

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

mod commands;

/// VTM encoder sweep and BD-rate comparison tool.
#[derive(Parser)]
#[command(name = "vvc-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sweep a configuration file describes
    Info {
        /// Simulation configuration (.toml or .json)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run an encoder sweep
    Sim(commands::sim::SimArgs),

    /// Compute BD-rate between two encoder versions
    Bdrate(commands::bdrate::BdrateArgs),

    /// Plot a BD-rate series as a grouped bar chart
    Plot {
        /// BD-rate series (.json or .csv)
        #[arg(short, long)]
        input: PathBuf,

        /// Video to plot
        #[arg(long)]
        video: String,

        /// Directory for bdr_<video>.svg (SVG goes to stdout when omitted)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                buf.timestamp(),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { config } => commands::info::run(config),
        Commands::Sim(args) => commands::sim::run(args),
        Commands::Bdrate(args) => commands::bdrate::run(args),
        Commands::Plot { input, video, output_dir } => {
            commands::plot::run(input, &video, output_dir)
        }
    }
}
