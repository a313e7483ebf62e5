mod app;
mod audio;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use stimkit_core::Questionnaire;
use stimkit_experiment::SessionConfig;
use tracing_subscriber::EnvFilter;

use crate::app::{App, WindowOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Present a stimulus questionnaire and record reaction times", long_about = None)]
struct Cli {
    /// Questionnaire definition (JSON).
    questionnaire: PathBuf,

    /// Directory stimulus sources are resolved against. Defaults to the
    /// questionnaire's own directory.
    #[arg(short, long)]
    assets: Option<PathBuf>,

    /// Session settings (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the results. Printed to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run in a window instead of borderless fullscreen.
    #[arg(long)]
    windowed: bool,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Seed for the fixation jitter; overrides the config file.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let source = std::fs::read_to_string(&cli.questionnaire)
        .with_context(|| format!("reading {}", cli.questionnaire.display()))?;
    let questionnaire = Questionnaire::from_json(&source)
        .with_context(|| format!("parsing {}", cli.questionnaire.display()))?;

    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            SessionConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => SessionConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let assets = cli.assets.clone().unwrap_or_else(|| {
        cli.questionnaire
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    tracing::info!(
        questionnaire = %cli.questionnaire.display(),
        assets = %assets.display(),
        pages = questionnaire.pages.len(),
        "questionnaire loaded"
    );

    let options = WindowOptions {
        fullscreen: !cli.windowed,
        width: cli.width,
        height: cli.height,
    };
    App::new(questionnaire, config, assets, options, cli.output)?.run()
}

fn init_tracing() {
    // stdout carries the results
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
