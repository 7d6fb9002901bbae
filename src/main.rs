mod cli;

use anyhow::{Context, Result};
use app_codesign::config::{BundleConfig, Settings};
use app_codesign::logging;
use app_codesign::process::SystemRunner;
use app_codesign::Codesigner;
use clap::Parser;
use log::error;

fn main() {
    let args = cli::Args::parse();
    logging::init(&args.log_level);

    if let Err(e) = real_main(args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn real_main(args: cli::Args) -> Result<()> {
    let runner = SystemRunner::new();

    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;

    let mut config = BundleConfig::new(&args.bundle, args.identity, &runner)
        .context("Failed to resolve signing identity")?
        .apply_settings(settings);
    config.local = args.local;
    config.verify = args.verify;

    Codesigner::new(config, &runner)
        .run()
        .with_context(|| format!("Failed to sign {}", args.bundle.display()))
}
