//! Healer CLI: self-healing locators over saved pages
//!
//! ## Usage
//!
//! ```bash
//! healer paths page.html -n 20                       # Structural paths
//! healer snapshot page.html -o html_snapshots        # Annotated artifact
//! healer trim page.html -l id=submit                 # Oracle excerpt
//! healer resolve page.html -l id=submit --offline    # Heal one locator
//! healer validate page.html -l id=a -l name=b        # Heal a batch
//! healer config                                      # Effective configuration
//! ```

use clap::Parser;
use locator_heal::HealerConfig;
use locator_heal_cli::{
    handlers, logging, Cli, CliConfig, CliResult, ColorChoice, Commands, Printer, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    logging::init_logging(verbosity, cli.json_logs);

    let config = build_config(&cli)?;
    let printer = Printer::new(config.color.should_color(), verbosity.is_quiet());

    match &cli.command {
        Commands::Paths(args) => handlers::paths::execute(&printer, args),
        Commands::Snapshot(args) => handlers::snapshot::execute(&config, &printer, args),
        Commands::Trim(args) => handlers::trim::execute(&config, &printer, args),
        Commands::Resolve(args) => handlers::resolve::execute(&config, &printer, args),
        Commands::Validate(args) => handlers::validate::execute(&config, &printer, args),
        Commands::Config(args) => handlers::config::execute(&config, &printer, args),
    }
}

fn build_config(cli: &Cli) -> CliResult<CliConfig> {
    let healer = match &cli.config {
        Some(path) => HealerConfig::from_file(path)?,
        None => {
            let mut healer = HealerConfig::new();
            healer.apply_env();
            healer.validate()?;
            healer
        }
    };
    let color: ColorChoice = cli.color.into();

    Ok(CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
        .with_json_logs(cli.json_logs)
        .with_healer(healer, cli.config.clone()))
}
