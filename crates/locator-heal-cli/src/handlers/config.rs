//! `healer config`

use crate::commands::ConfigArgs;
use crate::config::CliConfig;
use crate::output::Printer;
use crate::CliResult;
use locator_heal::HealerConfig;

/// Print the effective configuration as YAML
pub fn execute(config: &CliConfig, printer: &Printer, args: &ConfigArgs) -> CliResult<()> {
    let (healer, source) = match &args.file {
        Some(file) => (HealerConfig::from_file(file)?, Some(file.clone())),
        None => (config.healer.clone(), config.config_file.clone()),
    };
    healer.validate()?;

    if args.check {
        printer.success("Configuration is valid")?;
        return Ok(());
    }

    match source {
        Some(path) => printer.heading(&format!("# loaded from {}", path.display()))?,
        None => printer.heading("# defaults with environment overrides")?,
    }
    printer.line(healer.to_yaml()?.trim_end())?;
    Ok(())
}
