use {
    aggregator_config::{AggregatorConfig, Severity, ValidationResult, validate},
    anyhow::Result,
    clap::Subcommand,
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the effective configuration and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration as JSON.
    Show,
}

pub fn handle_config(action: ConfigAction, config: &AggregatorConfig) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(config, verbose),
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
            Ok(())
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config: &AggregatorConfig, verbose: bool) -> Result<()> {
    let result = validate(config);
    for line in report(&result, verbose) {
        eprintln!("{line}");
    }

    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn report(result: &ValidationResult, verbose: bool) -> Vec<String> {
    let mut lines: Vec<String> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .map(|d| {
            let color = match d.severity {
                Severity::Error => RED,
                Severity::Warning => YELLOW,
                Severity::Info => CYAN,
            };
            format!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message)
        })
        .collect();

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if !lines.is_empty() {
        lines.push(String::new());
    }
    if errors == 0 && warnings == 0 {
        lines.push("No issues found.".to_string());
    } else {
        lines.push(format!("{errors} error(s), {warnings} warning(s)"));
    }
    lines
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_config_reports_no_issues() {
        let lines = report(&validate(&AggregatorConfig::default()), true);
        assert_eq!(lines, vec!["No issues found.".to_string()]);
    }

    #[test]
    fn info_diagnostics_are_hidden_unless_verbose() {
        let mut config = AggregatorConfig::default();
        config.media.serialize_dedup_keys = false;
        let result = validate(&config);

        assert_eq!(report(&result, false), vec!["No issues found.".to_string()]);

        let verbose = report(&result, true);
        assert_eq!(verbose.len(), 3);
        assert!(verbose[0].contains("media.serialize_dedup_keys"));
    }

    #[test]
    fn errors_are_counted() {
        let mut config = AggregatorConfig::default();
        config.media.sideload_timeout_secs = 0;
        let lines = report(&validate(&config), false);
        assert!(lines[0].contains("media.sideload_timeout_secs"));
        assert_eq!(lines.last().unwrap(), "1 error(s), 0 warning(s)");
    }
}
