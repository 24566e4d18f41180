//! Semantic checks on a loaded configuration.

use crate::schema::AggregatorConfig;

/// Hard ceiling for any single download timeout.
const MAX_TIMEOUT_SECS: u64 = 300;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "media.browser_timeout_secs"
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate value ranges the schema types cannot express.
#[must_use]
pub fn validate(cfg: &AggregatorConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let media = &cfg.media;

    for (path, secs) in [
        ("media.sideload_timeout_secs", media.sideload_timeout_secs),
        ("media.browser_timeout_secs", media.browser_timeout_secs),
    ] {
        if secs == 0 {
            result.push(Severity::Error, path, "timeout must be at least one second");
        } else if secs > MAX_TIMEOUT_SECS {
            result.push(
                Severity::Warning,
                path,
                format!("timeout of {secs}s exceeds {MAX_TIMEOUT_SECS}s and will stall imports"),
            );
        }
    }

    if media.user_agent.trim().is_empty() {
        result.push(
            Severity::Warning,
            "media.user_agent",
            "empty user agent makes the browser fallback easy to block",
        );
    }

    if !media.serialize_dedup_keys {
        result.push(
            Severity::Info,
            "media.serialize_dedup_keys",
            "concurrent imports of the same image may create duplicate attachments",
        );
    }

    if let Some(dir) = &media.library_dir
        && dir.is_relative()
    {
        result.push(
            Severity::Info,
            "media.library_dir",
            format!("{} is relative to the working directory", dir.display()),
        );
    }

    result
}
