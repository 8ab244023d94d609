//! Environment-driven configuration.
//!
//! Every knob this crate reads from the process environment is named here,
//! together with its default. Values are resolved once, when an exporter is
//! constructed or an instrumentation activates, never on the export path.

use std::env;
use std::path::PathBuf;

/// Destination path for the span exporter.
pub const ENV_SPAN_EXPORTER_FILE: &str = "OTEL_FILE_SPAN_EXPORTER_NAME";

/// Destination path for the metric exporter.
pub const ENV_METRIC_EXPORTER_FILE: &str = "OTEL_FILE_METRIC_EXPORTER_NAME";

/// Destination path for the log exporter.
pub const ENV_LOG_EXPORTER_FILE: &str = "OTEL_FILE_LOG_EXPORTER_NAME";

/// Comma-separated instrumentation names to suppress, e.g. `script`.
pub const ENV_DISABLED_INSTRUMENTATIONS: &str = "OTEL_DISABLED_INSTRUMENTATIONS";

/// Default file name used when [`ENV_SPAN_EXPORTER_FILE`] is unset.
pub const DEFAULT_SPAN_EXPORTER_FILE: &str = "otel_traces.log";

/// Default file name used when [`ENV_METRIC_EXPORTER_FILE`] is unset.
pub const DEFAULT_METRIC_EXPORTER_FILE: &str = "otel_metrics.log";

/// Default file name used when [`ENV_LOG_EXPORTER_FILE`] is unset.
pub const DEFAULT_LOG_EXPORTER_FILE: &str = "otel_logs.log";

/// Resolves a destination path from the environment variable `var`, falling
/// back to `default`.
///
/// An unset, empty, or whitespace-only value counts as unset. Relative paths
/// are kept relative; they resolve against the working directory of whatever
/// process the host runs the exporter in.
pub fn resolve_path(var: &str, default: &str) -> PathBuf {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => PathBuf::from(default),
    }
}

/// Returns the instrumentation names listed in
/// [`ENV_DISABLED_INSTRUMENTATIONS`].
///
/// Names are trimmed and lower-cased; empty entries are dropped.
pub fn disabled_instrumentations() -> Vec<String> {
    match env::var(ENV_DISABLED_INSTRUMENTATIONS) {
        Ok(value) => value
            .split(',')
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Whether the instrumentation registered under `name` is suppressed by
/// configuration. Matching is case-insensitive.
pub fn instrumentation_disabled(name: &str) -> bool {
    let name = name.to_lowercase();
    disabled_instrumentations().iter().any(|entry| *entry == name)
}
