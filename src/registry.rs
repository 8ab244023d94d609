//! Name-based lookup of the exporters and instrumentations this crate ships.
//!
//! Hosts that pick their telemetry components from configuration, for
//! example an `OTEL_TRACES_EXPORTER=file` style setting, can resolve the
//! configured name here and call the returned factory.

use std::collections::HashMap;

use once_cell::sync::Lazy;

#[cfg(feature = "logs")]
use crate::logs::FileLogExporter;
#[cfg(feature = "metrics")]
use crate::metrics::FileMetricExporter;
#[cfg(feature = "script")]
use crate::script::ScriptInstrumentor;
#[cfg(feature = "trace")]
use crate::trace::FileSpanExporter;

/// The name the file exporters are registered under, one per signal.
pub const FILE_EXPORTER: &str = "file";

#[cfg(feature = "trace")]
static SPAN_EXPORTERS: Lazy<HashMap<&'static str, fn() -> FileSpanExporter>> = Lazy::new(|| {
    let mut exporters = HashMap::new();
    exporters.insert(FILE_EXPORTER, FileSpanExporter::new as fn() -> FileSpanExporter);
    exporters
});

#[cfg(feature = "metrics")]
static METRIC_EXPORTERS: Lazy<HashMap<&'static str, fn() -> FileMetricExporter>> =
    Lazy::new(|| {
        let mut exporters = HashMap::new();
        exporters.insert(
            FILE_EXPORTER,
            FileMetricExporter::new as fn() -> FileMetricExporter,
        );
        exporters
    });

#[cfg(feature = "logs")]
static LOG_EXPORTERS: Lazy<HashMap<&'static str, fn() -> FileLogExporter>> = Lazy::new(|| {
    let mut exporters = HashMap::new();
    exporters.insert(FILE_EXPORTER, FileLogExporter::new as fn() -> FileLogExporter);
    exporters
});

#[cfg(feature = "script")]
static INSTRUMENTORS: Lazy<HashMap<&'static str, fn() -> ScriptInstrumentor>> = Lazy::new(|| {
    let mut instrumentors = HashMap::new();
    instrumentors.insert(
        ScriptInstrumentor::NAME,
        ScriptInstrumentor::new as fn() -> ScriptInstrumentor,
    );
    instrumentors
});

/// Resolves a span exporter factory by its registered name.
#[cfg(feature = "trace")]
pub fn span_exporter(name: &str) -> Option<fn() -> FileSpanExporter> {
    SPAN_EXPORTERS.get(name).copied()
}

/// Resolves a metric exporter factory by its registered name.
#[cfg(feature = "metrics")]
pub fn metric_exporter(name: &str) -> Option<fn() -> FileMetricExporter> {
    METRIC_EXPORTERS.get(name).copied()
}

/// Resolves a log exporter factory by its registered name.
#[cfg(feature = "logs")]
pub fn log_exporter(name: &str) -> Option<fn() -> FileLogExporter> {
    LOG_EXPORTERS.get(name).copied()
}

/// Resolves an instrumentor factory by its registered name.
#[cfg(feature = "script")]
pub fn instrumentor(name: &str) -> Option<fn() -> ScriptInstrumentor> {
    INSTRUMENTORS.get(name).copied()
}
