//! Metric exporter that appends collected metrics to a local file.

use std::fmt::Write as _;
use std::future::{ready, Future};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::Temporality;

use crate::config;
use crate::sink::FileSink;

/// A [`PushMetricExporter`] that appends one metrics snapshot per line to a
/// file.
///
/// Each push from the host's reader becomes a single line holding the whole
/// collection, rendered with the record type's own `Debug` representation.
/// The destination comes from [`config::ENV_METRIC_EXPORTER_FILE`], default
/// `otel_metrics.log`.
#[derive(Debug)]
pub struct FileMetricExporter {
    sink: FileSink,
    temporality: Temporality,
    is_shutdown: AtomicBool,
}

impl FileMetricExporter {
    /// Constructs an exporter writing to the path configured in the
    /// environment, or to `otel_metrics.log` in the working directory.
    pub fn new() -> Self {
        Self::with_path(config::resolve_path(
            config::ENV_METRIC_EXPORTER_FILE,
            config::DEFAULT_METRIC_EXPORTER_FILE,
        ))
    }

    /// Constructs an exporter writing to `path`, ignoring the environment.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        FileMetricExporter {
            sink: FileSink::new(path.into()),
            temporality: Temporality::Cumulative,
            is_shutdown: AtomicBool::new(false),
        }
    }

    /// Sets the aggregation temporality this exporter reports to the reader.
    ///
    /// Defaults to cumulative.
    pub fn with_temporality(mut self, temporality: Temporality) -> Self {
        self.temporality = temporality;
        self
    }

    /// The destination path this exporter appends to.
    pub fn path(&self) -> &Path {
        self.sink.path()
    }

    fn do_export(&self, metrics: &ResourceMetrics) -> OTelSdkResult {
        if self.is_shutdown.load(Ordering::SeqCst) {
            tracing::debug!("metric export refused; exporter is shut down");
            return Err(OTelSdkError::AlreadyShutdown);
        }
        let mut buf = String::new();
        writeln!(buf, "{metrics:?}").expect("expected: write to String never fails");
        self.sink
            .append(&buf)
            .map_err(|error| OTelSdkError::InternalFailure(error.to_string()))
    }
}

impl Default for FileMetricExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PushMetricExporter for FileMetricExporter {
    fn export(&self, metrics: &ResourceMetrics) -> impl Future<Output = OTelSdkResult> + Send {
        ready(self.do_export(metrics))
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.sink
            .flush()
            .map_err(|error| OTelSdkError::InternalFailure(error.to_string()))
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.sink
            .close()
            .map_err(|error| OTelSdkError::InternalFailure(error.to_string()))
    }

    fn temporality(&self) -> Temporality {
        self.temporality
    }
}
