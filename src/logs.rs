//! Log exporter that appends emitted log records to a local file.

use std::fmt::Write as _;
use std::future::{ready, Future};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::logs::{LogBatch, LogExporter};
use opentelemetry_sdk::Resource;

use crate::config;
use crate::sink::FileSink;

/// A [`LogExporter`] that appends one line per log record to a file.
///
/// Records are rendered with their `Debug` representation, so a batch of
/// `n` records always appends exactly `n` lines. The first successful
/// export is preceded by a single line describing the resource the host
/// provider attached. The destination comes from
/// [`config::ENV_LOG_EXPORTER_FILE`], default `otel_logs.log`.
///
/// # Examples
///
/// ```no_run
/// use opentelemetry_file_contrib::FileLogExporter;
/// use opentelemetry_sdk::logs::SdkLoggerProvider;
///
/// let provider = SdkLoggerProvider::builder()
///     .with_simple_exporter(FileLogExporter::new())
///     .build();
/// ```
#[derive(Debug)]
pub struct FileLogExporter {
    sink: FileSink,
    resource: Option<Resource>,
    resource_written: AtomicBool,
    is_shutdown: AtomicBool,
}

impl FileLogExporter {
    /// Constructs an exporter writing to the path configured in the
    /// environment, or to `otel_logs.log` in the working directory.
    pub fn new() -> Self {
        Self::with_path(config::resolve_path(
            config::ENV_LOG_EXPORTER_FILE,
            config::DEFAULT_LOG_EXPORTER_FILE,
        ))
    }

    /// Constructs an exporter writing to `path`, ignoring the environment.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        FileLogExporter {
            sink: FileSink::new(path.into()),
            resource: None,
            resource_written: AtomicBool::new(false),
            is_shutdown: AtomicBool::new(false),
        }
    }

    /// The destination path this exporter appends to.
    pub fn path(&self) -> &Path {
        self.sink.path()
    }

    /// Flushes the underlying file handle, if one is open.
    pub fn force_flush(&self) -> OTelSdkResult {
        self.sink
            .flush()
            .map_err(|error| OTelSdkError::InternalFailure(error.to_string()))
    }

    fn do_export(&self, batch: &LogBatch<'_>) -> OTelSdkResult {
        if self.is_shutdown.load(Ordering::SeqCst) {
            tracing::debug!("log export refused; exporter is shut down");
            return Err(OTelSdkError::AlreadyShutdown);
        }
        let mut buf = String::new();
        let wrote_resource = self.write_resource_header(&mut buf);
        for (record, _scope) in batch.iter() {
            writeln!(buf, "{record:?}").expect("expected: write to String never fails");
        }
        self.sink.append(&buf).map_err(|error| {
            if wrote_resource {
                self.resource_written.store(false, Ordering::SeqCst);
            }
            OTelSdkError::InternalFailure(error.to_string())
        })
    }

    /// Renders the resource line into `buf` the first time it is called.
    /// Returns whether this call claimed the header so a failed append can
    /// give it back.
    fn write_resource_header(&self, buf: &mut String) -> bool {
        let Some(resource) = self.resource.as_ref() else {
            return false;
        };
        if self.resource_written.swap(true, Ordering::SeqCst) {
            return false;
        }
        writeln!(buf, "{resource:?}").expect("expected: write to String never fails");
        true
    }
}

impl Default for FileLogExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogExporter for FileLogExporter {
    fn export(&self, batch: LogBatch<'_>) -> impl Future<Output = OTelSdkResult> + Send {
        ready(self.do_export(&batch))
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.sink
            .close()
            .map_err(|error| OTelSdkError::InternalFailure(error.to_string()))
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = Some(resource.clone());
    }
}
