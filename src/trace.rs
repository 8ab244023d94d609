//! Span exporter that appends finished spans to a local file.

use std::fmt::Write as _;
use std::future::{ready, Future};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use opentelemetry_sdk::Resource;

use crate::config;
use crate::sink::FileSink;

/// A [`SpanExporter`] that appends one span per line to a file.
///
/// The destination path comes from [`config::ENV_SPAN_EXPORTER_FILE`], with
/// [`config::DEFAULT_SPAN_EXPORTER_FILE`] as the fallback, so independent
/// exporter kinds never collide on the same default file. Records are
/// rendered with their own `Debug` representation; this crate does not define
/// a schema of its own.
///
/// Writes go through a lock internal to the exporter, so the host may call
/// `export` from more than one worker without interleaving records. Export
/// failures are returned to the host, never raised, and leave the exporter
/// usable: the next export reopens the file if the handle went bad.
///
/// # Examples
///
/// ```no_run
/// use opentelemetry_file_contrib::FileSpanExporter;
/// use opentelemetry_sdk::trace::SdkTracerProvider;
///
/// let provider = SdkTracerProvider::builder()
///     .with_simple_exporter(FileSpanExporter::new())
///     .build();
/// ```
#[derive(Debug)]
pub struct FileSpanExporter {
    sink: FileSink,
    resource: Option<Resource>,
    resource_written: AtomicBool,
    is_shutdown: AtomicBool,
}

impl FileSpanExporter {
    /// Constructs an exporter writing to the path configured in the
    /// environment, or to `otel_traces.log` in the working directory.
    pub fn new() -> Self {
        Self::with_path(config::resolve_path(
            config::ENV_SPAN_EXPORTER_FILE,
            config::DEFAULT_SPAN_EXPORTER_FILE,
        ))
    }

    /// Constructs an exporter writing to `path`, ignoring the environment.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        FileSpanExporter {
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

    fn do_export(&self, batch: &[SpanData]) -> OTelSdkResult {
        if self.is_shutdown.load(Ordering::SeqCst) {
            tracing::debug!("span export refused; exporter is shut down");
            return Err(OTelSdkError::AlreadyShutdown);
        }

        let mut buf = String::new();
        let wrote_resource = self.write_resource_header(&mut buf);
        for span in batch {
            writeln!(buf, "{span:?}").expect("expected: write to String never fails");
        }

        self.sink.append(&buf).map_err(|error| {
            if wrote_resource {
                // The header never reached the file; emit it with the next batch.
                self.resource_written.store(false, Ordering::SeqCst);
            }
            OTelSdkError::InternalFailure(error.to_string())
        })
    }

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

impl Default for FileSpanExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanExporter for FileSpanExporter {
    fn export(&self, batch: Vec<SpanData>) -> impl Future<Output = OTelSdkResult> + Send {
        ready(self.do_export(&batch))
    }

    fn shutdown_with_timeout(&mut self, _timeout: Duration) -> OTelSdkResult {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.sink
            .close()
            .map_err(|error| OTelSdkError::InternalFailure(error.to_string()))
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        self.sink
            .flush()
            .map_err(|error| OTelSdkError::InternalFailure(error.to_string()))
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = Some(resource.clone());
    }
}
