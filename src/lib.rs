//! Telemetry exporters that append to local files, plus an instrumentation
//! that wraps a script's run in a single span.
//!
//! # Overview
//!
//! The exporters in this crate plug into the [`opentelemetry_sdk`] pipelines
//! and append one line per finished record to a file, so telemetry from
//! short-lived processes can be collected without standing up a backend.
//! Each signal writes to its own file, configured through the environment
//! variables documented in [`config`].
//!
//! The [`ScriptInstrumentor`] covers the other half of tracing short-lived
//! work: it opens a span named after the script the process was started
//! from, joins the trace announced in the `TRACEPARENT` environment
//! variable, and hands the new span down to child processes the same way.
//!
//! # Usage
//!
//! ```no_run
//! use opentelemetry::global;
//! use opentelemetry_file_contrib::{FileSpanExporter, ScriptInstrumentor};
//! use opentelemetry_sdk::trace::SdkTracerProvider;
//!
//! let provider = SdkTracerProvider::builder()
//!     .with_simple_exporter(FileSpanExporter::new())
//!     .build();
//! global::set_tracer_provider(provider.clone());
//!
//! let instrumentor = ScriptInstrumentor::new();
//! if let Ok(span) = instrumentor.instrument() {
//!     // ... run the script body ...
//!     span.end(0);
//! }
//!
//! provider.shutdown().expect("telemetry flushed");
//! ```
//!
//! # Feature Flags
//!
//! - `trace`: the [`FileSpanExporter`]. Enabled by default.
//! - `metrics`: the [`FileMetricExporter`]. Enabled by default.
//! - `logs`: the [`FileLogExporter`]. Enabled by default.
//! - `script`: the [`ScriptInstrumentor`], implies `trace`. Enabled by
//!   default.
//!
//! # Supported Rust Versions
//!
//! `opentelemetry-file-contrib` is built against the latest stable release.
//! The minimum supported version is 1.75. The current version is not
//! guaranteed to build on Rust versions earlier than the minimum supported
//! version.
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;

#[cfg(any(feature = "trace", feature = "metrics", feature = "logs"))]
mod sink;

#[cfg(any(feature = "trace", feature = "metrics", feature = "logs"))]
#[cfg_attr(
    docsrs,
    doc(cfg(any(feature = "trace", feature = "metrics", feature = "logs")))
)]
pub mod registry;

#[cfg(feature = "trace")]
mod trace;
#[cfg(feature = "trace")]
#[cfg_attr(docsrs, doc(cfg(feature = "trace")))]
pub use trace::*;

#[cfg(feature = "metrics")]
mod metrics;
#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub use metrics::*;

#[cfg(feature = "logs")]
mod logs;
#[cfg(feature = "logs")]
#[cfg_attr(docsrs, doc(cfg(feature = "logs")))]
pub use logs::*;

#[cfg(feature = "script")]
mod script;
#[cfg(feature = "script")]
#[cfg_attr(docsrs, doc(cfg(feature = "script")))]
pub use script::*;
