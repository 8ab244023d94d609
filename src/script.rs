//! Span instrumentation for processes launched from a script.
//!
//! [`ScriptInstrumentor`] wraps the lifetime of the current process in a
//! single span named after the script that started it. The trace context is
//! read from the `TRACEPARENT` and `TRACESTATE` environment variables on the
//! way in, so spans join the trace of whoever launched the script, and the
//! opened span is written back to those variables so child processes keep
//! the chain going. When the returned [`ScriptSpan`] is dropped, the
//! variables are restored to what they held before instrumentation.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use opentelemetry::global;
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{
    Span, SpanContext, SpanKind, Status, TraceContextExt, Tracer, TracerProvider,
};
use opentelemetry::{Array, Context, InstrumentationScope, KeyValue, StringValue, Value};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use thiserror::Error;

use crate::config;

const ATTR_SCRIPT_FILE: &str = "script_file";
const ATTR_SCRIPT_ARGS: &str = "script_args";
const ATTR_SCRIPT_EXIT_CODE: &str = "script_exit_code";

/// A named instrumentation that can be switched off through
/// [`config::ENV_DISABLED_INSTRUMENTATIONS`].
pub trait Instrumentor {
    /// The name the instrumentation is disabled by.
    fn name(&self) -> &'static str;

    /// Whether the environment allows this instrumentation to run.
    fn is_enabled(&self) -> bool {
        !config::instrumentation_disabled(self.name())
    }
}

/// The ways instrumenting the current process can be declined.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstrumentError {
    /// The instrumentation was listed in
    /// [`config::ENV_DISABLED_INSTRUMENTATIONS`].
    #[error("script instrumentation is disabled by the environment")]
    Disabled,
    /// [`ScriptInstrumentor::instrument`] already produced a span for this
    /// process.
    #[error("the process is already instrumented")]
    AlreadyInstrumented,
    /// The command line does not name a script file.
    #[error("the process was not started from a script file")]
    NotAScript,
}

/// Instruments the current process with a span covering its whole run.
///
/// # Examples
///
/// ```no_run
/// use opentelemetry_file_contrib::ScriptInstrumentor;
///
/// let instrumentor = ScriptInstrumentor::new();
/// let mut span = match instrumentor.instrument() {
///     Ok(span) => span,
///     Err(_) => return,
/// };
/// // ... run the script body ...
/// span.end(0);
/// ```
#[derive(Debug, Default)]
pub struct ScriptInstrumentor {
    instrumented: AtomicBool,
}

impl ScriptInstrumentor {
    /// The name this instrumentation is registered and disabled by.
    pub const NAME: &'static str = "script";

    /// Constructs an instrumentor that has not yet produced a span.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a span for the current process, using its own command line.
    ///
    /// The script path is taken from the first command line argument and the
    /// full command line is recorded on the span. Fails when the
    /// instrumentation is disabled, when the process was not started from a
    /// script file (an empty path, or an inline `-c` program), or when this
    /// instrumentor already produced a span.
    pub fn instrument(&self) -> Result<ScriptSpan, InstrumentError> {
        let mut args = env::args_os().map(|arg| arg.to_string_lossy().into_owned());
        let script = args.next().unwrap_or_default();
        self.instrument_command(script, args)
    }

    /// Opens a span for an explicit script invocation.
    ///
    /// Hosts that parse their command line themselves can hand the script
    /// path and arguments over directly; the checks and the produced span
    /// match [`instrument`](Self::instrument).
    pub fn instrument_command(
        &self,
        script: impl Into<String>,
        args: impl IntoIterator<Item = String>,
    ) -> Result<ScriptSpan, InstrumentError> {
        if !self.is_enabled() {
            tracing::debug!("script instrumentation disabled; leaving the process alone");
            return Err(InstrumentError::Disabled);
        }
        let script = script.into();
        if script.is_empty() || script == "-c" {
            tracing::debug!("process was not started from a script file; nothing to do");
            return Err(InstrumentError::NotAScript);
        }
        if self.instrumented.swap(true, Ordering::SeqCst) {
            tracing::warn!("script instrumentation requested twice; keeping the first span");
            return Err(InstrumentError::AlreadyInstrumented);
        }
        Ok(ScriptSpan::open(script, args.into_iter().collect()))
    }
}

impl Instrumentor for ScriptInstrumentor {
    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// A live span covering the current script run.
///
/// Dropping the value ends the span. Ending it through [`end`](Self::end)
/// or [`set_exit_code`](Self::set_exit_code) records the script's exit code
/// and derives the span status from it: zero maps to ok, anything else to an
/// error. If the thread unwinds while the span is alive, the drop records a
/// `panic` event and marks the span as failed.
#[must_use = "dropping the span immediately ends it"]
pub struct ScriptSpan {
    span: global::BoxedSpan,
    carrier: EnvCarrier,
    name: String,
    exit_code: i32,
    closed: bool,
}

impl ScriptSpan {
    fn open(script: String, args: Vec<String>) -> Self {
        let mut carrier = EnvCarrier::from_env();
        let propagator = TraceContextPropagator::new();
        let parent_cx = propagator.extract(&carrier);

        let scope = InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        let tracer = global::tracer_provider().tracer_with_scope(scope);

        let name = span_name(&script);
        // The recorded argv includes the script itself, as the process saw it.
        let arguments = Value::Array(Array::String(
            std::iter::once(script.clone())
                .chain(args)
                .map(StringValue::from)
                .collect(),
        ));
        let span = tracer
            .span_builder(name.clone())
            .with_kind(SpanKind::Internal)
            .with_attributes([
                KeyValue::new(ATTR_SCRIPT_FILE, script),
                KeyValue::new(ATTR_SCRIPT_ARGS, arguments),
            ])
            .start_with_context(&tracer, &parent_cx);

        // Hand the new context to child processes through the environment.
        let span_cx = Context::new().with_remote_span_context(span.span_context().clone());
        propagator.inject_context(&span_cx, &mut carrier);

        ScriptSpan {
            span,
            carrier,
            name,
            exit_code: 0,
            closed: false,
        }
    }

    /// The span name, the file name portion of the script path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The context of the span, as written back to the environment.
    pub fn span_context(&self) -> &SpanContext {
        self.span.span_context()
    }

    /// A [`Context`] carrying this span, for parenting in-process work.
    ///
    /// Spans started with this context as their parent nest under the
    /// script span, the same way child processes do when they pick up
    /// `TRACEPARENT` from the environment.
    pub fn context(&self) -> Context {
        Context::new().with_remote_span_context(self.span.span_context().clone())
    }

    /// The exit code the span will report when it ends.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Sets the exit code the span reports when it ends.
    pub fn set_exit_code(&mut self, exit_code: i32) {
        self.exit_code = exit_code;
    }

    /// Records an error the script hit without ending the span.
    ///
    /// The exit code is bumped to 1 when it still reports success, so a
    /// recorded error is never paired with an ok status.
    pub fn record_error(&mut self, error: &dyn std::error::Error) {
        self.span.record_error(error);
        self.exit_code = self.exit_code.max(1);
    }

    /// Ends the span with the given exit code and restores the environment.
    pub fn end(mut self, exit_code: i32) {
        self.exit_code = exit_code;
        self.close(false);
    }

    fn close(&mut self, panicked: bool) {
        if self.closed {
            return;
        }
        self.closed = true;
        if panicked {
            self.span.add_event("panic", Vec::new());
            self.exit_code = self.exit_code.max(1);
        }
        self.span
            .set_attribute(KeyValue::new(ATTR_SCRIPT_EXIT_CODE, i64::from(self.exit_code)));
        let status = if panicked {
            Status::Error {
                description: "script panicked".into(),
            }
        } else if self.exit_code == 0 {
            Status::Ok
        } else {
            Status::Error {
                description: format!("script exited with code {}", self.exit_code).into(),
            }
        };
        self.span.set_status(status);
        self.carrier.undo();
        self.span.end();
    }
}

impl Drop for ScriptSpan {
    fn drop(&mut self) {
        self.close(thread::panicking());
    }
}

impl fmt::Debug for ScriptSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptSpan")
            .field("name", &self.name)
            .field("trace_id", &self.span.span_context().trace_id())
            .field("exit_code", &self.exit_code)
            .field("closed", &self.closed)
            .finish()
    }
}

fn span_name(script: &str) -> String {
    Path::new(script)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.to_owned())
}

/// Propagation carrier over the process environment.
///
/// Keys are matched case insensitively, as propagation header names are
/// lowercase while environment variables are conventionally uppercase.
/// Writes remember the value each variable held before the first overwrite
/// so [`undo`](Self::undo) can put the environment back.
#[derive(Debug)]
pub(crate) struct EnvCarrier {
    values: HashMap<String, String>,
    undo: Vec<(String, Option<String>)>,
}

impl EnvCarrier {
    pub(crate) fn from_env() -> Self {
        let values = env::vars_os()
            .filter_map(|(key, value)| {
                let key = key.to_str()?.to_lowercase();
                let value = value.to_str()?.to_owned();
                Some((key, value))
            })
            .collect();
        EnvCarrier {
            values,
            undo: Vec::new(),
        }
    }

    pub(crate) fn undo(&mut self) {
        while let Some((variable, previous)) = self.undo.pop() {
            match previous {
                Some(value) => env::set_var(&variable, value),
                None => env::remove_var(&variable),
            }
        }
    }
}

impl Extractor for EnvCarrier {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }
}

impl Injector for EnvCarrier {
    fn set(&mut self, key: &str, value: String) {
        let variable = key.to_uppercase();
        if !self.undo.iter().any(|(recorded, _)| *recorded == variable) {
            self.undo.push((variable.clone(), env::var(&variable).ok()));
        }
        env::set_var(&variable, &value);
        self.values.insert(key.to_lowercase(), value);
    }
}
