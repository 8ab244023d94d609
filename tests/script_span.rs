#![cfg(feature = "script")]

use std::env;
use std::fs;
use std::io;
use std::panic;
use std::path::Path;

use opentelemetry::global;
use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
use opentelemetry_file_contrib::config;
use opentelemetry_file_contrib::{FileSpanExporter, InstrumentError, ScriptInstrumentor};
use opentelemetry_sdk::trace::SdkTracerProvider;
use serial_test::serial;

const TRACEPARENT: &str = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";

/// Installs a tracer provider exporting to `path` as the global one, so the
/// instrumentor picks it up the way an instrumented process would.
fn provider_writing_to(path: &Path) -> SdkTracerProvider {
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(FileSpanExporter::with_path(path))
        .build();
    global::set_tracer_provider(provider.clone());
    provider
}

fn clean_env() {
    env::remove_var("TRACEPARENT");
    env::remove_var("TRACESTATE");
    env::remove_var(config::ENV_DISABLED_INSTRUMENTATIONS);
}

#[test]
#[serial]
fn joins_the_trace_announced_in_the_environment() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);
    env::set_var("TRACEPARENT", TRACEPARENT);

    let instrumentor = ScriptInstrumentor::new();
    let span = instrumentor
        .instrument_command("/opt/jobs/nightly.py", vec!["--all".to_owned()])
        .unwrap();
    let span_id = span.span_context().span_id().to_string();
    span.end(0);
    provider.shutdown().unwrap();
    clean_env();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("0af7651916cd43dd8448eb211c80319c"));
    assert!(contents.contains("parent_span_id: b7ad6b7169203331"));
    assert!(contents.contains(&span_id));
}

#[test]
#[serial]
fn becomes_a_root_span_without_a_traceparent() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);

    let instrumentor = ScriptInstrumentor::new();
    let span = instrumentor
        .instrument_command("nightly.py", Vec::new())
        .unwrap();
    span.end(0);
    provider.shutdown().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("parent_span_id: 0000000000000000"));
}

#[test]
#[serial]
fn records_the_script_identity() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);

    let instrumentor = ScriptInstrumentor::new();
    let span = instrumentor
        .instrument_command(
            "/opt/jobs/nightly.py",
            vec!["--all".to_owned(), "--fast".to_owned()],
        )
        .unwrap();
    assert_eq!(span.name(), "nightly.py");
    span.end(0);
    provider.shutdown().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("script_file"));
    assert!(contents.contains("script_args"));
    assert!(contents.contains("--all"));
    assert!(contents.contains("--fast"));
    // Once as script_file, once leading the recorded argv.
    assert_eq!(contents.matches("/opt/jobs/nightly.py").count(), 2);
}

#[test]
#[serial]
fn exit_codes_map_to_span_status() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);

    ScriptInstrumentor::new()
        .instrument_command("ok.py", Vec::new())
        .unwrap()
        .end(0);
    ScriptInstrumentor::new()
        .instrument_command("bad.py", Vec::new())
        .unwrap()
        .end(7);
    provider.shutdown().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("status: Ok"));
    assert!(contents.contains("script exited with code 7"));
    assert!(contents.contains("script_exit_code"));
}

#[test]
#[serial]
fn exit_code_set_ahead_of_drop_is_reported() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);

    let mut span = ScriptInstrumentor::new()
        .instrument_command("flaky.py", Vec::new())
        .unwrap();
    span.set_exit_code(3);
    drop(span);
    provider.shutdown().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("script exited with code 3"));
}

#[test]
#[serial]
fn recorded_errors_fail_the_span() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);

    let mut span = ScriptInstrumentor::new()
        .instrument_command("copy.py", Vec::new())
        .unwrap();
    let error = io::Error::new(io::ErrorKind::Other, "disk full");
    span.record_error(&error);
    drop(span);
    provider.shutdown().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("disk full"));
    assert!(contents.contains("script exited with code 1"));
}

#[test]
#[serial]
fn panics_mark_the_span_and_keep_unwinding() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);

    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let _span = ScriptInstrumentor::new()
            .instrument_command("boom.py", Vec::new())
            .unwrap();
        panic!("boom");
    }));
    panic::set_hook(previous_hook);
    assert!(result.is_err());
    provider.shutdown().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains(r#"name: "panic""#));
    assert!(contents.contains("script panicked"));
}

#[test]
#[serial]
fn disabled_instrumentation_writes_nothing() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);
    env::set_var(config::ENV_DISABLED_INSTRUMENTATIONS, "script");

    let result = ScriptInstrumentor::new().instrument();
    assert_eq!(result.unwrap_err(), InstrumentError::Disabled);
    provider.shutdown().unwrap();
    clean_env();

    assert!(!path.exists());
}

#[test]
#[serial]
fn environment_is_written_back_and_restored() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);

    let span = ScriptInstrumentor::new()
        .instrument_command("child_spawner.py", Vec::new())
        .unwrap();
    let span_id = span.span_context().span_id().to_string();
    let traceparent = env::var("TRACEPARENT").unwrap();
    assert!(traceparent.contains(&span_id));

    span.end(0);
    assert!(env::var("TRACEPARENT").is_err());
    assert!(env::var("TRACESTATE").is_err());
    provider.shutdown().unwrap();
}

#[test]
#[serial]
fn in_process_spans_can_nest_under_the_script_span() {
    clean_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces.log");
    let provider = provider_writing_to(&path);

    let span = ScriptInstrumentor::new()
        .instrument_command("pipeline.py", Vec::new())
        .unwrap();
    let script_span_id = span.span_context().span_id().to_string();

    let tracer = provider.tracer("steps");
    let mut step = tracer
        .span_builder("load")
        .start_with_context(&tracer, &span.context());
    step.end();
    span.end(0);
    provider.shutdown().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let step_line = contents
        .lines()
        .find(|line| line.contains(r#"name: "load""#))
        .unwrap();
    assert!(step_line.contains(&format!("parent_span_id: {script_span_id}")));
}
