/*!
 * Structured Tracing
 * Subscriber setup and per-command spans for the control plane
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Commands slower than this are reported at warn level
const SLOW_COMMAND_MS: u128 = 1000;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SUPERVISOR_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("SUPERVISOR_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    // Traces go to stderr; stdout carries console responses
    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .init();
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .init();
        info!("Structured tracing initialized");
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one control-plane command, timed on drop
pub struct CommandSpan {
    span: tracing::Span,
    start: Instant,
    trace_id: String,
}

impl CommandSpan {
    pub fn new(command: &str) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::INFO,
            "command",
            trace_id = %trace_id,
            command = command,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn record_result(&self, success: bool) {
        self.span.record("result", if success { "ok" } else { "error" });
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
        self.span.record("result", "error");
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for CommandSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();

        if duration.as_millis() > SLOW_COMMAND_MS {
            warn!(
                trace_id = %self.trace_id,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow command"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                duration_us = duration.as_micros() as u64,
                "command completed"
            );
        }
    }
}
