/*!
 * Monitoring
 * Structured tracing for the supervisor
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, CommandSpan};
