//! Structured logging, tracing context, and lightweight in-process metrics
//! shared across every component: env-filtered `tracing_subscriber` init,
//! `OperationContext` trace/span ids, and atomic operation counters.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNTER: AtomicU64 = AtomicU64::new(0);
static RETRIEVAL_COUNTER: AtomicU64 = AtomicU64::new(0);
static INDEX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize logging with the engine's default verbosity. Call once at
/// process startup.
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

/// Initialize logging with configurable verbosity. `quiet` forces
/// error-only output and takes precedence over `RUST_LOG`.
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("recall_engine=debug,info")
    } else {
        EnvFilter::new("recall_engine=warn,error")
    };

    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init() {
        Ok(()) => {
            if !quiet {
                info!("recall-engine observability initialized");
            }
            Ok(())
        }
        // Already initialized; fine in test binaries that call this repeatedly.
        Err(_) => Ok(()),
    }
}

/// A named operation for structured logging, covering every public
/// surface `crate::engine::Engine` exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    StoreMemory { project: String },
    Retrieve { project: String, k: usize },
    IndexFile { project: String, path: String },
    IndexDirectory { project: String, file_count: usize },
    DeleteProject { project: String },
    StructuralQuery { project: String, kind: &'static str },
}

/// Metric types recorded by [`record_metric`].
#[derive(Debug, Clone)]
pub enum MetricType {
    Counter { name: &'static str, value: u64 },
    Gauge { name: &'static str, value: f64 },
    Histogram { name: &'static str, value: f64, unit: &'static str },
    Timer { name: &'static str, duration: Duration },
}

/// Trace/span context threaded through a single logical operation,
/// including any sub-operations it spawns via [`OperationContext::child`].
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    pub operation: String,
    pub start_time: Instant,
    pub attributes: Vec<(String, String)>,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            operation: operation.into(),
            start_time: Instant::now(),
            attributes: Vec::new(),
        }
    }

    pub fn child(&self, operation: impl Into<String>) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            operation: operation.into(),
            start_time: Instant::now(),
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((key.into(), value.into()));
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Log an operation's outcome with its full trace context.
#[instrument(skip(ctx))]
pub fn log_operation(ctx: &OperationContext, op: &Operation, result: &Result<()>) {
    let elapsed = ctx.elapsed();
    let attrs = ctx.attributes.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(", ");

    match result {
        Ok(()) => {
            info!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                parent_span_id = ?ctx.parent_span_id,
                operation = %ctx.operation,
                elapsed_ms = elapsed.as_millis(),
                attributes = %attrs,
                "operation completed: {:?}", op
            );
            OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            error!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                parent_span_id = ?ctx.parent_span_id,
                operation = %ctx.operation,
                elapsed_ms = elapsed.as_millis(),
                attributes = %attrs,
                error = %e,
                "operation failed: {:?}", op
            );
            ERROR_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
    }

    match op {
        Operation::Retrieve { .. } => {
            RETRIEVAL_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Operation::IndexFile { .. } | Operation::IndexDirectory { .. } => {
            INDEX_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        _ => {}
    }
}

pub fn record_metric(metric: MetricType) {
    match metric {
        MetricType::Counter { name, value } => debug!("metric.counter {} = {}", name, value),
        MetricType::Gauge { name, value } => debug!("metric.gauge {} = {}", name, value),
        MetricType::Histogram { name, value, unit } => debug!("metric.histogram {} = {} {}", name, value, unit),
        MetricType::Timer { name, duration } => debug!("metric.timer {} = {:?}", name, duration),
    }
}

/// Runs `f`, logging start/completion with a fresh trace id.
pub async fn with_trace_id<F, T>(operation: &str, f: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let ctx = OperationContext::new(operation);
    info!(trace_id = %ctx.trace_id, span_id = %ctx.span_id, "starting operation: {}", operation);

    let start = Instant::now();
    let result = f.await;
    let elapsed = start.elapsed();

    match &result {
        Ok(_) => {
            info!(trace_id = %ctx.trace_id, span_id = %ctx.span_id, elapsed_ms = elapsed.as_millis(), "operation completed: {}", operation);
            record_metric(MetricType::Timer { name: "operation.duration", duration: elapsed });
        }
        Err(e) => {
            error!(trace_id = %ctx.trace_id, span_id = %ctx.span_id, elapsed_ms = elapsed.as_millis(), error = %e, "operation failed: {}", operation);
            record_metric(MetricType::Counter { name: "operation.errors", value: 1 });
        }
    }

    result
}

/// Snapshot of the global in-process counters.
pub fn get_metrics() -> serde_json::Value {
    serde_json::json!({
        "operations": {
            "total": OPERATION_COUNTER.load(Ordering::Relaxed),
            "errors": ERROR_COUNTER.load(Ordering::Relaxed),
            "retrievals": RETRIEVAL_COUNTER.load(Ordering::Relaxed),
            "index_ops": INDEX_COUNTER.load(Ordering::Relaxed),
        },
        "timestamp": Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_context_shares_trace_id_and_points_at_parent_span() {
        let ctx = OperationContext::new("index_file");
        let child = ctx.child("parse");
        assert_eq!(child.trace_id, ctx.trace_id);
        assert_eq!(child.parent_span_id, Some(ctx.span_id));
    }

    #[test]
    fn metrics_recording_does_not_panic() {
        record_metric(MetricType::Counter { name: "test.counter", value: 1 });
        record_metric(MetricType::Gauge { name: "test.gauge", value: std::f64::consts::PI });
        record_metric(MetricType::Timer { name: "test.timer", duration: Duration::from_millis(5) });
    }

    #[test]
    fn metrics_snapshot_has_expected_shape() {
        let snapshot = get_metrics();
        assert!(snapshot["operations"]["total"].is_u64());
        assert!(snapshot["timestamp"].is_string());
    }
}
