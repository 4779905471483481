//! Sets up tracing globally.
//!
//! Segments are plain `tracing` spans; this installs the subscriber that
//! logs them and exports them through OpenTelemetry.

use std::error::Error;

use opentelemetry::propagation::composite::TextMapCompositePropagator;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions as semcov;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::SegmentConfig;

const DEFAULT_LEVEL: tracing::level_filters::LevelFilter =
    tracing::level_filters::LevelFilter::INFO;

/// Keeps the global tracing provider alive. It is shut down, flushing any
/// pending segments, on drop.
pub struct GlobalTracing;

/// Installs a global subscriber which logs as JSON and exports segments over
/// OTLP, with the segment default name as the service name.
///
/// Beyond `endpoint`, configuration is done by standard environment
/// variables:
///
///   * https://opentelemetry.io/docs/specs/otel/configuration/sdk-environment-variables/
///   * https://opentelemetry.io/docs/languages/sdk-configuration/otlp-exporter/
///
/// `RUST_LOG` sets the log filter, defaulting to `info`.
pub fn init_tracing(
    config: &SegmentConfig,
    service_version: &'static str,
    endpoint: Option<&str>,
) -> Result<GlobalTracing, Box<dyn Error + Send + Sync>> {
    // Resumed segments can arrive with W3C or B3 headers.
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(opentelemetry_zipkin::Propagator::new()),
    ]));

    let mut exporter = opentelemetry_otlp::new_exporter().tonic();
    if let Some(endpoint) = endpoint {
        exporter = exporter.with_endpoint(endpoint);
    }

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::config().with_resource(resource(config, service_version)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    tracing_subscriber::registry()
        .with(
            tracing_opentelemetry::layer()
                .with_error_records_to_exceptions(true)
                .with_tracer(tracer),
        )
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(DEFAULT_LEVEL.into())
                .from_env_lossy(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_timer(tracing_subscriber::fmt::time::time()),
        )
        .try_init()?;

    Ok(GlobalTracing)
}

fn resource(config: &SegmentConfig, service_version: &'static str) -> Resource {
    Resource::new(vec![
        KeyValue::new(
            semcov::resource::SERVICE_NAME,
            config.default_name().to_string(),
        ),
        KeyValue::new(semcov::resource::SERVICE_VERSION, service_version),
    ])
}

impl Drop for GlobalTracing {
    fn drop(&mut self) {
        global::shutdown_tracer_provider();
    }
}
