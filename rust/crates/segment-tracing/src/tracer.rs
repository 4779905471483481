//! Opening a segment for an incoming request.

use std::sync::Arc;

use http::header::{self, AsHeaderName};
use http::{HeaderMap, Request};
use tower_http::trace::MakeSpan;
use tracing::{field, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::SegmentConfig;
use crate::segment::Segment;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Creates segments for requests, resuming the caller's trace when the
/// request carries one.
#[derive(Debug, Clone)]
pub struct SegmentTracer {
    config: Arc<SegmentConfig>,
}

impl SegmentTracer {
    pub fn new(config: SegmentConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Creates a new segment for the request.
    ///
    /// If trace parent headers are specified in the incoming request, they
    /// will be adopted and used as the segment's parent.
    pub fn trace_request<B>(&self, request: &Request<B>) -> Segment {
        use opentelemetry::trace::TraceContextExt;

        let headers = request.headers();
        let host = header_str(headers, header::HOST).or_else(|| request.uri().host());
        let name = self.config.resolve_name(host);

        let span = tracing::info_span!(
            "request",
            otel.name = %name,
            otel.kind = "server",
            otel.status_code = field::Empty,
            http.method = %request.method(),
            http.url = %request.uri(),
            http.version = ?request.version(),
            http.user_agent = header_str(headers, header::USER_AGENT),
            http.client_ip = client_ip(headers),
            http.status_code = field::Empty,
        );

        // Use the OpenTelemetry `set_parent` extension so this works with
        // whichever propagator is installed globally.
        let parent_context = opentelemetry::global::get_text_map_propagator(|propagator| {
            propagator.extract(&opentelemetry_http::HeaderExtractor(headers))
        });

        // A missing parent still extracts to a context, just an invalid one.
        if parent_context.span().span_context().is_valid() {
            span.set_parent(parent_context);
        }

        tracing::trace!(segment = %name, "segment opened");
        Segment::new(name, span)
    }
}

/// Lets the tracer name spans for a `tower_http` [`TraceLayer`].
///
/// [`TraceLayer`]: tower_http::trace::TraceLayer
impl<B> MakeSpan<B> for SegmentTracer {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        self.trace_request(request).span().clone()
    }
}

fn header_str(headers: &HeaderMap, name: impl AsHeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// The originating client, as reported by the first proxy.
fn client_ip(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, X_FORWARDED_FOR)
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}
