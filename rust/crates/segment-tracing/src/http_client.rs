//! Functions to assist in tracing when making a HTTP request.

use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::context;
use crate::segment::Segment;

/// Headers that continue the segment's trace in a downstream service.
pub fn trace_headers_for_segment(segment: &Segment) -> http::HeaderMap {
    let ctx = segment.span().context();

    let mut headers_map = http::HeaderMap::new();
    let mut header_injector = opentelemetry_http::HeaderInjector(&mut headers_map);
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&ctx, &mut header_injector);
    });
    headers_map
}

/// Headers that continue the ambient segment's trace, or none at all
/// outside a request.
pub fn trace_headers() -> http::HeaderMap {
    context::current()
        .map(|segment| trace_headers_for_segment(&segment))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_headers_outside_a_request() {
        assert!(trace_headers().is_empty());
    }
}
