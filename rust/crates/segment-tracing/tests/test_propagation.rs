use http::{Request, Response};
use hyper::Body;
use opentelemetry::trace::{TraceContextExt, TracerProvider as _};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use tower::{service_fn, ServiceBuilder, ServiceExt};
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::layer::SubscriberExt;

use segment_tracing::http_client::{trace_headers, trace_headers_for_segment};
use segment_tracing::{context, open_segment, SegmentConfig, SegmentTracer};

const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

/// Installs a thread-local subscriber that gives spans real OpenTelemetry
/// contexts.
///
/// The tracer only holds a weak reference to its provider, so the provider
/// must outlive every span the test creates.
fn with_opentelemetry() -> (tracing::subscriber::DefaultGuard, TracerProvider) {
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
    let provider = TracerProvider::builder().build();
    let subscriber = tracing_subscriber::registry()
        .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("segment-tracing-tests")));
    (tracing::subscriber::set_default(subscriber), provider)
}

fn resumed_request() -> Request<Body> {
    Request::get("/")
        .header("traceparent", TRACEPARENT)
        .body(Body::empty())
        .unwrap()
}

#[test]
fn resumes_the_callers_trace() -> anyhow::Result<()> {
    let (_guard, _provider) = with_opentelemetry();
    let tracer = SegmentTracer::new(SegmentConfig::new("my-service")?);

    let segment = tracer.trace_request(&resumed_request());
    let context = segment.span().context();

    assert_eq!(context.span().span_context().trace_id().to_string(), TRACE_ID);
    Ok(())
}

#[test]
fn continues_the_trace_downstream() -> anyhow::Result<()> {
    let (_guard, _provider) = with_opentelemetry();
    let tracer = SegmentTracer::new(SegmentConfig::new("my-service")?);
    let segment = tracer.trace_request(&resumed_request());

    let headers = trace_headers_for_segment(&segment);
    let traceparent = headers["traceparent"].to_str()?;

    assert!(traceparent.contains(TRACE_ID), "traceparent: {traceparent}");
    assert_ne!(traceparent, TRACEPARENT, "the segment should be a new child span");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn handlers_can_continue_the_ambient_trace() -> anyhow::Result<()> {
    let (_guard, _provider) = with_opentelemetry();
    let service = ServiceBuilder::new()
        .layer(open_segment("my-service")?)
        .service(service_fn(|_: Request<Body>| async {
            let headers = trace_headers();
            let traceparent = headers
                .get("traceparent")
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_owned();
            Ok::<_, anyhow::Error>(Response::new(Body::from(traceparent)))
        }));

    let response = service.oneshot(resumed_request()).await?;
    let body = hyper::body::to_bytes(response.into_body()).await?;

    assert!(String::from_utf8(body.to_vec())?.contains(TRACE_ID));
    assert!(context::current().is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn names_spans_for_a_trace_layer() -> anyhow::Result<()> {
    let (_guard, _provider) = with_opentelemetry();
    let tracer = SegmentTracer::new(SegmentConfig::new("my-service")?);
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http().make_span_with(tracer))
        .service(service_fn(|_: Request<Body>| async {
            let trace_id = tracing::Span::current()
                .context()
                .span()
                .span_context()
                .trace_id()
                .to_string();
            Ok::<_, std::convert::Infallible>(Response::new(Body::from(trace_id)))
        }));

    let response = service.oneshot(resumed_request()).await?;
    let body = hyper::body::to_bytes(response.into_body()).await?;

    assert_eq!(body, TRACE_ID.as_bytes());
    Ok(())
}
