//! The open hook: starts a segment for each request.
//!
//! Install it as the outermost layer, before any route, so that every
//! handler and the close hook run inside the segment.

use std::task::{Context, Poll};

use http::{Request, Response};
use tower::{Layer, Service};

use crate::config::SegmentConfig;
use crate::error::ConfigurationError;
use crate::propagator::{AmbientPropagator, ExplicitFieldPropagator, SegmentPropagator};
use crate::tracer::SegmentTracer;
use crate::BoxFuture;

/// Opens a segment named `default_name` for every request, propagated
/// automatically.
///
/// Fails if the name is blank.
pub fn open_segment(default_name: &str) -> Result<OpenSegmentLayer, ConfigurationError> {
    Ok(OpenSegmentLayer::new(SegmentConfig::new(default_name)?))
}

/// A Tower layer that opens a segment for each request.
#[derive(Debug, Clone)]
pub struct OpenSegmentLayer<P = AmbientPropagator> {
    tracer: SegmentTracer,
    propagator: P,
}

impl OpenSegmentLayer {
    pub fn new(config: SegmentConfig) -> Self {
        Self {
            tracer: SegmentTracer::new(config),
            propagator: AmbientPropagator,
        }
    }
}

impl<P> OpenSegmentLayer<P> {
    /// Switches to manual mode: the segment is attached to the request
    /// rather than made ambient.
    pub fn manual(self) -> OpenSegmentLayer<ExplicitFieldPropagator> {
        self.with_propagator(ExplicitFieldPropagator)
    }

    pub fn with_propagator<Q>(self, propagator: Q) -> OpenSegmentLayer<Q> {
        OpenSegmentLayer {
            tracer: self.tracer,
            propagator,
        }
    }

    pub fn tracer(&self) -> &SegmentTracer {
        &self.tracer
    }

    pub fn propagator(&self) -> &P {
        &self.propagator
    }
}

impl<S, P: Clone> Layer<S> for OpenSegmentLayer<P> {
    type Service = OpenSegment<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        OpenSegment {
            inner,
            tracer: self.tracer.clone(),
            propagator: self.propagator.clone(),
        }
    }
}

/// The service produced by [`OpenSegmentLayer`].
#[derive(Debug, Clone)]
pub struct OpenSegment<S, P = AmbientPropagator> {
    inner: S,
    tracer: SegmentTracer,
    propagator: P,
}

impl<S, P, ReqBody, ResBody> Service<Request<ReqBody>> for OpenSegment<S, P>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    P: SegmentPropagator,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let segment = self.tracer.trace_request(&request);
        self.propagator.attach(&segment, &mut request);
        tracing::trace!(
            segment = segment.name(),
            mode = ?self.propagator.mode(),
            "segment propagated",
        );

        // Call the instance that was driven to readiness, leaving the clone
        // behind for the next request.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let processed = self
            .propagator
            .run(segment.clone(), async move { inner.call(request).await });

        Box::pin(async move {
            let result = processed.await;
            match &result {
                Ok(response) => segment.close(response.status()),
                Err(_) => segment.close_with_failure(),
            }
            result
        })
    }
}
