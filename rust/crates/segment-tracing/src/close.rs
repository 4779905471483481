//! The close hook: records request faults on the segment.
//!
//! Install it as the innermost layer, wrapping the routes. It never handles
//! a fault itself. Errors are returned exactly as they were received, and
//! a [`RequestFault`] stays on its response.

use std::fmt;
use std::task::{Context, Poll};

use http::{Request, Response};
use tower::{Layer, Service};

use crate::context;
use crate::error::RequestFault;
use crate::propagator::RequestSegmentExt;
use crate::segment::Segment;
use crate::BoxFuture;

/// Records `error` on the request's segment, if both exist.
///
/// The segment attached to the request (manual mode) takes precedence over
/// the ambient one. Returns whether anything was recorded.
pub fn record_fault<E>(explicit: Option<&Segment>, error: Option<&E>) -> bool
where
    E: fmt::Display + fmt::Debug + ?Sized,
{
    match (context::resolve(explicit), error) {
        (Some(segment), Some(error)) => {
            segment.add_error(error);
            tracing::debug!(segment = segment.name(), "added server fault to segment");
            true
        }
        _ => false,
    }
}

/// Records faults from the routes it wraps.
pub fn close_segment() -> CloseSegmentLayer {
    CloseSegmentLayer
}

/// A Tower layer that records faults on the request's segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseSegmentLayer;

impl<S> Layer<S> for CloseSegmentLayer {
    type Service = CloseSegment<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CloseSegment { inner }
    }
}

/// The service produced by [`CloseSegmentLayer`].
#[derive(Debug, Clone)]
pub struct CloseSegment<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CloseSegment<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: fmt::Display + fmt::Debug + 'static,
    ResBody: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The request is gone once the inner service has it.
        let explicit = request.segment().cloned();
        let response = self.inner.call(request);

        Box::pin(async move {
            match response.await {
                Ok(response) => {
                    record_fault(explicit.as_ref(), response.extensions().get::<RequestFault>());
                    Ok(response)
                }
                Err(error) => {
                    record_fault(explicit.as_ref(), Some(&error));
                    Err(error)
                }
            }
        })
    }
}
