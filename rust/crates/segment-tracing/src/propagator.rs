//! Strategies for making a request's segment available to handlers.

use std::future::Future;

use http::{Extensions, Request};
use tracing::Instrument;

use crate::context;
use crate::segment::Segment;
use crate::BoxFuture;

/// Which propagation strategy is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationMode {
    /// The segment is ambient; see [`context::current`].
    Automatic,
    /// The segment is attached to the request; see [`RequestSegmentExt`].
    Manual,
}

/// Hands a freshly opened segment to the rest of the request.
pub trait SegmentPropagator: Clone + Send + Sync + 'static {
    fn mode(&self) -> PropagationMode;

    /// Called before the request is passed on.
    fn attach<B>(&self, segment: &Segment, request: &mut Request<B>);

    /// Wraps the rest of the request processing.
    fn run<F>(&self, segment: Segment, next: F) -> BoxFuture<F::Output>
    where
        F: Future + Send + 'static;
}

/// Makes the segment ambient for everything polled within the request, and
/// enters its span.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientPropagator;

impl SegmentPropagator for AmbientPropagator {
    fn mode(&self) -> PropagationMode {
        PropagationMode::Automatic
    }

    fn attach<B>(&self, _segment: &Segment, _request: &mut Request<B>) {}

    fn run<F>(&self, segment: Segment, next: F) -> BoxFuture<F::Output>
    where
        F: Future + Send + 'static,
    {
        let span = segment.span().clone();
        Box::pin(context::scope(segment, next.instrument(span)))
    }
}

/// Attaches the segment to the request extensions and nothing else.
///
/// Handlers must fetch it with [`RequestSegmentExt::segment`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitFieldPropagator;

impl SegmentPropagator for ExplicitFieldPropagator {
    fn mode(&self) -> PropagationMode {
        PropagationMode::Manual
    }

    fn attach<B>(&self, segment: &Segment, request: &mut Request<B>) {
        request.extensions_mut().insert(segment.clone());
    }

    fn run<F>(&self, _segment: Segment, next: F) -> BoxFuture<F::Output>
    where
        F: Future + Send + 'static,
    {
        Box::pin(next)
    }
}

/// Access to a segment attached in manual mode.
pub trait RequestSegmentExt {
    fn segment(&self) -> Option<&Segment>;
}

impl RequestSegmentExt for Extensions {
    fn segment(&self) -> Option<&Segment> {
        self.get::<Segment>()
    }
}

impl<B> RequestSegmentExt for Request<B> {
    fn segment(&self) -> Option<&Segment> {
        self.extensions().segment()
    }
}

#[cfg(test)]
mod tests {
    use tracing::Span;

    use super::*;

    #[tokio::test]
    async fn ambient_propagation_leaves_the_request_alone() {
        let segment = Segment::new("my-service", Span::none());
        let mut request = Request::new(());

        AmbientPropagator.attach(&segment, &mut request);
        let seen = AmbientPropagator
            .run(segment.clone(), async { context::current() })
            .await;

        assert!(request.segment().is_none());
        assert_eq!(seen, Some(segment));
    }

    #[tokio::test]
    async fn explicit_propagation_uses_the_request_only() {
        let segment = Segment::new("my-service", Span::none());
        let mut request = Request::new(());

        ExplicitFieldPropagator.attach(&segment, &mut request);
        let seen = ExplicitFieldPropagator
            .run(segment.clone(), async { context::current() })
            .await;

        assert_eq!(request.segment(), Some(&segment));
        assert_eq!(seen, None);
    }
}
