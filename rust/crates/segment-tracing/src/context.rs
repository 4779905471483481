//! The ambient segment of the request currently being processed.
//!
//! The ambient segment lives in a tokio task-local, so it is only visible to
//! code polled inside the request's scope. Concurrent requests never see
//! each other's segments. Work spawned onto a separate task leaves the scope;
//! wrap it with [`bind`] to carry the segment along.

use std::future::Future;

use crate::segment::Segment;

tokio::task_local! {
    static ACTIVE_SEGMENT: Segment;
}

/// The ambient segment, if running inside a request scope.
pub fn current() -> Option<Segment> {
    ACTIVE_SEGMENT.try_with(Segment::clone).ok()
}

/// Resolves the segment for a request: an explicitly attached segment wins,
/// then the ambient one.
pub fn resolve(explicit: Option<&Segment>) -> Option<Segment> {
    explicit.cloned().or_else(current)
}

/// Runs a future with `segment` as the ambient segment.
pub async fn scope<F: Future>(segment: Segment, future: F) -> F::Output {
    ACTIVE_SEGMENT.scope(segment, future).await
}

/// Runs a closure with `segment` as the ambient segment.
pub fn sync_scope<T>(segment: Segment, f: impl FnOnce() -> T) -> T {
    ACTIVE_SEGMENT.sync_scope(segment, f)
}

/// Binds a future to the current ambient segment, so it keeps seeing that
/// segment wherever it is polled, e.g. after `tokio::spawn`.
///
/// The segment is captured when `bind` is called, not when the future is
/// first polled. Outside a request scope the future is left as it is.
pub fn bind<F: Future>(future: F) -> impl Future<Output = F::Output> {
    let segment = current();
    async move {
        match segment {
            Some(segment) => scope(segment, future).await,
            None => future.await,
        }
    }
}
