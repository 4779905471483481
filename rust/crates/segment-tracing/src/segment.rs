//! The trace of a single request.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::StatusCode;
use tracing::Span;

/// Where a segment is in its lifecycle.
///
/// A request with no segment at all has no state; once the open hook runs it
/// is [`SegmentState::Open`] until either a fault is recorded or the response
/// completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Open,
    ClosedClean,
    ClosedWithError,
}

/// Classification of the final response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// 429 Too Many Requests.
    Throttle,
    /// Any other 4xx.
    ClientError,
    /// 5xx.
    Fault,
}

impl ResponseClass {
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::Throttle
        } else if status.is_client_error() {
            Self::ClientError
        } else if status.is_server_error() {
            Self::Fault
        } else {
            Self::Success
        }
    }
}

/// An error recorded on a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// The error's `Display` output.
    pub message: String,
    /// The error's `Debug` output.
    pub detail: String,
}

/// A handle to one request's trace.
///
/// Clones share the same underlying segment, and compare equal only to each
/// other. The span is closed once the last handle is dropped.
#[derive(Clone)]
pub struct Segment {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    span: Span,
    record: Mutex<Record>,
}

struct Record {
    state: SegmentState,
    errors: Vec<ErrorRecord>,
    status: Option<StatusCode>,
}

impl Segment {
    /// Wraps a span in a new, open segment.
    ///
    /// The span should declare `http.status_code` and `otel.status_code` as
    /// empty fields for them to be recorded on close.
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                span,
                record: Mutex::new(Record {
                    state: SegmentState::Open,
                    errors: Vec::new(),
                    status: None,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    /// Runs a closure with the segment's span entered.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.inner.span.in_scope(f)
    }

    pub fn state(&self) -> SegmentState {
        self.record().state
    }

    /// All errors recorded so far, oldest first.
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.record().errors.clone()
    }

    /// The response status, once the response has completed.
    pub fn status(&self) -> Option<StatusCode> {
        self.record().status
    }

    pub fn response_class(&self) -> Option<ResponseClass> {
        self.status().map(ResponseClass::from_status)
    }

    /// Records an error on the segment.
    ///
    /// Every call adds a record; repeated calls for the same error are not
    /// collapsed. Only an open segment becomes [`SegmentState::ClosedWithError`];
    /// a fault arriving after the segment closed is still recorded, but the
    /// state is left alone.
    pub fn add_error<E>(&self, error: &E)
    where
        E: fmt::Display + fmt::Debug + ?Sized,
    {
        let record = ErrorRecord {
            message: error.to_string(),
            detail: format!("{error:?}"),
        };
        {
            let mut current = self.record();
            current.errors.push(record);
            if current.state == SegmentState::Open {
                current.state = SegmentState::ClosedWithError;
            }
        }

        let span = &self.inner.span;
        span.record("otel.status_code", "ERROR");
        tracing::error!(
            parent: span,
            exception.message = %error,
            exception.details = ?error,
            "request fault",
        );
    }

    /// Completes the segment with the final response status.
    ///
    /// A segment that already has an error stays closed with that error.
    pub fn close(&self, status: StatusCode) {
        let class = ResponseClass::from_status(status);
        {
            let mut current = self.record();
            current.status = Some(status);
            if current.state == SegmentState::Open {
                current.state = SegmentState::ClosedClean;
            }
        }

        let span = &self.inner.span;
        span.record("http.status_code", status.as_u16());
        if class == ResponseClass::Fault {
            span.record("otel.status_code", "ERROR");
        }
        tracing::trace!(parent: span, segment = %self.inner.name, ?class, "segment closed");
    }

    /// Completes the segment when the request failed without a response.
    pub fn close_with_failure(&self) {
        {
            let mut current = self.record();
            if current.state == SegmentState::Open {
                current.state = SegmentState::ClosedWithError;
            }
        }

        let span = &self.inner.span;
        span.record("otel.status_code", "ERROR");
        tracing::trace!(parent: span, segment = %self.inner.name, "segment failed");
    }

    fn record(&self) -> MutexGuard<'_, Record> {
        self.inner
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Segment {}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
