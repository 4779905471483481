//! Request tracing middleware for Tower services.
//!
//! Each request gets a [`Segment`], a trace backed by a `tracing` span. Two
//! layers manage it:
//!
//! * [`open_segment`] goes before any route. It opens the segment and makes
//!   it available, either ambiently ([`context::current`]) or, in manual
//!   mode, on the request ([`RequestSegmentExt::segment`]).
//! * [`close_segment`] goes after the routes. It records request faults on
//!   the segment and passes them on untouched.
//!
//! ```no_run
//! # fn main() -> Result<(), segment_tracing::ConfigurationError> {
//! use segment_tracing::{close_segment, open_segment};
//! use tower::ServiceBuilder;
//!
//! let middleware = ServiceBuilder::new()
//!     .layer(open_segment("my-service")?)
//!     .layer(close_segment());
//! # let _ = middleware;
//! # Ok(())
//! # }
//! ```

pub mod close;
pub mod config;
pub mod context;
pub mod error;
pub mod http_client;
pub mod open;
pub mod propagator;
pub mod segment;
pub mod setup;
pub mod tracer;

pub use close::{close_segment, record_fault, CloseSegmentLayer};
pub use config::{DefaultName, SegmentConfig, SegmentNaming};
pub use error::{ConfigurationError, RequestFault};
pub use open::{open_segment, OpenSegmentLayer};
pub use propagator::{
    AmbientPropagator, ExplicitFieldPropagator, PropagationMode, RequestSegmentExt,
    SegmentPropagator,
};
pub use segment::{ErrorRecord, ResponseClass, Segment, SegmentState};
pub use tracer::SegmentTracer;

/// A boxed future, as returned by the services and propagators here.
pub type BoxFuture<T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'static>>;

// Re-export [`tracing`] so clients don't have to add it separately.
pub use tracing;
