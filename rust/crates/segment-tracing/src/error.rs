//! Errors raised while configuring segment tracing, and faults reported by
//! request handlers.

use std::error::Error;
use std::sync::Arc;

/// The segment name supplied at configuration time was missing or blank.
///
/// This is a startup failure; there is nothing to recover.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display(fmt = "default segment name was not supplied, please provide a non-empty string")]
pub struct ConfigurationError;

/// A fault raised by a request handler that still produced a response.
///
/// Routers such as axum never fail at the service level, so a handler that
/// wants its fault recorded on the segment attaches one of these to the
/// response extensions. The close hook reads it and leaves it in place for
/// anything further down the chain.
#[derive(Clone, Debug, derive_more::Display)]
#[display(fmt = "{}", _0)]
pub struct RequestFault(Arc<dyn Error + Send + Sync>);

impl RequestFault {
    pub fn new(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self(Arc::from(error.into()))
    }

    /// Attaches this fault to a response.
    pub fn attach<B>(self, response: &mut http::Response<B>) {
        response.extensions_mut().insert(self);
    }

    /// The underlying error.
    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fault_survives_on_the_response() {
        let mut response = http::Response::new(());
        RequestFault::new("boom").attach(&mut response);

        let fault = response.extensions().get::<RequestFault>();
        assert_eq!(fault.map(ToString::to_string).as_deref(), Some("boom"));
    }

    #[test]
    fn a_fault_shows_the_underlying_error() {
        let fault = RequestFault::new("boom");
        assert_eq!(fault.to_string(), "boom");
        assert!(format!("{fault:?}").starts_with("RequestFault("));
        assert_eq!(fault.error().to_string(), "boom");
    }

    #[test]
    fn configuration_error_explains_itself() {
        assert!(ConfigurationError.to_string().contains("segment name"));
    }
}
