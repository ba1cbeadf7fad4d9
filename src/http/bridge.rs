//! Hand-off point to an external web framework.

use crate::error::HookError;
use crate::http::{RawRequest, RawResponse};

/// Receives every forwarded request together with its response.
///
/// What the framework does with the pair is its own business; it only has
/// to fill in `response` before returning.
pub trait RequestBridge: Send + Sync + 'static {
    fn handle(&self, request: &RawRequest, response: &RawResponse) -> Result<(), HookError>;
}

impl<F> RequestBridge for F
where
    F: Fn(&RawRequest, &RawResponse) -> Result<(), HookError> + Send + Sync + 'static,
{
    fn handle(&self, request: &RawRequest, response: &RawResponse) -> Result<(), HookError> {
        self(request, response)
    }
}
