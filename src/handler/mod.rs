//! Handler functions and the interceptor chain around them

mod chain;

use std::sync::Arc;

use crate::error::HandlerResult;
use crate::http::{Request, ResponseWriter};

pub use chain::{Chain, Interceptor, Outcome, Phase};
pub(crate) use chain::write_error;

/// Shared handler: reads the request, writes the response, and returns an
/// error to make the dispatcher answer with it instead
pub type HandlerFunc = Arc<dyn Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync>;

/// Box a closure or function as a [`HandlerFunc`]
pub fn handler_fn<F>(f: F) -> HandlerFunc
where
    F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}
