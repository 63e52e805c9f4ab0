//! Routing module
//!
//! Route registration, REST resources, and the compiled application that
//! resolves each request to its interceptor chain.

mod resource;
mod route;
mod router;

pub use resource::Resource;
pub use route::{normalize_pattern, RouteHandle};
pub use router::{App, Router};
