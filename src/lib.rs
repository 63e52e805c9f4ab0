//! resthook
//!
//! JSON-first handlers over hyper with per-route interceptor chains.
//!
//! ```no_run
//! use resthook::{Error, Router};
//!
//! # async fn run() -> Result<(), resthook::ServerError> {
//! let config = resthook::Config::load()?;
//! let mut router = Router::with_config(&config);
//! let _ = router
//!     .get("/admin", |w, _| {
//!         w.write_single_string_json("status", "ok")?;
//!         Ok(())
//!     })
//!     .before(|_, r| match r.header("x-admin") {
//!         Some(_) => Ok(()),
//!         None => Err(Error::forbidden("")),
//!     });
//! resthook::listen_and_serve(&config, router.build()?).await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod routing;
pub mod server;

pub use config::Config;
pub use error::{AdapterError, Error, HandlerResult, RouteError, ServerError};
pub use handler::{handler_fn, HandlerFunc, Phase};
pub use http::{Request, ResponseWriter};
pub use routing::{App, Resource, RouteHandle, Router};
pub use server::{listen_and_serve, Server};
