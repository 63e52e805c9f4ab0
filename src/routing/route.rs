//! Route registrations and the handle returned for attaching interceptors

use hyper::Method;

use crate::error::HandlerResult;
use crate::handler::{handler_fn, Chain, HandlerFunc, Phase};
use crate::http::{Request, ResponseWriter};

/// One (method, pattern) binding
#[derive(Debug, Clone)]
pub(crate) struct Route {
    pub method: Method,
    /// Pattern as registered
    pub pattern: String,
    /// Pattern in matcher syntax
    pub path: String,
    pub chain: Chain,
}

impl Route {
    pub fn new(method: Method, pattern: &str, handler: HandlerFunc) -> Self {
        Self {
            method,
            pattern: pattern.to_string(),
            path: normalize_pattern(pattern),
            chain: Chain::new(handler),
        }
    }
}

/// Handle on a registered route
///
/// Every attachment appends; interceptors are never replaced or removed.
pub struct RouteHandle<'r> {
    route: &'r mut Route,
}

impl<'r> RouteHandle<'r> {
    pub(crate) fn new(route: &'r mut Route) -> Self {
        Self { route }
    }

    pub fn method(&self) -> &Method {
        &self.route.method
    }

    pub fn pattern(&self) -> &str {
        &self.route.pattern
    }

    /// Attach an already shared handler to a phase
    #[must_use]
    pub fn intercept(self, phase: Phase, handler: HandlerFunc) -> Self {
        self.route.chain.push(phase, handler);
        self
    }

    /// Run `f` before the handler; an error aborts the request
    #[must_use]
    pub fn before<F>(self, f: F) -> Self
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.intercept(Phase::Before, handler_fn(f))
    }

    /// Run `f` after the handler, whatever its outcome
    #[must_use]
    pub fn after<F>(self, f: F) -> Self
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.intercept(Phase::After, handler_fn(f))
    }

    /// Run `f` when the handler returns an error
    #[must_use]
    pub fn on_error<F>(self, f: F) -> Self
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.intercept(Phase::OnError, handler_fn(f))
    }
}

/// Convert a pattern to matcher syntax
///
/// `:name` segments become `{name}` and a leading slash is added when
/// missing; `{name}` and `{*rest}` pass through unchanged.
pub fn normalize_pattern(pattern: &str) -> String {
    let path = pattern
        .trim()
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => format!("{{{name}}}"),
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/");

    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}
