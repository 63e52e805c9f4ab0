//! Route table builder and the compiled application
//!
//! `Router` collects routes, hooks and fixed headers. `Router::build`
//! compiles them into an immutable `App` that the server shares between
//! connection tasks.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Method, Response, StatusCode};

use super::resource::Resource;
use super::route::{Route, RouteHandle};
use crate::config::{Config, HttpConfig, LoggingConfig, ResponseConfig};
use crate::error::{Error, HandlerResult, RouteError};
use crate::handler::{handler_fn, write_error, HandlerFunc};
use crate::http::{build_options_response, cors_headers, Request, ResponseWriter};
use crate::logger::{self, AccessLogEntry};

/// Mutable route table, consumed by [`Router::build`]
pub struct Router {
    http: HttpConfig,
    logging: LoggingConfig,
    hooks: Vec<HandlerFunc>,
    custom_headers: HeaderMap,
    routes: Vec<Route>,
}

impl Router {
    /// Router with default settings allowing cross-domain calls from `domain`
    pub fn new(domain: &str) -> Self {
        let mut config = Config::default();
        config.http.domain = domain.to_string();
        Self::with_config(&config)
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            http: config.http.clone(),
            logging: config.logging.clone(),
            hooks: Vec::new(),
            custom_headers: HeaderMap::new(),
            routes: Vec::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.http.domain
    }

    pub fn set_domain(&mut self, domain: &str) -> &mut Self {
        self.http.domain = domain.to_string();
        self
    }

    /// Run `hook` for every request before route resolution
    ///
    /// An error from a hook is written and ends the request.
    pub fn add_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.hooks.push(handler_fn(hook));
        self
    }

    /// Header added to every response before any hook or handler runs
    pub fn set_custom_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.custom_headers.insert(name, value);
        self
    }

    /// Bind `handler` to `method` and `pattern`
    pub fn route<F>(&mut self, method: Method, pattern: &str, handler: F) -> RouteHandle<'_>
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route_fn(method, pattern, handler_fn(handler))
    }

    /// Bind an already shared handler
    pub fn route_fn(&mut self, method: Method, pattern: &str, handler: HandlerFunc) -> RouteHandle<'_> {
        self.routes.push(Route::new(method, pattern, handler));
        let index = self.routes.len() - 1;
        RouteHandle::new(&mut self.routes[index])
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> RouteHandle<'_>
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> RouteHandle<'_>
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> RouteHandle<'_>
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> RouteHandle<'_>
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> RouteHandle<'_>
    where
        F: Fn(&mut ResponseWriter, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(Method::DELETE, pattern, handler)
    }

    /// Reopen a registered route to attach more interceptors
    pub fn handle(&mut self, method: &Method, pattern: &str) -> Option<RouteHandle<'_>> {
        let path = super::route::normalize_pattern(pattern);
        self.routes
            .iter_mut()
            .find(|route| route.method == *method && route.path == path)
            .map(RouteHandle::new)
    }

    /// Bind GET, POST, PUT and DELETE on `/<root_url>` to `resource`
    pub fn register<R: Resource>(&mut self, resource: R) -> &mut Self {
        let resource = Arc::new(resource);
        let pattern = format!("/{}", resource.root_url().trim_start_matches('/'));

        let r = Arc::clone(&resource);
        let _ = self.get(&pattern, move |w, req| r.get(w, req));
        let r = Arc::clone(&resource);
        let _ = self.post(&pattern, move |w, req| r.post(w, req));
        let r = Arc::clone(&resource);
        let _ = self.put(&pattern, move |w, req| r.put(w, req));
        let _ = self.delete(&pattern, move |w, req| resource.delete(w, req));
        self
    }

    /// Compile the route table
    pub fn build(self) -> Result<App, RouteError> {
        let mut tables: HashMap<Method, matchit::Router<usize>> = HashMap::new();
        for (index, route) in self.routes.iter().enumerate() {
            let table = tables.entry(route.method.clone()).or_default();
            if let Err(source) = table.insert(route.path.clone(), index) {
                return Err(match source {
                    matchit::InsertError::Conflict { .. } => RouteError::Conflict {
                        method: route.method.clone(),
                        pattern: route.pattern.clone(),
                    },
                    source => RouteError::Pattern {
                        pattern: route.pattern.clone(),
                        source,
                    },
                });
            }
        }

        let cors = self.http.enable_cors.then(|| cors_headers(&self.http.domain));
        let mut preset_headers = cors.clone().unwrap_or_default();
        match HeaderValue::from_str(&self.http.server_name) {
            Ok(value) => {
                preset_headers.insert(header::SERVER, value);
            }
            Err(e) => logger::log_warning(&format!("Invalid server name '{}': {e}", self.http.server_name)),
        }
        preset_headers.extend(self.custom_headers);

        Ok(App {
            routes: self.routes,
            tables,
            hooks: self.hooks,
            preset_headers,
            cors,
            response_config: ResponseConfig::from(&self.http),
            max_body_size: usize::try_from(self.http.max_body_size).unwrap_or(usize::MAX),
            access_log: self.logging.access_log.then_some(self.logging.access_log_format),
        })
    }
}

/// Compiled, immutable application
pub struct App {
    routes: Vec<Route>,
    tables: HashMap<Method, matchit::Router<usize>>,
    hooks: Vec<HandlerFunc>,
    preset_headers: HeaderMap,
    cors: Option<HeaderMap>,
    response_config: ResponseConfig,
    max_body_size: usize,
    /// Access log format, `None` when access logging is off
    access_log: Option<String>,
}

enum Resolved {
    Found(usize, Vec<(String, String)>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl App {
    /// Answer one request
    pub async fn serve<B>(&self, req: hyper::Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.serve_peer(req, None).await
    }

    pub(crate) async fn serve_peer<B>(
        &self,
        req: hyper::Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();
        let (parts, body) = req.into_parts();
        let entry = self
            .access_log
            .as_ref()
            .map(|_| access_entry(&parts, remote_addr));

        let is_head = parts.method == Method::HEAD;
        let mut response = if parts.method == Method::OPTIONS {
            self.options(parts.uri.path())
        } else {
            match Limited::new(body, self.max_body_size).collect().await {
                Ok(collected) => {
                    let mut request = Request::new(parts, collected.to_bytes());
                    request.set_remote_addr(remote_addr);
                    self.handle(request).await
                }
                Err(e) => self.body_error(&*e),
            }
        };

        if let (Some(mut entry), Some(format)) = (entry, self.access_log.as_deref()) {
            entry.status = response.status().as_u16();
            entry.body_bytes = response
                .body()
                .size_hint()
                .exact()
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0);
            entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
            logger::log_access(&entry, format);
        }
        if is_head {
            strip_body(&mut response);
        }
        response
    }

    /// Preflight answer listing the methods routed for `path`
    fn options(&self, path: &str) -> Response<Full<Bytes>> {
        match allow_header(&self.allowed_methods(path)) {
            Some(allow) => build_options_response(allow, self.cors.as_ref()),
            None => {
                let mut w = self.writer();
                write_error(&mut w, &Error::not_found(""));
                w.into_response()
            }
        }
    }

    async fn handle(&self, mut request: Request) -> Response<Full<Bytes>> {
        request.set_debug(self.response_config.debug);
        request.parse_multipart().await;

        let mut w = self.writer();
        for hook in &self.hooks {
            if let Err(err) = hook(&mut w, &mut request) {
                write_error(&mut w, &err);
                return w.into_response();
            }
        }

        match self.resolve(request.method(), request.path()) {
            Resolved::Found(index, params) => {
                request.set_params(params);
                self.routes[index].chain.dispatch(&mut w, &mut request);
            }
            Resolved::MethodNotAllowed(allowed) => {
                if let Some(allow) = allow_header(&allowed) {
                    if let Err(e) = w.set_header(header::ALLOW, allow) {
                        logger::log_error(&format!("Failed to set Allow header: {e}"));
                    }
                }
                write_error(&mut w, &Error::method_not_allowed(""));
            }
            Resolved::NotFound => write_error(&mut w, &Error::not_found("")),
        }
        w.into_response()
    }

    fn writer(&self) -> ResponseWriter {
        let mut w = ResponseWriter::new(self.response_config);
        w.extend_headers(&self.preset_headers);
        w
    }

    /// HEAD without its own route is answered by the GET route
    fn resolve(&self, method: &Method, path: &str) -> Resolved {
        let lookup = |method: &Method| self.tables.get(method).and_then(|table| table.at(path).ok());
        let matched = match lookup(method) {
            None if *method == Method::HEAD => lookup(&Method::GET),
            matched => matched,
        };
        if let Some(matched) = matched {
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            return Resolved::Found(*matched.value, params);
        }

        let allowed = self.allowed_methods(path);
        if allowed.is_empty() {
            return Resolved::NotFound;
        }
        Resolved::MethodNotAllowed(allowed)
    }

    /// Methods answered for `path`, empty when no route matches it
    fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut allowed: Vec<Method> = self
            .tables
            .iter()
            .filter(|(_, table)| table.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();
        if allowed.is_empty() {
            return allowed;
        }
        if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }
        if !allowed.contains(&Method::OPTIONS) {
            allowed.push(Method::OPTIONS);
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        allowed
    }

    fn body_error(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) -> Response<Full<Bytes>> {
        let error = if err.downcast_ref::<LengthLimitError>().is_some() {
            Error::new("request body too large", StatusCode::PAYLOAD_TOO_LARGE)
        } else {
            logger::log_warning(&format!("Failed to read request body: {err}"));
            Error::bad_request("failed to read request body")
        };
        let mut w = self.writer();
        write_error(&mut w, &error);
        w.into_response()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes.len())
            .field("hooks", &self.hooks.len())
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

fn allow_header(methods: &[Method]) -> Option<HeaderValue> {
    if methods.is_empty() {
        return None;
    }
    let allow = methods.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    HeaderValue::from_str(&allow).ok()
}

/// Drop the body of a HEAD response, keeping the length GET would send
fn strip_body(response: &mut Response<Full<Bytes>>) {
    if let Some(len) = response.body().size_hint().exact() {
        response.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    *response.body_mut() = Full::new(Bytes::new());
}

fn access_entry(parts: &Parts, remote_addr: Option<SocketAddr>) -> AccessLogEntry {
    let header = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };
    AccessLogEntry {
        remote_addr: remote_addr.map_or_else(|| "-".to_string(), |addr| addr.ip().to_string()),
        time: chrono::Local::now(),
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(ToString::to_string),
        http_version: format!("{:?}", parts.version),
        status: 0,
        body_bytes: 0,
        referer: header(header::REFERER),
        user_agent: header(header::USER_AGENT),
        request_time_us: 0,
    }
}
