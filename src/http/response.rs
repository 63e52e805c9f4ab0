//! Response adapter and fixed response builders
//!
//! `ResponseWriter` buffers status, headers and body for one request. The
//! dispatcher commits it once the primary handler has finished; later write
//! attempts fail with `AdapterError::Committed` and leave it unchanged.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap, HeaderValue, IntoHeaderName};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::config::{ErrorFormat, ResponseConfig};
use crate::error::{AdapterError, Error};

const APPLICATION_JSON: &str = "application/json";
const APPLICATION_XML: &str = "application/xml";

pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    config: ResponseConfig,
    committed: bool,
}

impl ResponseWriter {
    pub fn new(config: ResponseConfig) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            config,
            committed: false,
        }
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub const fn config(&self) -> ResponseConfig {
        self.config
    }

    pub const fn is_committed(&self) -> bool {
        self.committed
    }

    const fn ensure_writable(&self) -> Result<(), AdapterError> {
        if self.committed {
            Err(AdapterError::Committed)
        } else {
            Ok(())
        }
    }

    pub fn set_status(&mut self, status: StatusCode) -> Result<(), AdapterError> {
        self.ensure_writable()?;
        self.status = status;
        Ok(())
    }

    /// Replace every value of a header
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) -> Result<(), AdapterError> {
        self.ensure_writable()?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a value to a header
    pub fn add_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) -> Result<(), AdapterError> {
        self.ensure_writable()?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Append raw bytes to the body
    pub fn write(&mut self, data: &[u8]) -> Result<(), AdapterError> {
        self.ensure_writable()?;
        self.body.extend_from_slice(data);
        Ok(())
    }

    /// Serialize `object` as JSON and append it, indented in debug mode
    pub fn write_json<T: Serialize + ?Sized>(&mut self, object: &T) -> Result<(), AdapterError> {
        self.ensure_writable()?;
        let encoded = self.encode_json(object)?;
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        self.body.extend_from_slice(&encoded);
        Ok(())
    }

    /// Serialize `object` as XML and append it, indented in debug mode
    pub fn write_xml<T: Serialize + ?Sized>(&mut self, object: &T) -> Result<(), AdapterError> {
        self.ensure_writable()?;
        let encoded = self.encode_xml(object)?;
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_XML));
        self.body.extend_from_slice(encoded.as_bytes());
        Ok(())
    }

    /// Write a one-field JSON object such as `{"status":"ok"}`
    pub fn write_single_string_json(&mut self, key: &str, value: &str) -> Result<(), AdapterError> {
        let mut object = serde_json::Map::with_capacity(1);
        object.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        self.write_json(&object)
    }

    /// Replace the response with the serialized error
    ///
    /// Anything buffered so far is discarded and the status line becomes the
    /// error's HTTP status. Nothing changes if encoding fails.
    pub fn write_error(&mut self, err: &Error) -> Result<(), AdapterError> {
        self.ensure_writable()?;
        let (encoded, content_type) = match self.config.error_format {
            ErrorFormat::Json => (self.encode_json(err)?, APPLICATION_JSON),
            ErrorFormat::Xml => (self.encode_xml(err)?.into_bytes(), APPLICATION_XML),
        };
        self.status = err.status;
        self.body = encoded;
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        Ok(())
    }

    /// Reply with a redirect to `location`
    pub fn redirect(&mut self, location: &str, status: StatusCode) -> Result<(), AdapterError> {
        self.ensure_writable()?;
        let value = HeaderValue::from_str(location)
            .map_err(|e| AdapterError::Header(format!("invalid redirect location: {e}")))?;
        self.status = status;
        self.headers.insert(header::LOCATION, value);
        Ok(())
    }

    fn encode_json<T: Serialize + ?Sized>(&self, object: &T) -> Result<Vec<u8>, AdapterError> {
        if self.config.debug {
            serde_json::to_vec_pretty(object)
        } else {
            serde_json::to_vec(object)
        }
        .map_err(AdapterError::JsonEncode)
    }

    fn encode_xml<T: Serialize + ?Sized>(&self, object: &T) -> Result<String, AdapterError> {
        let mut out = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut out);
        if self.config.debug {
            serializer.indent(' ', 2);
        }
        object.serialize(serializer)?;
        Ok(out)
    }

    /// Headers applied by the dispatcher before any handler runs
    pub(crate) fn extend_headers(&mut self, headers: &HeaderMap) {
        for (name, value) in headers {
            self.headers.append(name, value.clone());
        }
    }

    pub(crate) fn commit(&mut self) {
        self.committed = true;
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Build the CORS header set for an allowed origin
pub fn cors_headers(domain: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(domain) {
        Ok(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        Err(e) => {
            crate::logger::log_warning(&format!("Invalid CORS domain '{domain}': {e}"));
            return headers;
        }
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
    );
    if domain != "*" {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    headers
}

/// Build OPTIONS response (preflight request) advertising `allow`
pub fn build_options_response(allow: HeaderValue, cors: Option<&HeaderMap>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(header::ALLOW, allow);
    if let Some(cors) = cors {
        for (name, value) in cors {
            headers.insert(name, value.clone());
        }
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    }
    response
}

/// Text for an HTTP status code, empty when the code is unknown
pub fn status_text(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}
