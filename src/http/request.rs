//! Request adapter
//!
//! Holds the hyper request head and the buffered body, and adds JSON/XML
//! decoding, route and query parameters, and multipart file access.

use std::io::Read;
use std::net::SocketAddr;

use hyper::body::Bytes;
use hyper::header::{self, HeaderMap};
use hyper::http::request::Parts;
use hyper::http::Extensions;
use hyper::{Method, Uri, Version};
use serde::de::DeserializeOwned;

use super::multipart::{FormFile, MultipartForm};
use crate::error::AdapterError;
use crate::logger;

pub struct Request {
    parts: Parts,
    body: Bytes,
    params: Vec<(String, String)>,
    form: Option<Result<MultipartForm, String>>,
    remote_addr: Option<SocketAddr>,
    debug: bool,
}

impl Request {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            parts,
            body,
            params: Vec::new(),
            form: None,
            remote_addr: None,
            debug: false,
        }
    }

    /// Wrap a request whose body is already in memory
    pub fn from_http(req: hyper::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body)
    }

    pub(crate) fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub(crate) fn set_remote_addr(&mut self, addr: Option<SocketAddr>) {
        self.remote_addr = addr;
    }

    pub(crate) fn set_params(&mut self, params: Vec<(String, String)>) {
        self.params = params;
    }

    /// Parse the body as `multipart/form-data` when the content type says so
    pub async fn parse_multipart(&mut self) {
        let Some(boundary) = self.header(header::CONTENT_TYPE).and_then(super::multipart::boundary) else {
            return;
        };
        let parsed = super::multipart::parse(self.body.clone(), boundary)
            .await
            .map_err(|e| e.to_string());
        if let Err(e) = &parsed {
            self.debug_log(&format!("Malformed multipart body: {e}"));
        }
        self.form = Some(parsed);
    }

    pub const fn method(&self) -> &Method {
        &self.parts.method
    }

    pub const fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub const fn version(&self) -> Version {
        self.parts.version
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Header value as text, `None` if missing or not visible ASCII
    pub fn header<K: header::AsHeaderName>(&self, name: K) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub const fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decode the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AdapterError> {
        self.log_body();
        serde_json::from_slice(&self.body).map_err(AdapterError::JsonDecode)
    }

    /// Decode the XML body
    pub fn xml<T: DeserializeOwned>(&self) -> Result<T, AdapterError> {
        self.log_body();
        let text = std::str::from_utf8(&self.body)?;
        Ok(quick_xml::de::from_str(text)?)
    }

    /// Named segment captured by the route pattern (`/users/{id}`)
    pub fn url_param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// First value of a query string parameter
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.parts.uri.query()?;
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()?
            .into_iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    fn multipart(&self) -> Result<&MultipartForm, AdapterError> {
        match &self.form {
            None => Err(AdapterError::NotMultipart),
            Some(Err(e)) => Err(AdapterError::Multipart(e.clone())),
            Some(Ok(form)) => Ok(form),
        }
    }

    /// Text field of a multipart form
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.multipart().ok()?.value(key)
    }

    /// First file uploaded under `key`
    pub fn file(&self, key: &str) -> Result<&FormFile, AdapterError> {
        self.debug_log(&format!("Trying to get file from the key \"{key}\""));
        self.multipart()?
            .files
            .iter()
            .find(|f| f.field_name == key)
            .ok_or_else(|| AdapterError::MissingFile(key.to_string()))
    }

    /// Call `f` with the index and metadata of every file under `key`
    ///
    /// Stops at the first error returned by `f`. A key without files is not
    /// an error.
    pub fn for_each_file<F, E>(&self, key: &str, mut f: F) -> Result<(), E>
    where
        F: FnMut(usize, &FormFile) -> Result<(), E>,
        E: From<AdapterError>,
    {
        for (index, file) in self.multipart()?.files_for(key).enumerate() {
            f(index, file)?;
        }
        Ok(())
    }

    /// Call `f` with the index and a reader over every file under `key`
    pub fn for_each_file_reader<F, E>(&self, key: &str, mut f: F) -> Result<(), E>
    where
        F: FnMut(usize, &mut dyn Read) -> Result<(), E>,
        E: From<AdapterError>,
    {
        self.for_each_file(key, |index, file| {
            let mut reader = file.reader();
            f(index, &mut reader)
        })
    }

    fn log_body(&self) {
        if self.debug {
            self.debug_log(&format!("Body: \"{}\"", String::from_utf8_lossy(&self.body)));
        }
    }

    fn debug_log(&self, message: &str) {
        if self.debug {
            logger::log_debug(&format!("[{}]: {message}", self.parts.uri));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::http::multipart::tests::{content_type, multipart_body};
    use serde::Deserialize;

    fn request(uri: &str, content_type: &str, body: &str) -> Request {
        let req = hyper::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Bytes::from(body.to_string()))
            .unwrap();
        Request::from_http(req)
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    #[test]
    fn test_json_body() {
        let req = request("/users", "application/json", r#"{"name":"Jonathan"}"#);
        let user: User = req.json().unwrap();
        assert_eq!(user.name, "Jonathan");

        let req = request("/users", "application/json", "{not json");
        let err: Error = req.json::<User>().unwrap_err().into();
        assert_eq!(err.status, hyper::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_xml_body() {
        let req = request("/users", "application/xml", "<User><name>Vincent</name></User>");
        let user: User = req.xml().unwrap();
        assert_eq!(user.name, "Vincent");
        assert!(request("/", "application/xml", "<User>").xml::<User>().is_err());
    }

    #[test]
    fn test_xml_rejects_invalid_utf8() {
        let req = hyper::Request::builder()
            .method(Method::POST)
            .uri("/users")
            .header(header::CONTENT_TYPE, "application/xml")
            .body(Bytes::from_static(b"<User><name>ab\xff</name></User>"))
            .unwrap();
        let req = Request::from_http(req);
        let err = req.xml::<User>().unwrap_err();
        assert!(matches!(err, AdapterError::Utf8(_)));
        let err: Error = err.into();
        assert_eq!(err.status, hyper::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_params() {
        let mut req = request("/users/7?full=1&tag=a%20b", "text/plain", "");
        req.set_params(vec![("id".to_string(), "7".to_string())]);
        assert_eq!(req.url_param("id"), Some("7"));
        assert_eq!(req.url_param("missing"), None);
        assert_eq!(req.query_param("tag").as_deref(), Some("a b"));
        assert_eq!(req.query_param("nope"), None);
        assert_eq!(req.path(), "/users/7");
    }

    #[test]
    fn test_files_require_multipart() {
        let req = request("/upload", "application/json", "{}");
        assert!(matches!(req.file("file"), Err(AdapterError::NotMultipart)));
        let result: Result<(), AdapterError> = req.for_each_file("file", |_, _| Ok(()));
        assert!(matches!(result, Err(AdapterError::NotMultipart)));
    }

    #[tokio::test]
    async fn test_for_each_file_reader() {
        let body = multipart_body(&[
            ("file", Some("one.txt"), "first"),
            ("note", None, "hello"),
            ("file", Some("two.txt"), "second"),
        ]);
        let mut req = request("/upload", &content_type(), &body);
        req.parse_multipart().await;

        let mut seen = Vec::new();
        req.for_each_file_reader("file", |index, reader| {
            let mut content = String::new();
            reader.read_to_string(&mut content).map_err(|e| Error::internal(e.to_string()))?;
            seen.push((index, content));
            Ok::<(), Error>(())
        })
        .unwrap();

        assert_eq!(seen, vec![(0, "first".to_string()), (1, "second".to_string())]);
        assert_eq!(req.form_value("note"), Some("hello"));
        assert_eq!(req.file("file").unwrap().file_name.as_deref(), Some("one.txt"));
        assert!(matches!(req.file("other"), Err(AdapterError::MissingFile(_))));
    }

    #[tokio::test]
    async fn test_file_borrow_outlives_key() {
        let body = multipart_body(&[("avatar", Some("me.png"), "png")]);
        let mut req = request("/upload", &content_type(), &body);
        req.parse_multipart().await;

        let file = {
            let key = String::from("avatar");
            req.file(&key).unwrap()
        };
        assert_eq!(file.file_name.as_deref(), Some("me.png"));
        assert_eq!(file.reader(), b"png");
    }

    #[tokio::test]
    async fn test_for_each_file_stops_on_error() {
        let body = multipart_body(&[("file", Some("a"), "1"), ("file", Some("b"), "2")]);
        let mut req = request("/upload", &content_type(), &body);
        req.parse_multipart().await;

        let mut calls = 0;
        let result = req.for_each_file("file", |_, _| {
            calls += 1;
            Err(Error::bad_request("stop"))
        });
        assert_eq!(result.unwrap_err().message, "stop");
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_malformed_multipart_is_reported() {
        let mut req = request("/upload", &content_type(), "garbage without boundary");
        req.parse_multipart().await;
        assert!(matches!(req.file("file"), Err(AdapterError::Multipart(_))));
    }
}
