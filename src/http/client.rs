//! Outbound JSON helpers
//!
//! Plain-HTTP calls over hyper-util's pooled client, returning the buffered
//! response with the same decoding helpers the request adapter has.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Method, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::{AdapterError, Error as HttpError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL: {0}")]
    Uri(#[from] hyper::http::uri::InvalidUri),

    #[error("failed to build request: {0}")]
    Build(#[from] hyper::http::Error),

    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    #[error("failed to encode form: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),

    #[error(transparent)]
    Codec(#[from] AdapterError),
}

/// Buffered response of an outbound call
#[derive(Debug)]
pub struct ClientResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ClientResponse {
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AdapterError> {
        serde_json::from_slice(&self.body).map_err(AdapterError::JsonDecode)
    }

    pub fn xml<T: DeserializeOwned>(&self) -> Result<T, AdapterError> {
        let text = std::str::from_utf8(&self.body)?;
        Ok(quick_xml::de::from_str(text)?)
    }

    /// Structured error carried by a non-success response
    ///
    /// Falls back to the status line when the body is not an error object.
    pub fn error(&self) -> Option<HttpError> {
        if self.status.is_success() || self.status.is_redirection() {
            return None;
        }
        let mut err = self
            .json::<HttpError>()
            .unwrap_or_else(|_| HttpError::new(self.text(), self.status));
        err.status = self.status;
        Some(err)
    }
}

async fn send(
    method: Method,
    url: &str,
    content_type: Option<&'static str>,
    body: Bytes,
) -> Result<ClientResponse, ClientError> {
    let uri: hyper::Uri = url.parse()?;
    let mut builder = hyper::Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    let request = builder.body(Full::new(body))?;

    let client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
    let response = client.request(request).await?;
    let (parts, incoming) = response.into_parts();
    let body = incoming.collect().await?.to_bytes();

    Ok(ClientResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

/// Issue a GET request
pub async fn get(url: &str) -> Result<ClientResponse, ClientError> {
    send(Method::GET, url, None, Bytes::new()).await
}

/// POST `object` encoded as JSON
pub async fn post_json<T: Serialize + ?Sized>(url: &str, object: &T) -> Result<ClientResponse, ClientError> {
    let body = serde_json::to_vec(object).map_err(AdapterError::JsonEncode)?;
    send(Method::POST, url, Some("application/json"), Bytes::from(body)).await
}

/// POST URL-encoded form fields
pub async fn post_form(url: &str, fields: &[(&str, &str)]) -> Result<ClientResponse, ClientError> {
    let body = serde_urlencoded::to_string(fields)?;
    send(
        Method::POST,
        url,
        Some("application/x-www-form-urlencoded"),
        Bytes::from(body),
    )
    .await
}
