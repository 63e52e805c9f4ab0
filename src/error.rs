//! Error types
//!
//! `Error` is the structured error handlers and interceptors return to abort
//! normal processing. The other types report failures of the adapters, the
//! route table and the listener to their direct callers.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Result returned by handlers and interceptors
pub type HandlerResult = Result<(), Error>;

/// Structured application error written to the client by the dispatcher
///
/// Serialized as `{"error": "...", "httpCode": 404, "statusCode": 12}`,
/// with `statusCode` omitted when no application status is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[serde(rename = "Error")]
#[error("{message} ({status})")]
pub struct Error {
    /// Human-readable message
    #[serde(rename = "error", default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// HTTP status line of the error response
    #[serde(rename = "httpCode", with = "status_code", default = "default_status")]
    pub status: StatusCode,
    /// Optional application-level status code
    #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
    pub app_status: Option<i64>,
}

const fn default_status() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

impl Error {
    /// Create an error with a message and an HTTP status.
    ///
    /// An empty message is replaced by the status' canonical reason phrase.
    /// Codes outside 100..=599 become 500.
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        let status = if status.as_u16() > 599 {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            status
        };
        let mut message = message.into();
        if message.is_empty() {
            message = status.canonical_reason().unwrap_or("Unknown Error").to_string();
        }
        Self {
            message,
            status,
            app_status: None,
        }
    }

    /// Wrap any displayable error with both an application and an HTTP status
    pub fn from_error(err: &impl std::fmt::Display, app_status: i64, status: StatusCode) -> Self {
        Self::new(err.to_string(), status).with_app_status(app_status)
    }

    /// Attach an application status code; zero clears it
    #[must_use]
    pub const fn with_app_status(mut self, app_status: i64) -> Self {
        self.app_status = if app_status == 0 { None } else { Some(app_status) };
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::FORBIDDEN)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Failures of the request/response adapters
///
/// Returned to the handler that called the adapter method; `?` turns them
/// into an [`Error`] with a 400 or 500 status.
#[derive(Debug, ThisError)]
pub enum AdapterError {
    #[error("invalid JSON body: {0}")]
    JsonDecode(#[source] serde_json::Error),

    #[error("failed to encode JSON: {0}")]
    JsonEncode(#[source] serde_json::Error),

    #[error("invalid XML body: {0}")]
    XmlDecode(#[from] quick_xml::DeError),

    /// Text body that is not valid UTF-8
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("failed to encode XML: {0}")]
    XmlEncode(#[from] quick_xml::SeError),

    #[error("request is not multipart/form-data")]
    NotMultipart,

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    /// No file was uploaded under the form key
    #[error("no file for form key \"{0}\"")]
    MissingFile(String),

    /// A header value that cannot be sent on the wire
    #[error("{0}")]
    Header(String),

    /// The response was already finalized by the dispatcher
    #[error("response already committed")]
    Committed,
}

impl AdapterError {
    /// HTTP status used when the failure is turned into an [`Error`]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::JsonDecode(_)
            | Self::XmlDecode(_)
            | Self::Utf8(_)
            | Self::NotMultipart
            | Self::Multipart(_)
            | Self::MissingFile(_) => StatusCode::BAD_REQUEST,
            Self::JsonEncode(_) | Self::XmlEncode(_) | Self::Header(_) | Self::Committed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<AdapterError> for Error {
    fn from(err: AdapterError) -> Self {
        Self::new(err.to_string(), err.status())
    }
}

/// Route table construction failures reported by `Router::build`
#[derive(Debug, ThisError)]
pub enum RouteError {
    /// Two primary handlers for the same method and pattern
    #[error("duplicate route {method} {pattern}")]
    Conflict { method: hyper::Method, pattern: String },

    #[error("invalid route pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: matchit::InsertError,
    },
}

/// Listener and startup failures
#[derive(Debug, ThisError)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid listen address: {0}")]
    Address(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Route(#[from] RouteError),
}

mod status_code {
    use hyper::StatusCode;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(status.as_u16())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatusCode, D::Error> {
        let code = u16::deserialize(deserializer)?;
        if code > 599 {
            return Err(de::Error::custom(format!("invalid HTTP status {code}")));
        }
        StatusCode::from_u16(code).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_json_shape() {
        let err = Error::new("X", StatusCode::NOT_FOUND);
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"error":"X","httpCode":404}"#);

        let err = err.with_app_status(12);
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"error":"X","httpCode":404,"statusCode":12}"#);
    }

    #[test]
    fn test_empty_message_uses_reason_phrase() {
        let err = Error::new("", StatusCode::FORBIDDEN);
        assert_eq!(err.message, "Forbidden");
    }

    #[test]
    fn test_out_of_range_status_becomes_500() {
        let status = StatusCode::from_u16(799).unwrap();
        assert_eq!(Error::new("x", status).status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(serde_json::from_str::<Error>(r#"{"error":"x","httpCode":799}"#).is_err());
    }

    #[test]
    fn test_zero_app_status_is_omitted() {
        let err = Error::bad_request("nope").with_app_status(0);
        assert_eq!(err.app_status, None);
        assert!(!serde_json::to_string(&err).unwrap().contains("statusCode"));
    }

    #[test]
    fn test_error_deserialize() {
        let err: Error = serde_json::from_str(r#"{"error":"gone","httpCode":410,"statusCode":3}"#).unwrap();
        assert_eq!(err.status, StatusCode::GONE);
        assert_eq!(err.app_status, Some(3));

        let bad = serde_json::from_str::<Error>(r#"{"error":"x","httpCode":42}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_from_error_keeps_both_codes() {
        let io = std::io::Error::other("disk full");
        let err = Error::from_error(&io, 7, StatusCode::INSUFFICIENT_STORAGE);
        assert_eq!(err.message, "disk full");
        assert_eq!(err.app_status, Some(7));
        assert_eq!(err.status, StatusCode::INSUFFICIENT_STORAGE);
    }

    #[test]
    fn test_adapter_error_status_mapping() {
        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: Error = AdapterError::JsonDecode(decode).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: Error = AdapterError::Committed.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let err: Error = AdapterError::MissingFile("file".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("\"file\""));
    }
}
