//! HTTP adapter layer
//!
//! Request/response adapters handed to handlers, multipart parsing, fixed
//! response builders and outbound client helpers.

pub mod client;
pub mod multipart;
pub mod request;
pub mod response;

pub use multipart::{FormFile, MultipartForm};
pub use request::Request;
pub use response::{build_options_response, cors_headers, status_text, ResponseWriter};
