//! Multipart form parsing
//!
//! The request body is already buffered when this runs, so the whole form
//! is parsed in one pass and kept on the request.

use std::convert::Infallible;

use hyper::body::Bytes;

/// One uploaded file
#[derive(Debug, Clone)]
pub struct FormFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormFile {
    /// Reader over the file content
    pub fn reader(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Files and text fields of a `multipart/form-data` body, in body order
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub files: Vec<FormFile>,
    pub values: Vec<(String, String)>,
}

impl MultipartForm {
    pub fn files_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a FormFile> + 'a {
        self.files.iter().filter(move |f| f.field_name == key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Boundary of a `multipart/form-data` content type, `None` for other types
pub fn boundary(content_type: &str) -> Option<String> {
    if !content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return None;
    }
    multer::parse_boundary(content_type).ok()
}

/// Parse a buffered multipart body
///
/// Parts carrying a filename become files; the others are text fields.
pub async fn parse(body: Bytes, boundary: String) -> Result<MultipartForm, multer::Error> {
    let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(ToString::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await?;
                form.files.push(FormFile {
                    field_name,
                    file_name: Some(file_name),
                    content_type,
                    data,
                });
            }
            None => {
                let text = field.text().await?;
                form.values.push((field_name, text));
            }
        }
    }

    Ok(form)
}
