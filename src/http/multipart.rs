//! `multipart/form-data` parsing
//!
//! The request body is already collected (and size-capped) by the router, so
//! the parser runs over a single in-memory chunk.

use futures_util::stream;
use hyper::body::Bytes;
use std::collections::HashMap;
use std::convert::Infallible;

/// Name of the form part carrying the certificate document
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied name, possibly empty
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    /// A text field, treating empty values as absent
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Parse a form body given the request's `Content-Type`
pub async fn parse_form(content_type: Option<&str>, body: Bytes) -> Result<UploadForm, multer::Error> {
    let boundary = multer::parse_boundary(content_type.unwrap_or_default())?;
    let chunks = stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(chunks, boundary);

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };

        if name == FILE_FIELD {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            // First file part wins
            if form.file.is_none() {
                form.file = Some(UploadedFile { filename, data });
            }
        } else {
            let value = field.text().await?;
            form.fields.entry(name).or_insert(value);
        }
    }

    Ok(form)
}

/// Build a form body for tests: text fields plus an optional file part
#[cfg(test)]
pub fn encode_form(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> (String, Bytes) {
    let boundary = "certify-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{FILE_FIELD}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (
        format!("multipart/form-data; boundary={boundary}"),
        Bytes::from(body),
    )
}
