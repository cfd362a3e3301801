use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::HttpError;
use crate::content::{ContentBody, HttpContent, MultipartContent};
use crate::headers::{ContentDisposition, ContentHeaders};

const FORM_DATA: &str = "form-data";

/// `multipart/form-data` content. Every part carries a `form-data` disposition.
#[derive(Debug)]
pub struct MultipartFormDataContent {
    inner: MultipartContent,
}

impl Default for MultipartFormDataContent {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartFormDataContent {
    pub fn new() -> Self {
        Self { inner: MultipartContent::with_random_boundary(FORM_DATA) }
    }

    pub fn with_boundary(boundary: &str) -> Result<Self, HttpError> {
        Ok(Self { inner: MultipartContent::with_boundary(FORM_DATA, boundary)? })
    }

    pub fn boundary(&self) -> &str {
        self.inner.boundary()
    }

    pub fn parts(&self) -> &[HttpContent] {
        self.inner.parts()
    }

    /// Adds a part, giving it a bare `form-data` disposition unless it has one.
    pub fn add(&mut self, content: impl Into<HttpContent>) -> Result<(), HttpError> {
        let mut content = content.into();
        let disposition = match content.headers_mut().content_disposition() {
            Some(existing) if existing.disposition_type().eq_ignore_ascii_case(FORM_DATA) => None,
            Some(existing) => {
                let mut disposition = ContentDisposition::form_data();
                if let Some(name) = existing.name() {
                    disposition.set_name(name);
                }
                if let Some(file_name) = existing.file_name() {
                    disposition.set_file_name(file_name);
                }
                Some(disposition)
            }
            None => Some(ContentDisposition::form_data()),
        };
        if let Some(disposition) = disposition {
            content.headers_mut().set_content_disposition(&disposition)?;
        }
        self.inner.add(content);
        Ok(())
    }

    /// Adds a named form field.
    pub fn add_with_name(&mut self, content: impl Into<HttpContent>, name: &str) -> Result<(), HttpError> {
        self.add_part(content.into(), name, None)
    }

    /// Adds a named file field.
    pub fn add_with_name_and_file_name(
        &mut self,
        content: impl Into<HttpContent>,
        name: &str,
        file_name: &str,
    ) -> Result<(), HttpError> {
        if file_name.trim().is_empty() {
            return Err(HttpError::argument("file_name", "must not be empty"));
        }
        self.add_part(content.into(), name, Some(file_name))
    }

    fn add_part(&mut self, mut content: HttpContent, name: &str, file_name: Option<&str>) -> Result<(), HttpError> {
        if name.trim().is_empty() {
            return Err(HttpError::argument("name", "must not be empty"));
        }

        let mut disposition = ContentDisposition::form_data();
        disposition.set_name(name);
        if let Some(file_name) = file_name {
            disposition.set_file_name(file_name);
        }
        content.headers_mut().set_content_disposition(&disposition)?;
        self.inner.add(content);
        Ok(())
    }
}

#[async_trait]
impl ContentBody for MultipartFormDataContent {
    fn init_headers(&self, headers: &mut ContentHeaders) {
        self.inner.init_headers(headers);
    }

    async fn serialize_to_stream(&mut self, stream: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<(), HttpError> {
        self.inner.serialize_to_stream(stream).await
    }

    fn try_compute_length(&mut self) -> Option<u64> {
        self.inner.try_compute_length()
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }
}
