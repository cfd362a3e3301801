//! Request and response messages passed along the handler chain.
//!
//! Both wrap an `http` head (`Request<()>` / `Response<()>`) for the message
//! line and message headers, and own an optional [`HttpContent`] carrying the
//! body together with its content headers.

use http::{Extensions, HeaderMap, Method, Request, Response, StatusCode, Uri, Version};

use crate::HttpError;
use crate::content::HttpContent;

#[derive(Debug)]
pub struct HttpRequestMessage {
    head: Request<()>,
    content: Option<HttpContent>,
}

impl Default for HttpRequestMessage {
    fn default() -> Self {
        Self::new(Method::GET, Uri::default())
    }
}

impl HttpRequestMessage {
    pub fn new(method: Method, uri: Uri) -> Self {
        let mut head = Request::new(());
        *head.method_mut() = method;
        *head.uri_mut() = uri;
        Self { head, content: None }
    }

    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: Uri, content: impl Into<HttpContent>) -> Self {
        Self::new(Method::POST, uri).with_content(content)
    }

    pub fn with_content(mut self, content: impl Into<HttpContent>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn set_method(&mut self, method: Method) {
        *self.head.method_mut() = method;
    }

    pub fn uri(&self) -> &Uri {
        self.head.uri()
    }

    pub fn set_uri(&mut self, uri: Uri) {
        *self.head.uri_mut() = uri;
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn set_version(&mut self, version: Version) {
        *self.head.version_mut() = version;
    }

    /// Message headers. Content headers live on the content.
    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.head.headers_mut()
    }

    /// Per request properties visible to every handler of the chain.
    pub fn extensions(&self) -> &Extensions {
        self.head.extensions()
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        self.head.extensions_mut()
    }

    pub fn content(&self) -> Option<&HttpContent> {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> Option<&mut HttpContent> {
        self.content.as_mut()
    }

    pub fn set_content(&mut self, content: Option<HttpContent>) {
        self.content = content;
    }

    pub fn take_content(&mut self) -> Option<HttpContent> {
        self.content.take()
    }

    pub fn dispose(&mut self) {
        if let Some(content) = &mut self.content {
            content.dispose();
        }
    }
}

#[derive(Debug)]
pub struct HttpResponseMessage {
    head: Response<()>,
    reason_phrase: Option<String>,
    content: Option<HttpContent>,
    request: Option<HttpRequestMessage>,
}

impl Default for HttpResponseMessage {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl HttpResponseMessage {
    pub fn new(status: StatusCode) -> Self {
        let mut head = Response::new(());
        *head.status_mut() = status;
        Self { head, reason_phrase: None, content: None, request: None }
    }

    pub fn status(&self) -> StatusCode {
        self.head.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        *self.head.status_mut() = status;
    }

    /// The reason phrase as received, or the canonical one for the status.
    pub fn reason_phrase(&self) -> Option<&str> {
        self.reason_phrase.as_deref().or_else(|| self.head.status().canonical_reason())
    }

    pub fn set_reason_phrase(&mut self, reason_phrase: Option<String>) {
        self.reason_phrase = reason_phrase;
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn set_version(&mut self, version: Version) {
        *self.head.version_mut() = version;
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.head.headers_mut()
    }

    pub fn extensions(&self) -> &Extensions {
        self.head.extensions()
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        self.head.extensions_mut()
    }

    pub fn content(&self) -> Option<&HttpContent> {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> Option<&mut HttpContent> {
        self.content.as_mut()
    }

    pub fn set_content(&mut self, content: Option<HttpContent>) {
        self.content = content;
    }

    pub fn take_content(&mut self) -> Option<HttpContent> {
        self.content.take()
    }

    /// The request this response answers.
    pub fn request(&self) -> Option<&HttpRequestMessage> {
        self.request.as_ref()
    }

    pub fn set_request(&mut self, request: Option<HttpRequestMessage>) {
        self.request = request;
    }

    pub fn take_request(&mut self) -> Option<HttpRequestMessage> {
        self.request.take()
    }

    /// True for 2xx status codes.
    pub fn is_success(&self) -> bool {
        self.head.status().is_success()
    }

    /// Fails with a request error unless the status is 2xx. The content is
    /// released on failure.
    pub fn ensure_success_status_code(&mut self) -> Result<(), HttpError> {
        if self.is_success() {
            return Ok(());
        }

        if let Some(content) = &mut self.content {
            content.dispose();
        }
        Err(HttpError::request(format!(
            "response status code does not indicate success: {} ({})",
            self.head.status().as_u16(),
            self.reason_phrase().unwrap_or_default()
        )))
    }

    pub fn dispose(&mut self) {
        if let Some(content) = &mut self.content {
            content.dispose();
        }
    }
}
