use http::{HeaderMap, Method, Uri, Version};

use crate::connection::ClientCertificateOption;
use crate::native::{CookieContainer, Credentials};
use crate::protocol::TransportError;

/// Default upper bound of followed redirects.
pub const DEFAULT_MAX_REDIRECTS: u32 = 50;

/// Behaviour switches of a single native request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Follow `3xx` responses carrying a `Location` header.
    pub allow_auto_redirect: bool,
    pub max_redirects: u32,
    /// Send the body with `Transfer-Encoding: chunked`.
    pub send_chunked: bool,
    /// Declared body length when not sending chunked.
    pub content_length: Option<u64>,
    pub expect_continue: bool,
    pub keep_alive: bool,
    /// Overrides the `Host` header derived from the uri.
    pub host: Option<String>,
    pub credentials: Option<Credentials>,
    /// Fall back to the user info of the uri when no credentials are set.
    pub use_default_credentials: bool,
    /// Send `Authorization` with the first request instead of waiting for a challenge.
    pub pre_authenticate: bool,
    pub cookies: Option<CookieContainer>,
    pub client_certificate: ClientCertificateOption,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            allow_auto_redirect: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            send_chunked: false,
            content_length: None,
            expect_continue: false,
            keep_alive: true,
            host: None,
            credentials: None,
            use_default_credentials: false,
            pre_authenticate: false,
            cookies: None,
            client_certificate: ClientCertificateOption::default(),
        }
    }
}

/// A request handed to the native transport: request line, headers and options.
///
/// The body is not part of the request, it is streamed through
/// [`Exchange::request_stream`](crate::native::Exchange::request_stream).
#[derive(Debug, Clone)]
pub struct NativeRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    options: RequestOptions,
}

impl NativeRequest {
    /// Creates a request for an absolute `http` or `https` uri.
    pub fn new(method: Method, uri: Uri) -> Result<Self, TransportError> {
        match uri.scheme_str() {
            Some("http" | "https") => {}
            _ => return Err(TransportError::invalid_uri(format!("{uri} is not an absolute http uri"))),
        }
        if uri.host().is_none_or(str::is_empty) {
            return Err(TransportError::invalid_uri(format!("{uri} has no host")));
        }

        Ok(Self { method, uri, version: Version::HTTP_11, headers: HeaderMap::new(), options: RequestOptions::default() })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub(crate) fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Only HTTP/1.0 and HTTP/1.1 can be written.
    pub fn set_version(&mut self, version: Version) -> Result<(), TransportError> {
        if version != Version::HTTP_10 && version != Version::HTTP_11 {
            return Err(TransportError::invalid_operation(format!("unsupported http version {version:?}")));
        }
        self.version = version;
        Ok(())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut RequestOptions {
        &mut self.options
    }

    /// Explicit credentials, else the uri user info when default credentials are allowed.
    pub fn effective_credentials(&self) -> Option<Credentials> {
        self.options.credentials.clone().or_else(|| {
            if self.options.use_default_credentials { Credentials::from_uri(&self.uri) } else { None }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_uris() {
        assert!(NativeRequest::new(Method::GET, Uri::from_static("ftp://example.com/")).is_err());
        assert!(NativeRequest::new(Method::GET, Uri::from_static("/relative")).is_err());
        assert!(NativeRequest::new(Method::GET, Uri::from_static("https://example.com/")).is_ok());
    }

    #[test]
    fn default_credentials_come_from_user_info() {
        let mut request = NativeRequest::new(Method::GET, Uri::from_static("http://u:p@example.com/")).unwrap();
        assert!(request.effective_credentials().is_none());

        request.options_mut().use_default_credentials = true;
        assert_eq!(request.effective_credentials().unwrap().username(), "u");

        request.options_mut().credentials = Some(Credentials::new("explicit", "secret"));
        assert_eq!(request.effective_credentials().unwrap().username(), "explicit");
    }

    #[test]
    fn only_http1_versions() {
        let mut request = NativeRequest::new(Method::GET, Uri::from_static("http://example.com/")).unwrap();
        assert!(request.set_version(Version::HTTP_10).is_ok());
        assert!(request.set_version(Version::HTTP_2).is_err());
    }
}
