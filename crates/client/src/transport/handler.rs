//! [`TransportHandler`] adapts request and response messages onto one native
//! [`Exchange`] per send.
//!
//! # Send
//!
//! 1. trip the started latch, so the configuration is frozen from here on
//! 2. build the native request: options from the configuration, message
//!    headers (`Host`, `Expect`, `Transfer-Encoding` and `Connection` become
//!    transport options), then content headers
//! 3. with content: stream it chunked, or with its known length, or buffer it
//!    first to learn the length
//! 4. await the response and wrap its body in a [`StreamContent`]
//! 5. resolve failures: a response the transport still produced wins, then
//!    caller cancellation, then request errors for transport and I/O failures

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use http::header::{CONNECTION, CONTENT_LENGTH, EXPECT, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue};
use micro_transport::codec::is_chunked;
use micro_transport::connection::{ClientCertificateOption, Connector};
use micro_transport::native::{
    CookieContainer, Credentials, DEFAULT_MAX_REDIRECTS, Exchange, HttpTransport, NativeRequest, NativeResponse,
};
use micro_transport::protocol::{ParseError, PayloadSize, SendError, TransportError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::{BoxError, HttpError};
use crate::content::{HttpContent, MAX_BUFFER_SIZE, StreamContent};
use crate::handler::{HttpMessageHandler, Lifecycle};
use crate::headers::is_content_header;
use crate::helpers::{is_http_uri, with_cancellation};
use crate::message::{HttpRequestMessage, HttpResponseMessage};
use crate::transport::{DEFAULT_TIMEOUT, RequestState};

#[derive(Debug, Clone)]
struct TransportSettings {
    allow_auto_redirect: bool,
    max_redirects: u32,
    client_certificate: ClientCertificateOption,
    use_cookies: bool,
    cookie_container: CookieContainer,
    credentials: Option<Credentials>,
    use_default_credentials: bool,
    pre_authenticate: bool,
    max_request_content_buffer_size: usize,
    timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            allow_auto_redirect: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            client_certificate: ClientCertificateOption::Manual,
            use_cookies: true,
            cookie_container: CookieContainer::new(),
            credentials: None,
            use_default_credentials: false,
            pre_authenticate: false,
            max_request_content_buffer_size: MAX_BUFFER_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Why a send did not produce a native response.
enum Failure {
    Transport(TransportError),
    Content(HttpError),
}

/// The handler at the end of a chain, performing the network exchange.
///
/// Configuration setters fail with [`HttpError::InvalidOperation`] once the
/// first request was sent, and with [`HttpError::Disposed`] after disposal.
pub struct TransportHandler {
    transport: HttpTransport,
    settings: TransportSettings,
    lifecycle: Lifecycle,
}

impl Default for TransportHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportHandler {
    /// A handler connecting over plain TCP.
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new())
    }

    pub fn with_transport(transport: HttpTransport) -> Self {
        Self { transport, settings: TransportSettings::default(), lifecycle: Lifecycle::new("TransportHandler") }
    }

    pub fn set_connector<C: Connector + 'static>(&mut self, connector: C) -> Result<(), HttpError> {
        self.lifecycle.check_configurable()?;
        self.transport = HttpTransport::with_connector(connector);
        Ok(())
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn allow_auto_redirect(&self) -> bool {
        self.settings.allow_auto_redirect
    }

    pub fn set_allow_auto_redirect(&mut self, allow: bool) -> Result<(), HttpError> {
        self.lifecycle.check_configurable()?;
        self.settings.allow_auto_redirect = allow;
        Ok(())
    }

    pub fn max_redirects(&self) -> u32 {
        self.settings.max_redirects
    }

    pub fn set_max_redirects(&mut self, max_redirects: u32) -> Result<(), HttpError> {
        if max_redirects == 0 {
            return Err(HttpError::argument("max_redirects", "must be greater than zero"));
        }
        self.lifecycle.check_configurable()?;
        self.settings.max_redirects = max_redirects;
        Ok(())
    }

    pub fn client_certificate_option(&self) -> ClientCertificateOption {
        self.settings.client_certificate
    }

    pub fn set_client_certificate_option(&mut self, option: ClientCertificateOption) -> Result<(), HttpError> {
        self.lifecycle.check_configurable()?;
        self.settings.client_certificate = option;
        Ok(())
    }

    pub fn use_cookies(&self) -> bool {
        self.settings.use_cookies
    }

    pub fn set_use_cookies(&mut self, use_cookies: bool) -> Result<(), HttpError> {
        self.lifecycle.check_configurable()?;
        self.settings.use_cookies = use_cookies;
        Ok(())
    }

    /// The container cookies are read from and stored into. Shared with clones.
    pub fn cookie_container(&self) -> &CookieContainer {
        &self.settings.cookie_container
    }

    /// Replaces the cookie container. Only allowed while cookies are used.
    pub fn set_cookie_container(&mut self, container: CookieContainer) -> Result<(), HttpError> {
        if !self.settings.use_cookies {
            return Err(HttpError::invalid_operation("a cookie container can only be set while cookies are used"));
        }
        self.lifecycle.check_configurable()?;
        self.settings.cookie_container = container;
        Ok(())
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.settings.credentials.as_ref()
    }

    pub fn set_credentials(&mut self, credentials: Option<Credentials>) -> Result<(), HttpError> {
        self.lifecycle.check_configurable()?;
        self.settings.credentials = credentials;
        Ok(())
    }

    pub fn use_default_credentials(&self) -> bool {
        self.settings.use_default_credentials
    }

    /// Uses the user info of request uris as credentials.
    pub fn set_use_default_credentials(&mut self, use_default: bool) -> Result<(), HttpError> {
        self.lifecycle.check_configurable()?;
        self.settings.use_default_credentials = use_default;
        Ok(())
    }

    pub fn pre_authenticate(&self) -> bool {
        self.settings.pre_authenticate
    }

    pub fn set_pre_authenticate(&mut self, pre_authenticate: bool) -> Result<(), HttpError> {
        self.lifecycle.check_configurable()?;
        self.settings.pre_authenticate = pre_authenticate;
        Ok(())
    }

    pub fn max_request_content_buffer_size(&self) -> usize {
        self.settings.max_request_content_buffer_size
    }

    /// Limit for buffering request content of unknown length. Zero disables
    /// buffering, so such content can't be sent without chunked transfer.
    pub fn set_max_request_content_buffer_size(&mut self, max_size: usize) -> Result<(), HttpError> {
        if max_size > MAX_BUFFER_SIZE {
            return Err(HttpError::argument(
                "max_request_content_buffer_size",
                format!("must be between 0 and {MAX_BUFFER_SIZE}, got {max_size}"),
            ));
        }
        self.lifecycle.check_configurable()?;
        self.settings.max_request_content_buffer_size = max_size;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), HttpError> {
        if timeout.is_zero() {
            return Err(HttpError::argument("timeout", "must be greater than zero"));
        }
        self.lifecycle.check_configurable()?;
        self.settings.timeout = timeout;
        Ok(())
    }

    fn create_native_request(&self, request: &mut HttpRequestMessage) -> Result<NativeRequest, HttpError> {
        let mut native = NativeRequest::new(request.method().clone(), request.uri().clone())
            .map_err(|e| HttpError::argument("request", e))?;
        native.set_version(request.version()).map_err(|e| HttpError::argument("request", e))?;

        let settings = &self.settings;
        let options = native.options_mut();
        options.allow_auto_redirect = settings.allow_auto_redirect;
        options.max_redirects = settings.max_redirects;
        options.client_certificate = settings.client_certificate;
        options.credentials.clone_from(&settings.credentials);
        options.use_default_credentials = settings.use_default_credentials;
        options.pre_authenticate = settings.pre_authenticate;
        options.cookies = settings.use_cookies.then(|| settings.cookie_container.clone());

        copy_message_headers(request.headers(), &mut native)?;

        if let Some(content) = request.content_mut() {
            let headers = content.headers();
            for (name, value) in headers.iter() {
                native.headers_mut().append(name.clone(), value.clone());
            }
            if !native.options().send_chunked {
                native.options_mut().content_length = headers.content_length();
            }
        }
        Ok(native)
    }

    /// Buffers content of unknown length so it can be sent with a `Content-Length`.
    async fn buffer_unknown_length(
        &self,
        native: &mut NativeRequest,
        content: &mut HttpContent,
        cancel: &CancellationToken,
    ) -> Result<(), HttpError> {
        if native.options().send_chunked || native.options().content_length.is_some() {
            return Ok(());
        }

        let max_size = self.settings.max_request_content_buffer_size;
        if max_size == 0 {
            return Err(HttpError::request(
                "the request content has no known length and buffering it is disabled, use chunked transfer instead",
            ));
        }

        debug!(max_size, "buffer request content of unknown length");
        with_cancellation(cancel, content.load_into_buffer(max_size)).await.map_err(|e| match e {
            e @ HttpError::BufferOverflow { .. } => HttpError::request(e),
            e => e,
        })?;
        native.options_mut().content_length = content.content_length();
        Ok(())
    }

    async fn exchange(
        mut exchange: Exchange,
        content: Option<&mut HttpContent>,
        state: &RequestState,
    ) -> Result<NativeResponse, Failure> {
        if let Some(content) = content {
            let abort = state.abort_handle();
            let mut stream = exchange.request_stream().await.map_err(Failure::Transport)?;
            tokio::select! {
                biased;
                () = abort.aborted() => return Err(Failure::Transport(TransportError::Aborted)),
                result = content.copy_to(&mut stream) => result.map_err(Failure::Content)?,
            }
            trace!("request content sent");
        }

        exchange.get_response().await.map_err(Failure::Transport)
    }

    fn resolve_failure(
        &self,
        failure: Failure,
        request: HttpRequestMessage,
        state: &RequestState,
        cancel: &CancellationToken,
    ) -> Result<HttpResponseMessage, HttpError> {
        let error = match failure {
            Failure::Transport(e) => match e.into_response() {
                Ok(native) => {
                    info!(status = %native.status(), "transport failed with a response, return it");
                    return Ok(create_response(native, request));
                }
                Err(e) => e,
            },
            Failure::Content(e) if cancel.is_cancelled() => {
                debug!(cause = %e, "content failure after caller cancellation");
                return Err(HttpError::Canceled);
            }
            Failure::Content(e @ HttpError::Io { .. }) => return Err(HttpError::request(e)),
            Failure::Content(e) => return Err(e),
        };

        if cancel.is_cancelled() {
            debug!(cause = %error, "transport failure after caller cancellation");
            return Err(HttpError::Canceled);
        }
        if state.is_timed_out() {
            error!(timeout_ms = self.settings.timeout.as_millis(), "request timed out");
            return Err(HttpError::request(format!(
                "the request timed out after {} ms",
                self.settings.timeout.as_millis()
            )));
        }

        error!(uri = %request.uri(), cause = %error, "send request failed");
        Err(HttpError::request(transport_cause(error)))
    }
}

/// Unwraps io failures so a request error holds the io error directly.
fn transport_cause(error: TransportError) -> BoxError {
    match error {
        TransportError::Connect { source }
        | TransportError::Request { source: SendError::Io { source } }
        | TransportError::Response { source: ParseError::Io { source } } => source.into(),
        e => e.into(),
    }
}

/// Copies message headers onto the native request. The four headers with a
/// transport meaning become options, only their remaining tokens are written.
fn copy_message_headers(headers: &HeaderMap, native: &mut NativeRequest) -> Result<(), HttpError> {
    for (name, value) in headers {
        if name == HOST {
            let host = value.to_str().map_err(|e| HttpError::argument("host", e))?;
            native.options_mut().host = Some(host.to_string());
        } else if name == EXPECT {
            if let Some(rest) = remove_token(value, "100-continue", || native.options_mut().expect_continue = true)? {
                native.headers_mut().append(EXPECT, rest);
            }
        } else if name == TRANSFER_ENCODING {
            if is_chunked(Some(value)) {
                native.options_mut().send_chunked = true;
            } else {
                debug!(value = ?value, "transfer coding other than chunked is not applied");
            }
        } else if name == CONNECTION {
            if let Some(rest) = remove_token(value, "close", || native.options_mut().keep_alive = false)? {
                native.headers_mut().append(CONNECTION, rest);
            }
        } else if name != CONTENT_LENGTH {
            native.headers_mut().append(name.clone(), value.clone());
        }
    }
    Ok(())
}

/// Splits `token` out of a comma separated header value, calling `on_found`
/// when present. Returns what is left of the value.
fn remove_token(
    value: &HeaderValue,
    token: &str,
    mut on_found: impl FnMut(),
) -> Result<Option<HeaderValue>, HttpError> {
    let value = value.to_str().map_err(|e| HttpError::argument("header", e))?;
    let mut rest = Vec::new();
    for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        if part.eq_ignore_ascii_case(token) {
            on_found();
        } else {
            rest.push(part);
        }
    }

    if rest.is_empty() {
        return Ok(None);
    }
    HeaderValue::from_str(&rest.join(", ")).map(Some).map_err(|e| HttpError::argument("header", e))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

fn create_response(native: NativeResponse, mut request: HttpRequestMessage) -> HttpResponseMessage {
    let reason_phrase = native.reason_phrase();
    let version = native.version();
    let status = native.status();
    let (head, uri, body) = native.into_parts();

    // HEAD, 204 and 304 carry no body, their declared length still describes the resource
    let length = match body.payload_size() {
        PayloadSize::Empty => declared_length(head.headers()).or(Some(0)),
        _ => body.content_length(),
    };
    let mut content = HttpContent::new(StreamContent::new(body));
    let mut response = HttpResponseMessage::new(status);
    response.set_version(version);
    response.set_reason_phrase(reason_phrase);

    for (name, value) in head.headers() {
        if *name == CONTENT_LENGTH {
            continue;
        }
        if is_content_header(name) {
            content.headers_mut().append(name.clone(), value.clone());
        } else {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
    content.headers_mut().set_content_length(length);
    response.set_content(Some(content));

    request.set_uri(uri);
    response.set_request(Some(request));
    response
}

#[async_trait]
impl HttpMessageHandler for TransportHandler {
    async fn send(
        &self,
        mut request: HttpRequestMessage,
        cancel: CancellationToken,
    ) -> Result<HttpResponseMessage, HttpError> {
        self.lifecycle.start_sending()?;
        if !is_http_uri(request.uri()) {
            return Err(HttpError::argument("request", format!("only absolute http uris can be sent, got `{}`", request.uri())));
        }
        if cancel.is_cancelled() {
            return Err(HttpError::Canceled);
        }

        let mut native = self.create_native_request(&mut request)?;
        if let Some(content) = request.content_mut() {
            self.buffer_unknown_length(&mut native, content, &cancel).await?;
        }

        debug!(method = %native.method(), uri = %native.uri(), "send request");
        let exchange = self.transport.begin(native);
        let state = RequestState::register(exchange.abort_handle(), &cancel, self.settings.timeout);

        match Self::exchange(exchange, request.content_mut(), &state).await {
            Ok(native) => {
                debug!(status = %native.status(), "receive response");
                Ok(create_response(native, request))
            }
            Err(failure) => self.resolve_failure(failure, request, &state, &cancel),
        }
    }

    fn dispose(&self) {
        if self.lifecycle.dispose() {
            debug!("dispose transport handler");
        }
    }
}

impl fmt::Debug for TransportHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandler")
            .field("transport", &self.transport)
            .field("settings", &self.settings)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MultipartFormDataContent, ObjectContent, StringContent};
    use http::header::{CONTENT_TYPE, SET_COOKIE};
    use http::{Method, StatusCode, Uri};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Reads one request, framed by `content-length` or chunked, as head and body.
    async fn read_request(stream: &mut TcpStream) -> (String, Vec<u8>) {
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            if let Some(end) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8(received[..end + 4].to_vec()).unwrap();
                let body = &received[end + 4..];
                let complete = if head.contains("transfer-encoding: chunked\r\n") {
                    body.ends_with(b"0\r\n\r\n")
                } else {
                    let len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length: "))
                        .map_or(0, |len| len.trim().parse::<usize>().unwrap());
                    body.len() >= len
                };
                if complete {
                    return (head, body.to_vec());
                }
            }
            let n = stream.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "client closed early");
            received.extend_from_slice(&buf[..n]);
        }
    }

    /// Serves one canned response per connection and returns what it received.
    async fn serve(responses: Vec<&'static str>) -> (Uri, JoinHandle<Vec<(String, Vec<u8>)>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri: Uri = format!("http://{}/upload", listener.local_addr().unwrap()).parse().unwrap();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            requests
        });
        (uri, handle)
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
    }

    /// Accepts one connection and never answers.
    async fn silent_server() -> Uri {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri: Uri = format!("http://{}/slow", listener.local_addr().unwrap()).parse().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });
        uri
    }

    #[tokio::test]
    async fn sends_multipart_form_data() {
        init_tracing();
        let (uri, server) = serve(vec![indoc::indoc! {"
            HTTP/1.1 200 OK\r
            Content-Type: text/plain\r
            X-Server: test\r
            Set-Cookie: sid=1\r
            Content-Length: 2\r
            \r
            ok"}])
        .await;

        let mut form = MultipartFormDataContent::with_boundary("B").unwrap();
        form.add_with_name(StringContent::new("x"), "field").unwrap();

        let handler = TransportHandler::new();
        let mut response = handler.send(HttpRequestMessage::post(uri, form), CancellationToken::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.reason_phrase(), Some("OK"));
        assert_eq!(response.headers().get("x-server").unwrap(), "test");
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert!(response.headers().contains_key(SET_COOKIE));
        assert_eq!(response.request().unwrap().uri().path(), "/upload");
        assert_eq!(handler.cookie_container().count(), 1);

        let content = response.content_mut().unwrap();
        assert_eq!(content.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(content.headers().content_length(), Some(2));
        assert_eq!(content.read_as_string().await.unwrap(), "ok");

        let requests = server.await.unwrap();
        let (head, body) = &requests[0];
        assert!(head.starts_with("POST /upload HTTP/1.1\r\n"));
        assert!(head.contains("content-type: multipart/form-data; boundary=\"B\"\r\n"));
        assert_eq!(
            body.as_slice(),
            b"--B\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Disposition: form-data; name=field\r\n\r\nx\r\n--B--\r\n"
        );
        assert!(head.contains(&format!("content-length: {}\r\n", body.len())));
    }

    #[tokio::test]
    async fn buffers_content_of_unknown_length() {
        let (uri, server) = serve(vec!["HTTP/1.1 204 No Content\r\n\r\n"]).await;

        let request = HttpRequestMessage::post(uri, ObjectContent::json(serde_json::json!({ "a": 1 })));
        let response = TransportHandler::new().send(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let requests = server.await.unwrap();
        let (head, body) = &requests[0];
        assert!(head.contains("content-length: 7\r\n"));
        assert!(head.contains("content-type: application/json; charset=utf-8\r\n"));
        assert_eq!(body.as_slice(), br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn unknown_length_needs_buffering() {
        let mut handler = TransportHandler::new();
        handler.set_max_request_content_buffer_size(0).unwrap();

        let request = HttpRequestMessage::post(Uri::from_static("http://127.0.0.1:9/"), ObjectContent::json(1));
        let err = handler.send(request, CancellationToken::new()).await.unwrap_err();
        assert!(err.is_request_error());
    }

    #[tokio::test]
    async fn buffer_limit_is_a_request_error() {
        let mut handler = TransportHandler::new();
        handler.set_max_request_content_buffer_size(4).unwrap();

        let request = HttpRequestMessage::post(Uri::from_static("http://127.0.0.1:9/"), ObjectContent::json("too long"));
        let err = handler.send(request, CancellationToken::new()).await.unwrap_err();
        assert!(err.is_request_error());
        assert!(err.to_string().contains("maximum buffer size"));
    }

    #[tokio::test]
    async fn special_headers_become_options() {
        let (uri, server) = serve(vec!["HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"]).await;

        let mut request = HttpRequestMessage::post(uri, StringContent::new("hello"));
        request.headers_mut().insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        request.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        request.headers_mut().insert(HOST, HeaderValue::from_static("virtual.example"));
        TransportHandler::new().send(request, CancellationToken::new()).await.unwrap();

        let requests = server.await.unwrap();
        let (head, body) = &requests[0];
        assert!(head.contains("transfer-encoding: chunked\r\n"));
        assert!(!head.contains("content-length"));
        assert!(head.contains("connection: close\r\n"));
        assert!(head.contains("host: virtual.example\r\n"));
        assert_eq!(body.as_slice(), b"5\r\nhello\r\n0\r\n\r\n");
    }

    #[tokio::test]
    async fn too_many_redirects_returns_last_response() {
        let redirect = "HTTP/1.1 302 Found\r\nLocation: /again\r\nContent-Length: 0\r\n\r\n";
        let (uri, _server) = serve(vec![redirect, redirect]).await;

        let mut handler = TransportHandler::new();
        handler.set_max_redirects(1).unwrap();
        let response =
            handler.send(HttpRequestMessage::new(Method::GET, uri), CancellationToken::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.request().unwrap().uri().path(), "/again");
    }

    #[tokio::test]
    async fn connection_failure_is_a_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri: Uri = format!("http://{}/", listener.local_addr().unwrap()).parse().unwrap();
        drop(listener);

        let handler = TransportHandler::new();
        let err = handler.send(HttpRequestMessage::get(uri), CancellationToken::new()).await.unwrap_err();
        assert!(err.is_request_error());

        let source = std::error::Error::source(&err).unwrap();
        let io = source.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn head_response_keeps_declared_length() {
        let (uri, server) = serve(vec!["HTTP/1.1 200 OK\r\nContent-Length: 1234\r\n\r\n"]).await;

        let request = HttpRequestMessage::new(Method::HEAD, uri);
        let mut response = TransportHandler::new().send(request, CancellationToken::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let content = response.content_mut().unwrap();
        assert_eq!(content.headers().content_length(), Some(1234));
        assert!(content.read_as_bytes().await.unwrap().is_empty());

        let requests = server.await.unwrap();
        assert!(requests[0].0.starts_with("HEAD /upload HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn caller_cancellation_wins() {
        let uri = silent_server().await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = TransportHandler::new().send(HttpRequestMessage::get(uri), cancel).await.unwrap_err();
        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn watchdog_aborts_slow_requests() {
        init_tracing();
        let uri = silent_server().await;
        let mut handler = TransportHandler::new();
        handler.set_timeout(Duration::from_millis(100)).unwrap();

        let err = handler.send(HttpRequestMessage::get(uri), CancellationToken::new()).await.unwrap_err();
        assert!(err.is_request_error());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn configuration_is_frozen_after_first_send() {
        let mut handler = TransportHandler::new();
        assert!(matches!(handler.set_max_redirects(0), Err(HttpError::Argument { .. })));
        assert!(matches!(
            handler.set_max_request_content_buffer_size(MAX_BUFFER_SIZE + 1),
            Err(HttpError::Argument { .. })
        ));

        handler.set_use_cookies(false).unwrap();
        assert!(matches!(handler.set_cookie_container(CookieContainer::new()), Err(HttpError::InvalidOperation { .. })));
        handler.set_use_cookies(true).unwrap();
        handler.set_cookie_container(CookieContainer::new()).unwrap();

        let err = handler.send(HttpRequestMessage::get(Uri::from_static("/relative")), CancellationToken::new()).await;
        assert!(matches!(err, Err(HttpError::Argument { name: "request", .. })));

        assert!(handler.lifecycle().is_started());
        assert!(matches!(handler.set_allow_auto_redirect(false), Err(HttpError::InvalidOperation { .. })));
        assert!(matches!(handler.set_credentials(None), Err(HttpError::InvalidOperation { .. })));

        handler.dispose();
        handler.dispose();
        assert!(handler.set_pre_authenticate(true).unwrap_err().is_disposed());
        let err = handler.send(HttpRequestMessage::get(Uri::from_static("http://example.com/")), CancellationToken::new()).await;
        assert!(err.unwrap_err().is_disposed());
    }
}
