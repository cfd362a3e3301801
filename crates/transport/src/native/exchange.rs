use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::header::{AUTHORIZATION, CONNECTION, COOKIE, EXPECT, HOST, LOCATION, WWW_AUTHENTICATE};
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderValue, Method, StatusCode, Uri, header};
use tokio::io::{ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{BoxedIo, ClientConnection, ConnectOptions, Connector, RequestBodyWriter, TcpConnector};
use crate::native::{NativeRequest, NativeResponse};
use crate::protocol::{PayloadSize, RequestHead, ResponseHead, TransportError};

type Connection = ClientConnection<ReadHalf<BoxedIo>, WriteHalf<BoxedIo>>;

/// The request body sink handed out by [`Exchange::request_stream`].
pub type RequestStream<'a> = RequestBodyWriter<'a, WriteHalf<BoxedIo>>;

/// Entry point of the native transport: starts [`Exchange`]s over a [`Connector`].
#[derive(Clone)]
pub struct HttpTransport {
    connector: Arc<dyn Connector>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_connector(TcpConnector)
    }

    pub fn with_connector<C: Connector + 'static>(connector: C) -> Self {
        Self { connector: Arc::new(connector) }
    }

    /// Starts an exchange. Nothing touches the network until the request stream
    /// or the response is asked for.
    pub fn begin(&self, request: NativeRequest) -> Exchange {
        Exchange {
            connector: Arc::clone(&self.connector),
            request,
            connection: None,
            abort: AbortHandle::new(),
            body_started: false,
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

/// Aborts an in-flight [`Exchange`] from anywhere.
///
/// Aborting is idempotent and does nothing once the exchange completed, that
/// is once the response head arrived or the exchange failed.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    token: CancellationToken,
    completed: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the abort. Returns false when the exchange had already completed.
    pub fn abort(&self) -> bool {
        if self.is_completed() {
            return false;
        }
        if !self.token.is_cancelled() {
            info!("abort native exchange");
            self.token.cancel();
        }
        true
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Resolves once [`abort`](Self::abort) was called.
    pub async fn aborted(&self) {
        self.token.cancelled().await;
    }

    fn complete(&self) {
        self.completed.store(true, Ordering::Release);
    }
}

/// One request/response exchange, including the redirect and authentication
/// round trips it triggers.
pub struct Exchange {
    connector: Arc<dyn Connector>,
    request: NativeRequest,
    connection: Option<Connection>,
    abort: AbortHandle,
    body_started: bool,
}

impl Exchange {
    pub fn request(&self) -> &NativeRequest {
        &self.request
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Connects, sends the request head and returns the sink for the request body.
    ///
    /// The body framing must be known up front: either
    /// [`send_chunked`](crate::native::RequestOptions::send_chunked) or a
    /// [`content_length`](crate::native::RequestOptions::content_length) is set.
    pub async fn request_stream(&mut self) -> Result<RequestStream<'_>, TransportError> {
        if self.body_started {
            return Err(TransportError::invalid_operation("the request stream was already acquired"));
        }

        let options = self.request.options();
        let payload_size = match (options.send_chunked, options.content_length) {
            (true, _) => PayloadSize::Chunked,
            (false, Some(length)) => PayloadSize::new_length(length),
            (false, None) => {
                return Err(TransportError::invalid_operation(
                    "content length or chunked transfer must be set before writing the body",
                ));
            }
        };

        let abort = self.abort.clone();
        tokio::select! {
            biased;
            () = abort.aborted() => return Err(TransportError::Aborted),
            result = self.open(payload_size) => result?,
        }
        self.body_started = true;

        let connection = self.connection.as_mut().ok_or_else(|| TransportError::invalid_operation("connection lost"))?;
        Ok(connection.body_writer())
    }

    /// Finishes the request and waits for the final response.
    pub async fn get_response(mut self) -> Result<NativeResponse, TransportError> {
        let abort = self.abort.clone();
        let result = tokio::select! {
            biased;
            () = abort.aborted() => Err(TransportError::Aborted),
            result = self.run() => result,
        };
        abort.complete();

        if let Err(e) = &result {
            warn!(uri = %self.request.uri(), cause = %e, "native exchange failed");
        }
        result
    }

    async fn run(&mut self) -> Result<NativeResponse, TransportError> {
        if self.connection.is_none() {
            let payload_size = self.request.options().content_length.map_or(PayloadSize::Empty, PayloadSize::new_length);
            self.open(payload_size).await?;
        }

        let mut body_sent = self.body_started;
        let mut authenticated = self.request.headers().contains_key(AUTHORIZATION);
        let mut redirects = 0;

        loop {
            let mut connection = self.connection.take().ok_or_else(|| TransportError::invalid_operation("connection lost"))?;
            connection.finish().await?;
            let (head, payload_size) = connection.read_response().await?;
            let uri = self.request.uri().clone();
            debug!(uri = %uri, status = %head.status(), "receive response head");

            if let Some(cookies) = &self.request.options().cookies {
                cookies.set_cookies(&uri, head.headers());
            }

            if let Some(location) = self.redirect_location(&head, body_sent)? {
                let max_redirects = self.request.options().max_redirects;
                if redirects >= max_redirects {
                    warn!(max_redirects, "too many redirects");
                    let response = NativeResponse::new(head, uri, connection.into_body(payload_size));
                    return Err(TransportError::TooManyRedirects { max_redirects, response: Box::new(response) });
                }

                redirects += 1;
                info!(status = %head.status(), from = %uri, to = %location, "follow redirect");
                self.prepare_redirect(head.status(), location);
                body_sent = false;
                authenticated = self.request.headers().contains_key(AUTHORIZATION);
                self.open(PayloadSize::Empty).await?;
                continue;
            }

            if head.status() == StatusCode::UNAUTHORIZED && !authenticated && !body_sent && is_basic_challenge(&head) {
                if let Some(credentials) = self.request.effective_credentials() {
                    info!(uri = %uri, "retry with basic authentication");
                    self.request.headers_mut().insert(AUTHORIZATION, credentials.basic_header()?);
                    authenticated = true;
                    self.open(PayloadSize::Empty).await?;
                    continue;
                }
            }

            return Ok(NativeResponse::new(head, uri, connection.into_body(payload_size)));
        }
    }

    async fn open(&mut self, payload_size: PayloadSize) -> Result<(), TransportError> {
        let uri = self.request.uri().clone();
        let connect_options = ConnectOptions { client_certificate: self.request.options().client_certificate };
        let io = self.connector.connect(&uri, &connect_options).await.map_err(TransportError::connect)?;

        let (reader, writer) = tokio::io::split(io);
        let mut connection = ClientConnection::new(reader, writer);
        connection.send_head(self.build_head(payload_size)?, payload_size).await?;
        self.connection = Some(connection);
        Ok(())
    }

    fn build_head(&self, payload_size: PayloadSize) -> Result<RequestHead, TransportError> {
        let request = &self.request;
        let options = request.options();

        let mut head = RequestHead::new(request.method().clone(), request.uri().clone());
        *head.as_mut().version_mut() = request.version();
        let headers = head.headers_mut();
        headers.clone_from(request.headers());

        if let Some(host) = &options.host {
            headers.insert(HOST, HeaderValue::from_str(host).map_err(TransportError::invalid_uri)?);
        }
        if options.expect_continue && !payload_size.is_empty() {
            headers.insert(EXPECT, HeaderValue::from_static("100-continue"));
        }
        if !options.keep_alive {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }
        if options.pre_authenticate && !headers.contains_key(AUTHORIZATION) {
            if let Some(credentials) = request.effective_credentials() {
                headers.insert(AUTHORIZATION, credentials.basic_header()?);
            }
        }
        if let Some(cookie) = options.cookies.as_ref().and_then(|cookies| cookies.cookie_header(request.uri())) {
            if !headers.contains_key(COOKIE) {
                headers.insert(COOKIE, cookie);
            }
        }
        Ok(head)
    }

    fn redirect_location(&self, head: &ResponseHead, body_sent: bool) -> Result<Option<Uri>, TransportError> {
        if !self.request.options().allow_auto_redirect {
            return Ok(None);
        }

        // a sent body can't be replayed, only redirects that drop it are followed
        match head.status() {
            StatusCode::SEE_OTHER => {}
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND if !body_sent || self.request.method() == Method::POST => {}
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT if !body_sent => {}
            _ => return Ok(None),
        }

        let Some(location) = head.headers().get(LOCATION) else {
            return Ok(None);
        };
        let location = location.to_str().map_err(TransportError::invalid_uri)?;
        resolve_location(self.request.uri(), location).map(Some)
    }

    fn prepare_redirect(&mut self, status: StatusCode, location: Uri) {
        let method = self.request.method().clone();
        let method = match status {
            StatusCode::SEE_OTHER if method != Method::HEAD => Method::GET,
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND if method == Method::POST => Method::GET,
            _ => method,
        };

        let same_origin = self.request.uri().authority() == location.authority();

        let headers = self.request.headers_mut();
        for name in [
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::CONTENT_ENCODING,
            header::CONTENT_LANGUAGE,
            header::CONTENT_LOCATION,
            header::TRANSFER_ENCODING,
            header::HOST,
        ] {
            headers.remove(name);
        }
        if !same_origin {
            headers.remove(AUTHORIZATION);
            headers.remove(COOKIE);
        }

        let options = self.request.options_mut();
        options.content_length = None;
        options.send_chunked = false;
        if !same_origin {
            options.host = None;
        }

        self.request.set_method(method);
        self.request.set_uri(location);
        self.body_started = false;
    }
}

fn is_basic_challenge(head: &ResponseHead) -> bool {
    head.headers().get_all(WWW_AUTHENTICATE).iter().any(|value| {
        value.as_bytes().split(|b| *b == b' ').next().is_some_and(|scheme| scheme.eq_ignore_ascii_case(b"basic"))
    })
}

/// Resolves a `Location` header value against the uri of the request that got redirected.
pub fn resolve_location(base: &Uri, location: &str) -> Result<Uri, TransportError> {
    let location = location.trim();
    if location.is_empty() {
        return Err(TransportError::invalid_uri("empty location"));
    }

    let resolved: Uri = if location.contains("://") {
        location.parse().map_err(TransportError::invalid_uri)?
    } else {
        let scheme = base.scheme().cloned().unwrap_or(Scheme::HTTP);
        if let Some(network_path) = location.strip_prefix("//") {
            format!("{scheme}://{network_path}").parse().map_err(TransportError::invalid_uri)?
        } else {
            let authority: Authority =
                base.authority().cloned().ok_or_else(|| TransportError::invalid_uri("base uri has no authority"))?;
            let path_and_query: PathAndQuery = if location.starts_with('/') {
                location.parse().map_err(TransportError::invalid_uri)?
            } else if location.starts_with('?') {
                format!("{}{location}", base.path()).parse().map_err(TransportError::invalid_uri)?
            } else {
                let directory = base.path().rsplit_once('/').map_or("", |(directory, _)| directory);
                format!("{directory}/{location}").parse().map_err(TransportError::invalid_uri)?
            };
            Uri::builder()
                .scheme(scheme)
                .authority(authority)
                .path_and_query(path_and_query)
                .build()
                .map_err(TransportError::invalid_uri)?
        }
    };

    match resolved.scheme_str() {
        Some("http" | "https") => Ok(resolved),
        _ => Err(TransportError::invalid_uri(format!("redirect to unsupported uri {resolved}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{CookieContainer, Credentials};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Reads a request head and the `content-length` body following it.
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            if let Some(end) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8(received[..end + 4].to_vec()).unwrap();
                let body_len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length: "))
                    .map_or(0, |len| len.trim().parse::<usize>().unwrap());
                if received.len() >= end + 4 + body_len {
                    return head;
                }
            }
            let n = stream.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "client closed early");
            received.extend_from_slice(&buf[..n]);
        }
    }

    /// Serves one canned response per connection and returns the received request heads.
    async fn serve(responses: Vec<&'static str>) -> (Uri, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri: Uri = format!("http://{}/", listener.local_addr().unwrap()).parse().unwrap();

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

    #[test]
    fn resolves_locations() {
        let base = Uri::from_static("http://example.com/a/b?x=1");
        assert_eq!(resolve_location(&base, "/c").unwrap(), "http://example.com/c");
        assert_eq!(resolve_location(&base, "c?y=2").unwrap(), "http://example.com/a/c?y=2");
        assert_eq!(resolve_location(&base, "//other.com/d").unwrap(), "http://other.com/d");
        assert_eq!(resolve_location(&base, "https://secure.com/").unwrap(), "https://secure.com/");
        assert!(resolve_location(&base, "ftp://files.com/").is_err());
    }

    #[test]
    fn abort_after_completion_is_noop() {
        let abort = AbortHandle::new();
        abort.complete();
        assert!(!abort.abort());
        assert!(!abort.is_aborted());

        let abort = AbortHandle::new();
        assert!(abort.abort());
        assert!(abort.abort());
        assert!(abort.is_aborted());
    }

    #[tokio::test]
    async fn follows_see_other_as_get() {
        let (uri, server) = serve(vec![
            "HTTP/1.1 303 See Other\r\nLocation: /done\r\nContent-Length: 0\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone",
        ])
        .await;

        let mut request = NativeRequest::new(Method::POST, uri).unwrap();
        request.options_mut().content_length = Some(3);
        let mut exchange = HttpTransport::new().begin(request);
        exchange.request_stream().await.unwrap().write_all(b"abc").await.unwrap();

        let mut response = exchange.get_response().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.uri().path(), "/done");

        let mut body = String::new();
        response.body_mut().read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "done");

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST / HTTP/1.1\r\n"));
        assert!(requests[1].starts_with("GET /done HTTP/1.1\r\n"));
        assert!(!requests[1].contains("content-length: 3"));
    }

    #[tokio::test]
    async fn keeps_moved_response_when_put_body_was_sent() {
        let (uri, server) =
            serve(vec!["HTTP/1.1 301 Moved Permanently\r\nLocation: /new\r\nContent-Length: 0\r\n\r\n"]).await;

        let mut request = NativeRequest::new(Method::PUT, uri).unwrap();
        request.options_mut().content_length = Some(7);
        let mut exchange = HttpTransport::new().begin(request);
        exchange.request_stream().await.unwrap().write_all(b"payload").await.unwrap();

        let response = exchange.get_response().await.unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.uri().path(), "/");

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("PUT / HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn follows_found_for_put_without_body() {
        let (uri, server) = serve(vec![
            "HTTP/1.1 302 Found\r\nLocation: /new\r\nContent-Length: 0\r\n\r\n",
            "HTTP/1.1 204 No Content\r\n\r\n",
        ])
        .await;

        let request = NativeRequest::new(Method::PUT, uri).unwrap();
        let response = HttpTransport::new().begin(request).get_response().await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let requests = server.await.unwrap();
        assert!(requests[1].starts_with("PUT /new HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn too_many_redirects_keeps_last_response() {
        let redirect = "HTTP/1.1 302 Found\r\nLocation: /again\r\nContent-Length: 0\r\n\r\n";
        let (uri, _server) = serve(vec![redirect, redirect]).await;

        let mut request = NativeRequest::new(Method::GET, uri).unwrap();
        request.options_mut().max_redirects = 1;

        let err = HttpTransport::new().begin(request).get_response().await.unwrap_err();
        assert!(matches!(err, TransportError::TooManyRedirects { max_redirects: 1, .. }));
        assert_eq!(err.into_response().unwrap().status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn retries_basic_challenge_and_keeps_cookies() {
        let (uri, server) = serve(vec![
            "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"test\"\r\nSet-Cookie: sid=1\r\nContent-Length: 0\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
        ])
        .await;

        let cookies = CookieContainer::new();
        let mut request = NativeRequest::new(Method::GET, uri).unwrap();
        request.options_mut().credentials = Some(Credentials::new("user", "pw"));
        request.options_mut().cookies = Some(cookies.clone());

        let response = HttpTransport::new().begin(request).get_response().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cookies.count(), 1);

        let requests = server.await.unwrap();
        assert!(!requests[0].contains("authorization"));
        assert!(requests[1].contains("authorization: Basic dXNlcjpwdw==\r\n"));
        assert!(requests[1].contains("cookie: sid=1\r\n"));
    }

    #[tokio::test]
    async fn abort_while_waiting_for_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri: Uri = format!("http://{}/slow", listener.local_addr().unwrap()).parse().unwrap();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            drop(stream);
        });

        let exchange = HttpTransport::new().begin(NativeRequest::new(Method::GET, uri).unwrap());
        let abort = exchange.abort_handle();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            abort.abort();
        });

        let err = exchange.get_response().await.unwrap_err();
        assert!(err.is_aborted());
    }
}
