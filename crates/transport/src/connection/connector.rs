use async_trait::async_trait;
use http::Uri;
use std::io;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// A bidirectional byte stream to an origin server.
pub trait Io: AsyncRead + AsyncWrite + Send + Sync + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Sync + Unpin> Io for T {}

pub type BoxedIo = Box<dyn Io>;

/// How a client certificate is chosen when the origin asks for one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientCertificateOption {
    /// Only certificates configured on the connector are offered.
    #[default]
    Manual,
    /// The connector may pick a certificate on its own.
    Automatic,
}

/// Per connection options forwarded to a [`Connector`].
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub client_certificate: ClientCertificateOption,
}

/// Opens connections to origin servers.
///
/// Secure schemes are the business of a caller supplied connector; the default
/// [`TcpConnector`] only speaks plain `http`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, uri: &Uri, options: &ConnectOptions) -> io::Result<BoxedIo>;
}

/// Plain TCP connector for `http` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, uri: &Uri, options: &ConnectOptions) -> io::Result<BoxedIo> {
        match uri.scheme_str() {
            Some("http") => {}
            Some(scheme) => {
                return Err(io::Error::new(ErrorKind::Unsupported, format!("scheme {scheme} needs a dedicated connector")));
            }
            None => return Err(io::Error::new(ErrorKind::InvalidInput, "uri has no scheme")),
        }

        let host = uri.host().ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "uri has no host"))?;
        // ipv6 literals keep their brackets in the uri
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = uri.port_u16().unwrap_or(80);

        debug!(host, port, client_certificate = ?options.client_certificate, "connecting");
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        info!(remote_addr = %stream.peer_addr()?, "connected");
        Ok(Box::new(stream))
    }
}
