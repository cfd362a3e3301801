//! Small helpers shared by the handlers.

use std::future::Future;

use http::Uri;
use tokio_util::sync::CancellationToken;

use crate::HttpError;

/// True for absolute `http` and `https` uris.
pub fn is_http_uri(uri: &Uri) -> bool {
    matches!(uri.scheme_str(), Some(scheme) if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"))
        && uri.host().is_some()
}

/// Attributes a failure to the caller when it canceled.
///
/// A cancellation the caller did not ask for is a fault and becomes a request
/// error. Any other error is kept.
pub fn fault_or_canceled(error: HttpError, cancel: &CancellationToken) -> HttpError {
    match error {
        HttpError::Canceled if cancel.is_cancelled() => HttpError::Canceled,
        HttpError::Canceled => HttpError::request(HttpError::Canceled),
        error => error,
    }
}

/// Runs `future` until it resolves or `cancel` fires, whichever happens first.
///
/// A future that is already resolved wins over a token canceled afterwards.
pub async fn with_cancellation<F, T>(cancel: &CancellationToken, future: F) -> Result<T, HttpError>
where
    F: Future<Output = Result<T, HttpError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(HttpError::Canceled),
        result = future => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_uris() {
        assert!(is_http_uri(&Uri::from_static("http://example.com/")));
        assert!(is_http_uri(&Uri::from_static("HTTPS://example.com:8443/a?b")));
        assert!(!is_http_uri(&Uri::from_static("ftp://example.com/")));
        assert!(!is_http_uri(&Uri::from_static("/relative")));
    }

    #[test]
    fn caller_cancellation_wins() {
        let cancel = CancellationToken::new();
        assert!(fault_or_canceled(HttpError::Canceled, &cancel).is_request_error());

        cancel.cancel();
        assert!(fault_or_canceled(HttpError::Canceled, &cancel).is_canceled());
        assert!(fault_or_canceled(HttpError::AlreadyRead, &cancel).to_string().contains("already consumed"));
    }

    #[tokio::test]
    async fn canceled_token_stops_pending_future() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), _> = with_cancellation(&cancel, std::future::pending()).await;
        assert!(result.unwrap_err().is_canceled());
    }
}
