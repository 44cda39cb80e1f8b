//! Remote resource fetching.
//!
//! The [`Fetcher`] trait is the seam between the asset localizer and the
//! network. [`HttpFetcher`] is the production implementation; tests swap in
//! an in-memory mock so no test ever touches the network.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("timed out")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
}

/// Downloads the bytes behind a URL.
///
/// Must be `Sync`: one fetcher is shared by every article sub-pipeline and
/// by the parallel downloads inside each of them.
pub trait Fetcher: Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP fetcher with a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("postsmith/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let bytes = response.bytes().map_err(classify)?;
        Ok(bytes.to_vec())
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Request(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one connection on localhost with `respond`, returning the URL.
    fn serve_once(respond: impl FnOnce(std::net::TcpStream) + Send + 'static) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/pic.png", listener.local_addr().unwrap());
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                respond(stream);
            }
        });
        url
    }

    #[test]
    fn http_fetcher_builds_with_timeout() {
        assert!(HttpFetcher::new(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn status_error_message() {
        assert_eq!(FetchError::Status(404).to_string(), "HTTP 404");
        assert_eq!(FetchError::Timeout.to_string(), "timed out");
    }

    #[test]
    fn silent_server_times_out() {
        let url = serve_once(|stream| {
            // Hold the connection open without answering.
            thread::sleep(Duration::from_secs(3));
            drop(stream);
        });
        let fetcher = HttpFetcher::new(Duration::from_millis(200)).unwrap();

        let err = fetcher.fetch(&url).unwrap_err();
        assert!(matches!(err, FetchError::Timeout), "got {err:?}");
    }

    #[test]
    fn error_status_is_reported() {
        let url = serve_once(|mut stream| {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        });
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let err = fetcher.fetch(&url).unwrap_err();
        assert!(matches!(err, FetchError::Status(404)), "got {err:?}");
    }

    #[test]
    fn successful_response_returns_body() {
        let url = serve_once(|mut stream| {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nbytes",
            );
        });
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        assert_eq!(fetcher.fetch(&url).unwrap(), b"bytes");
    }
}
