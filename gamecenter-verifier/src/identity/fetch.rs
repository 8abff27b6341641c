use std::future::Future;
use std::time::Duration;

use reqwest::redirect::Policy;
use tracing::debug;

use crate::identity::errors::IdentityError;

/// Transport that downloads raw certificate bytes.
///
/// Implementations must not follow redirects and must not retry.
pub trait CertificateFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, IdentityError>> + Send;
}

/// Fetcher backed by `reqwest` with redirects disabled.
///
/// Key URLs are always built as `https://`. AIA issuer links are commonly plain
/// `http://`, so the client itself accepts both schemes.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = client_builder(timeout).build()?;
        Ok(Self { client })
    }

    #[cfg(test)]
    pub(crate) fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

pub(crate) fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .timeout(timeout)
}

impl CertificateFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IdentityError> {
        debug!(%url, "fetching public key certificate");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IdentityError::AcquisitionFailed(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::AcquisitionFailed(format!(
                "GET {url}: status {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| IdentityError::AcquisitionFailed(format!("read body of {url}: {e}")))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves canned responses on loopback and records every request path.
    async fn serve() -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                log.lock().unwrap().push(path.clone());

                let response = match path.as_str() {
                    "/public-key/gc-prod-9.cer" => {
                        "HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\ncert"
                    }
                    "/moved" => {
                        "HTTP/1.1 302 Found\r\nLocation: /public-key/gc-prod-9.cer\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    }
                    _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (base, seen)
    }

    fn fetcher() -> HttpFetcher {
        let client = client_builder(Duration::from_secs(5))
            .no_proxy()
            .build()
            .unwrap();
        HttpFetcher::from_client(client)
    }

    #[tokio::test]
    async fn success_returns_body() {
        let (base, seen) = serve().await;
        let body = fetcher()
            .fetch(&format!("{base}/public-key/gc-prod-9.cer"))
            .await
            .unwrap();
        assert_eq!(body, b"cert");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redirect_is_a_failure_and_not_followed() {
        let (base, seen) = serve().await;
        let err = fetcher().fetch(&format!("{base}/moved")).await.unwrap_err();
        match err {
            IdentityError::AcquisitionFailed(reason) => assert!(reason.contains("302"), "{reason}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*seen.lock().unwrap(), vec!["/moved".to_string()]);
    }

    #[tokio::test]
    async fn not_found_is_a_failure() {
        let (base, seen) = serve().await;
        let err = fetcher()
            .fetch(&format!("{base}/public-key/gc-prod-0.cer"))
            .await
            .unwrap_err();
        match err {
            IdentityError::AcquisitionFailed(reason) => assert!(reason.contains("404"), "{reason}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = fetcher()
            .fetch(&format!("http://{addr}/public-key/gc-prod-9.cer"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::AcquisitionFailed(_)), "{err:?}");
    }
}
