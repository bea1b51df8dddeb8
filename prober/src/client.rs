use std::future::Future;

use bytes::Bytes;
use counter_util::drain::DrainBodyFuture;
use counter_util::empty_body;
use http_body_util::Full;
use hyper::header::CONTENT_LENGTH;
use hyper::{Request, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::RequestError;

const DEFAULT_BODY_HINT: usize = 64;
const MAX_BODY_HINT: usize = 64 * 1024;

/// Something that yields one counter reading per call.
pub trait CounterSource: Clone + Send + 'static {
    fn fetch_counter(&self) -> impl Future<Output = Result<i64, RequestError>> + Send;
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpsConnector::new());
        Self { client }
    }

    /// Sends a bare GET and returns the full body. The status code is not inspected.
    ///
    /// # Errors
    /// Fails when the request cannot be sent or the body cannot be read.
    pub async fn get(&self, uri: &Uri) -> Result<Vec<u8>, RequestError> {
        let request = Request::get(uri.clone())
            .body(empty_body())
            .map_err(|source| RequestError::Build { source })?;
        let resp = self
            .client
            .request(request)
            .await
            .map_err(|source| RequestError::Transport { source })?;
        let content_length: usize = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|hv| hv.to_str().ok())
            .and_then(|hv| hv.parse().ok())
            .unwrap_or(DEFAULT_BODY_HINT);
        DrainBodyFuture::with_size_hint(resp.into_body(), content_length.min(MAX_BODY_HINT))
            .await
            .map_err(|source| RequestError::Body { source })
    }
}

/// Reads the counter from the `data` field of a JSON object body.
///
/// # Errors
/// Fails for non-JSON bodies, a missing `data` field, or a `data` value that
/// is not an `i64`.
pub fn parse_counter(body: &[u8]) -> Result<i64, RequestError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|source| RequestError::Json { source })?;
    let data = value.get("data").ok_or(RequestError::MissingCounter)?;
    data.as_i64()
        .ok_or_else(|| RequestError::NotInteger { value: data.clone() })
}

/// GETs a fixed URL and parses the counter out of each response.
#[derive(Clone)]
pub struct HttpCounterSource {
    client: HttpClient,
    url: Uri,
}

impl HttpCounterSource {
    #[must_use]
    pub fn new(client: HttpClient, url: Uri) -> Self {
        Self { client, url }
    }
}

impl CounterSource for HttpCounterSource {
    fn fetch_counter(&self) -> impl Future<Output = Result<i64, RequestError>> + Send {
        async move {
            let body = self.client.get(&self.url).await?;
            tracing::trace!(bytes = body.len(), "response body read");
            parse_counter(&body)
        }
    }
}
