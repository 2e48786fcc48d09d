use std::sync::Arc;
use std::time::Instant;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use mcma_model::McmaTracker;

use crate::auth::Authenticator;
use crate::errors::McmaClientError;
use crate::retry::RetryOptions;
use crate::Result;

/// Header carrying the base64-encoded JSON tracker on every outgoing request.
pub const TRACKER_HEADER: &str = "mcma-tracker";

/// An outgoing request before execution. Bodies are owned byte buffers so
/// they replay identically across retries and can be hashed by signers.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| McmaClientError::Configuration(format!("invalid url '{}': {}", url, e)))?;
        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            body,
        })
    }

    fn set_header(&mut self, name: &'static str, value: &str) -> Result<()> {
        let value = HeaderValue::from_str(value).map_err(|e| {
            McmaClientError::Configuration(format!("invalid value for header '{}': {}", name, e))
        })?;
        self.headers.insert(name, value);
        Ok(())
    }
}

/// A fully read response: status plus body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Decodes the body as JSON into the requested shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Into::into)
    }

    /// The body as text, for diagnostics.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Decodes a response into `Some(T)`, or `None` for a suppressed 404 or an
/// empty body (absence, not failure).
pub(crate) fn decode_optional<T: DeserializeOwned>(response: HttpResponse) -> Result<Option<T>> {
    if response.status == StatusCode::NOT_FOUND || response.body.is_empty() {
        return Ok(None);
    }
    Ok(Some(response.json()?))
}

/// Transport client: wraps the pooled [`reqwest::Client`], attaches the
/// tracker header and authentication, executes with retry, and classifies
/// the final outcome.
#[derive(Clone)]
pub struct McmaHttpClient {
    client: reqwest::Client,
    authenticator: Option<Arc<dyn Authenticator>>,
    tracker: Option<Arc<McmaTracker>>,
    retry: RetryOptions,
}

impl McmaHttpClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            authenticator: None,
            tracker: None,
            retry: RetryOptions::default(),
        }
    }

    pub fn with_authenticator(mut self, authenticator: Option<Arc<dyn Authenticator>>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_tracker(mut self, tracker: Option<Arc<McmaTracker>>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub async fn get(&self, url: &str, throw_on_404: bool) -> Result<HttpResponse> {
        let request = HttpRequest::new(Method::GET, url, None)?;
        self.send(request, throw_on_404, None).await
    }

    pub async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(Method::POST, url, Some(body))?;
        request.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.send(request, true, None).await
    }

    pub async fn put(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(Method::PUT, url, Some(body))?;
        request.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.send(request, true, None).await
    }

    pub async fn delete(&self, url: &str) -> Result<HttpResponse> {
        let request = HttpRequest::new(Method::DELETE, url, None)?;
        self.send(request, true, None).await
    }

    /// Executes a request with retry and classifies the final outcome.
    ///
    /// A 404 is returned as a plain response when `throw_on_404` is false so
    /// the caller can distinguish absence from failure. `retry` overrides the
    /// client-wide retry options for this call only.
    pub async fn send(
        &self,
        mut request: HttpRequest,
        throw_on_404: bool,
        retry: Option<&RetryOptions>,
    ) -> Result<HttpResponse> {
        let retry = retry.cloned().unwrap_or_else(|| self.retry.clone());
        let started = Instant::now();
        let method = request.method.to_string();
        let url = request.url.to_string();

        if let Some(tracker) = &self.tracker {
            let tracker_json = serde_json::to_vec(tracker.as_ref())?;
            request.set_header(TRACKER_HEADER, &STANDARD.encode(tracker_json))?;
        }

        let mut outcome = self.attempt(&mut request).await?;
        let mut attempt = 0;
        while (retry.should_retry)(outcome.as_ref().ok(), outcome.as_ref().err())
            && attempt < retry.intervals.len()
        {
            let interval = retry.intervals[attempt];
            match &outcome {
                Ok(response) => warn!(
                    "{} {} answered {}, retrying in {:?} ({}/{})",
                    method,
                    url,
                    response.status,
                    interval,
                    attempt + 1,
                    retry.intervals.len()
                ),
                Err(e) => warn!(
                    "{} {} failed ({}), retrying in {:?} ({}/{})",
                    method,
                    url,
                    e,
                    interval,
                    attempt + 1,
                    retry.intervals.len()
                ),
            }
            tokio::time::sleep(interval).await;
            outcome = self.attempt(&mut request).await?;
            attempt += 1;
        }

        let response = outcome.map_err(McmaClientError::Transport)?;
        let status = response.status.as_u16();
        if status < 400 || (status == 404 && !throw_on_404) {
            debug!("{} {} -> {}", method, url, response.status);
            return Ok(response);
        }
        // non-5xx/429 is terminal; no retries happened for it
        if status < 500 && status != 429 {
            return Err(McmaClientError::Remote {
                method,
                url,
                status,
                body: response.text(),
            });
        }
        // 5xx/429 here means the whole backoff table was consumed
        Err(McmaClientError::RetriesExhausted {
            method,
            url,
            status,
            body: response.text(),
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    /// One authenticated attempt. Authentication failures are configuration
    /// errors and propagate immediately; transport failures feed the retry
    /// predicate.
    async fn attempt(
        &self,
        request: &mut HttpRequest,
    ) -> Result<std::result::Result<HttpResponse, reqwest::Error>> {
        if let Some(authenticator) = &self.authenticator {
            // re-sign every attempt: signatures are time-bounded
            authenticator.authenticate(request).await?;
        }

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status();
                match response.bytes().await {
                    Ok(bytes) => Ok(Ok(HttpResponse {
                        status,
                        body: bytes.to_vec(),
                    })),
                    Err(e) => Ok(Err(e)),
                }
            }
            Err(e) => Ok(Err(e)),
        }
    }
}
