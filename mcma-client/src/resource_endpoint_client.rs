use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use mcma_model::{McmaTracker, QueryResults, ResourceEndpoint};

use crate::auth::AuthProvider;
use crate::errors::McmaClientError;
use crate::http_client::{decode_optional, HttpRequest, HttpResponse, McmaHttpClient};
use crate::retry::RetryOptions;
use crate::Result;

/// True when `url` lives under `base`, comparing scheme-insensitively:
/// the protocol scheme is stripped from both sides and the remainder is
/// matched as a case-insensitive prefix.
pub(crate) fn urls_match(base: &str, url: &str) -> bool {
    fn strip_scheme(url: &str) -> &str {
        match url.find("://") {
            Some(index) => &url[index + 3..],
            None => url,
        }
    }
    if base.is_empty() {
        return false;
    }
    strip_scheme(url)
        .to_lowercase()
        .starts_with(&strip_scheme(base).to_lowercase())
}

/// Client for one declared [`ResourceEndpoint`]: resolves relative paths
/// against its base URL and performs typed REST operations through the
/// retrying transport.
///
/// Authentication resolves lazily on first use and is cached: the endpoint's
/// own auth type overrides the owning service's; when neither declares one,
/// calls go out unauthenticated.
pub struct ResourceEndpointClient {
    endpoint: ResourceEndpoint,
    service_auth_type: Option<String>,
    service_auth_context: Option<String>,
    auth_provider: Arc<RwLock<AuthProvider>>,
    http: reqwest::Client,
    tracker: Option<Arc<McmaTracker>>,
    client: OnceCell<McmaHttpClient>,
}

impl ResourceEndpointClient {
    pub fn new(
        endpoint: ResourceEndpoint,
        service_auth_type: Option<String>,
        service_auth_context: Option<String>,
        auth_provider: Arc<RwLock<AuthProvider>>,
        http: reqwest::Client,
        tracker: Option<Arc<McmaTracker>>,
    ) -> Self {
        Self {
            endpoint,
            service_auth_type,
            service_auth_context,
            auth_provider,
            http,
            tracker,
            client: OnceCell::new(),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.endpoint.resource_type
    }

    pub fn http_endpoint(&self) -> &str {
        &self.endpoint.http_endpoint
    }

    /// The auth context this endpoint's calls resolve under, endpoint
    /// declaration first, then the owning service's.
    pub fn auth_context(&self) -> Option<&str> {
        self.endpoint
            .auth_context
            .as_deref()
            .or(self.service_auth_context.as_deref())
    }

    /// Whether this endpoint's base URL owns the given URL.
    pub fn owns_url(&self, url: &str) -> bool {
        urls_match(&self.endpoint.http_endpoint, url)
    }

    /// Resolves a path against the endpoint's base URL. Absolute URLs must
    /// already live under the base; crossing into another endpoint's
    /// namespace is a configuration error.
    pub fn get_full_url(&self, path: &str) -> Result<String> {
        let base = &self.endpoint.http_endpoint;
        if path.is_empty() {
            return Ok(base.clone());
        }
        if path.contains("://") {
            if self.owns_url(path) {
                return Ok(path.to_string());
            }
            return Err(McmaClientError::Configuration(format!(
                "url '{}' is outside resource endpoint '{}'",
                path, base
            )));
        }
        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    fn http_client(&self) -> Result<&McmaHttpClient> {
        self.client.get_or_try_init(|| {
            let auth_type = self
                .endpoint
                .auth_type
                .clone()
                .filter(|t| !t.is_empty())
                .or_else(|| self.service_auth_type.clone().filter(|t| !t.is_empty()));
            let authenticator = match auth_type {
                Some(auth_type) => Some(
                    self.auth_provider
                        .read()
                        .map_err(|_| {
                            McmaClientError::Configuration(
                                "auth provider lock poisoned".to_string(),
                            )
                        })?
                        .get(&auth_type)?,
                ),
                None => None,
            };
            Ok(McmaHttpClient::new(self.http.clone())
                .with_authenticator(authenticator)
                .with_tracker(self.tracker.clone()))
        })
    }

    /// Typed GET; `Ok(None)` when the server answers 404.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.get_full_url(path)?;
        let response = self.http_client()?.get(&url, false).await?;
        decode_optional(response)
    }

    /// Typed POST of a new resource; returns the created resource as echoed
    /// back by the service.
    pub async fn post<T: Serialize + DeserializeOwned>(&self, path: &str, resource: &T) -> Result<T> {
        let url = self.get_full_url(path)?;
        let body = serde_json::to_vec(resource)?;
        let response = self.http_client()?.post(&url, body).await?;
        response.json()
    }

    /// Typed PUT of an updated resource; returns the stored representation.
    pub async fn put<T: Serialize + DeserializeOwned>(&self, path: &str, resource: &T) -> Result<T> {
        let url = self.get_full_url(path)?;
        let body = serde_json::to_vec(resource)?;
        let response = self.http_client()?.put(&url, body).await?;
        response.json()
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.get_full_url(path)?;
        self.http_client()?.delete(&url).await?;
        Ok(())
    }

    /// POST without decoding the response; used for fire-and-forget payloads.
    pub async fn post_raw(&self, path: &str, body: Vec<u8>) -> Result<HttpResponse> {
        let url = self.get_full_url(path)?;
        self.http_client()?.post(&url, body).await
    }

    /// GET against the endpoint with percent-encoded filter parameters,
    /// decoded into the [`QueryResults`] envelope. `retry` overrides the
    /// retry options for this call only.
    pub async fn query_raw(
        &self,
        path: &str,
        filter: &[(String, String)],
        retry: Option<&RetryOptions>,
    ) -> Result<QueryResults> {
        let full_url = self.get_full_url(path)?;
        let mut url = Url::parse(&full_url).map_err(|e| {
            McmaClientError::Configuration(format!("invalid url '{}': {}", full_url, e))
        })?;
        if !filter.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in filter {
                pairs.append_pair(key, value);
            }
        }
        let request = HttpRequest::new(reqwest::Method::GET, url.as_str(), None)?;
        let response = self.http_client()?.send(request, true, retry).await?;
        response.json()
    }

    /// Queries and re-decodes each result into the requested shape.
    pub async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: &[(String, String)],
    ) -> Result<Vec<T>> {
        let envelope = self.query_raw(path, filter, None).await?;
        Ok(envelope.typed()?)
    }

    /// Queries, leaving each result as an untyped key/value map.
    pub async fn query_maps(
        &self,
        path: &str,
        filter: &[(String, String)],
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
        let envelope = self.query_raw(path, filter, None).await?;
        Ok(envelope.typed()?)
    }
}
