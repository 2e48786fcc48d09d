use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock as AsyncRwLock;

use mcma_model::{
    JobProfile, McmaResource, McmaTracker, Notification, NotificationEndpoint, ResourceEndpoint,
    Service,
};

use crate::auth::aws4::{Aws4AuthContext, Aws4Authenticator};
use crate::auth::{AuthProvider, Authenticator, McmaApiKeyAuthenticator};
use crate::errors::McmaClientError;
use crate::http_client::{decode_optional, McmaHttpClient};
use crate::retry::{default_intervals, default_should_retry, RetryOptions};
use crate::service_client::ServiceClient;
use crate::Result;

/// Name of the synthetic registry service; registry records carrying this
/// name are skipped during discovery so the registry is not indexed twice.
const REGISTRY_NAME: &str = "Service Registry";

fn lock_poisoned<E>(_: E) -> McmaClientError {
    McmaClientError::Configuration("lock poisoned".to_string())
}

/// Discovery tolerates a registry that is still warming up: on top of the
/// default classification, 404 answers are retried through the whole table.
fn registry_warmup_retries() -> RetryOptions {
    RetryOptions::new(
        Arc::new(|response, error| {
            default_should_retry(response, error)
                || matches!(response, Some(r) if r.status == reqwest::StatusCode::NOT_FOUND)
        }),
        default_intervals(),
    )
}

/// Top-level facade over the service registry.
///
/// On first use it discovers all registered services and materializes one
/// [`ServiceClient`] per service; generic CRUD/query operations are then
/// dispatched to the endpoint serving the requested resource type, falling
/// back to raw HTTP when no declared endpoint matches. A manager may be
/// shared across tasks; discovery runs exactly once per manager unless the
/// transport client is replaced.
pub struct ResourceManager {
    auth_provider: Arc<RwLock<AuthProvider>>,
    http: RwLock<reqwest::Client>,
    services_url: String,
    services_auth_type: Option<String>,
    services_auth_context: Option<String>,
    tracker: Option<Arc<McmaTracker>>,
    services: AsyncRwLock<Vec<Arc<ServiceClient>>>,
}

impl ResourceManager {
    /// A manager for the registry at `services_url`, which must expose
    /// `{services_url}/services` and `{services_url}/job-profiles`.
    pub fn new(services_url: impl Into<String>) -> Self {
        Self {
            auth_provider: Arc::new(RwLock::new(AuthProvider::new())),
            http: RwLock::new(reqwest::Client::new()),
            services_url: services_url.into(),
            services_auth_type: None,
            services_auth_context: None,
            tracker: None,
            services: AsyncRwLock::new(Vec::new()),
        }
    }

    /// Declares the auth type (and optional context) used when calling the
    /// registry itself.
    pub fn with_registry_auth(
        mut self,
        auth_type: impl Into<String>,
        auth_context: Option<String>,
    ) -> Self {
        self.services_auth_type = Some(auth_type.into());
        self.services_auth_context = auth_context;
        self
    }

    /// Attaches a correlation tracker, forwarded on every outgoing request.
    pub fn with_tracker(mut self, tracker: McmaTracker) -> Self {
        self.tracker = Some(Arc::new(tracker));
        self
    }

    pub fn add_auth(&self, auth_type: &str, authenticator: Arc<dyn Authenticator>) -> Result<()> {
        self.auth_provider
            .write()
            .map_err(lock_poisoned)?
            .add(auth_type, authenticator);
        Ok(())
    }

    pub fn add_api_key_auth(&self, api_key: impl Into<String>) -> Result<()> {
        self.add_auth("McmaApiKey", Arc::new(McmaApiKeyAuthenticator::new(api_key)))
    }

    pub fn add_aws4_auth(&self, context: Aws4AuthContext) -> Result<()> {
        self.add_auth("AWS4", Arc::new(Aws4Authenticator::new(context)?))
    }

    pub fn add_aws4_auth_from_env(&self) -> Result<()> {
        self.add_aws4_auth(Aws4AuthContext::from_env()?)
    }

    /// Replaces the underlying pooled HTTP client and clears the service
    /// list, forcing re-discovery on next use.
    pub async fn set_http_client(&self, client: reqwest::Client) -> Result<()> {
        *self.http.write().map_err(lock_poisoned)? = client;
        self.services.write().await.clear();
        Ok(())
    }

    /// Performs discovery if it has not happened yet. Serialized under the
    /// service-list lock so concurrent first-use calls discover exactly once.
    pub async fn ensure_init(&self) -> Result<()> {
        {
            let services = self.services.read().await;
            if !services.is_empty() {
                return Ok(());
            }
        }
        let mut services = self.services.write().await;
        if !services.is_empty() {
            // another caller won the race
            return Ok(());
        }
        *services = self.discover().await?;
        Ok(())
    }

    /// The synthetic Service record describing the registry itself.
    fn registry_service(&self) -> Service {
        let base = self.services_url.trim_end_matches('/');
        let mut service = Service::new(
            REGISTRY_NAME,
            self.services_auth_type.clone(),
            vec![
                ResourceEndpoint::new(Service::TYPE, format!("{}/services", base)),
                ResourceEndpoint::new(JobProfile::TYPE, format!("{}/job-profiles", base)),
            ],
        );
        service.auth_context = self.services_auth_context.clone();
        service
    }

    async fn discover(&self) -> Result<Vec<Arc<ServiceClient>>> {
        let http = self.http.read().map_err(lock_poisoned)?.clone();
        let registry = Arc::new(ServiceClient::new(
            self.registry_service(),
            self.auth_provider.clone(),
            http.clone(),
            self.tracker.clone(),
        ));
        let services_endpoint = registry
            .resource_endpoint_client(Service::TYPE)
            .ok_or_else(|| {
                McmaClientError::NotFound("service resource endpoint not found".to_string())
            })?;

        info!("discovering services at {}", services_endpoint.http_endpoint());
        let envelope = services_endpoint
            .query_raw("", &[], Some(&registry_warmup_retries()))
            .await?;

        let mut services: Vec<Arc<ServiceClient>> = vec![registry];
        for value in envelope.results {
            let service: Service = serde_json::from_value(value)?;
            if service.name == REGISTRY_NAME {
                continue;
            }
            debug!(
                "discovered service '{}' with {} resource endpoints",
                service.name,
                service.resources.len()
            );
            services.push(Arc::new(ServiceClient::new(
                service,
                self.auth_provider.clone(),
                http.clone(),
                self.tracker.clone(),
            )));
        }
        info!("discovery found {} services", services.len() - 1);
        Ok(services)
    }

    async fn service_clients(&self) -> Result<Vec<Arc<ServiceClient>>> {
        self.ensure_init().await?;
        Ok(self.services.read().await.clone())
    }

    /// Transport for URLs no declared endpoint recognizes, authenticated
    /// with the provider's default authenticator when one exists.
    fn raw_client(&self) -> Result<McmaHttpClient> {
        let http = self.http.read().map_err(lock_poisoned)?.clone();
        let authenticator = self
            .auth_provider
            .read()
            .map_err(lock_poisoned)?
            .default_authenticator();
        Ok(McmaHttpClient::new(http)
            .with_authenticator(authenticator)
            .with_tracker(self.tracker.clone()))
    }

    /// Queries every service exposing the resource type, once per distinct
    /// base URL, and merges the results in discovery order. Endpoints that
    /// fail are dropped unless every matching endpoint failed.
    pub async fn query<T: DeserializeOwned>(
        &self,
        resource_type: &str,
        filter: &[(String, String)],
    ) -> Result<Vec<T>> {
        let services = self.service_clients().await?;
        let mut any_matching = false;
        let mut queried: HashSet<String> = HashSet::new();
        let mut merged: Vec<T> = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        for service in &services {
            let Some(endpoint) = service.resource_endpoint_client(resource_type) else {
                continue;
            };
            let key = endpoint.http_endpoint().to_lowercase();
            if queried.contains(&key) {
                continue;
            }
            any_matching = true;
            match endpoint.query_raw("", filter, None).await {
                Ok(envelope) => {
                    merged.extend(envelope.typed::<T>()?);
                    queried.insert(key);
                }
                Err(e) => {
                    warn!(
                        "query of '{}' at {} failed: {}",
                        resource_type,
                        endpoint.http_endpoint(),
                        e
                    );
                    failures.push(e.to_string());
                }
            }
        }

        if !any_matching {
            return Err(McmaClientError::NotFound(format!(
                "no available resource endpoints for resource of type '{}'",
                resource_type
            )));
        }
        if queried.is_empty() {
            return Err(McmaClientError::QueryFanout(failures.join("\n")));
        }
        Ok(merged)
    }

    /// Fetches a resource by id. When a declared endpoint exposes the type
    /// and owns the id URL the call goes through it; otherwise the id is
    /// fetched directly as an absolute URL. 404 anywhere yields `None`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Option<T>> {
        let services = self.service_clients().await?;
        for service in &services {
            if let Some(endpoint) =
                service.resource_endpoint_client_matching(resource_type, resource_id)
            {
                return endpoint.get(resource_id).await;
            }
        }
        let response = self.raw_client()?.get(resource_id, false).await?;
        decode_optional(response)
    }

    /// Creates a resource on the endpoint declared for its type, or POSTs to
    /// the resource's own id URL when no endpoint matches.
    pub async fn create<T: McmaResource>(&self, resource: &T) -> Result<T> {
        let services = self.service_clients().await?;
        for service in &services {
            if let Some(endpoint) = service.resource_endpoint_client(T::TYPE) {
                return endpoint.post("", resource).await;
            }
        }
        let id = resource
            .id()
            .ok_or_else(|| {
                McmaClientError::Configuration(format!(
                    "no resource endpoint available for type '{}' and no id on resource",
                    T::TYPE
                ))
            })?
            .to_string();
        let body = serde_json::to_vec(resource)?;
        let response = self.raw_client()?.post(&id, body).await?;
        response.json()
    }

    /// Updates a resource, PUT against its id on the declared endpoint when
    /// one exists, else raw PUT to the id URL.
    pub async fn update<T: McmaResource>(&self, resource: &T) -> Result<T> {
        let services = self.service_clients().await?;
        for service in &services {
            if let Some(endpoint) = service.resource_endpoint_client(T::TYPE) {
                return endpoint.put(resource.id().unwrap_or(""), resource).await;
            }
        }
        let id = resource
            .id()
            .ok_or_else(|| {
                McmaClientError::Configuration(format!(
                    "no resource endpoint available for type '{}' and no id on resource",
                    T::TYPE
                ))
            })?
            .to_string();
        let body = serde_json::to_vec(resource)?;
        let response = self.raw_client()?.put(&id, body).await?;
        response.json()
    }

    /// Deletes by id, through the declared endpoint when its base URL is
    /// consistent with the id, else raw DELETE.
    pub async fn delete(&self, resource_type: &str, resource_id: &str) -> Result<()> {
        let services = self.service_clients().await?;
        for service in &services {
            if let Some(endpoint) =
                service.resource_endpoint_client_matching(resource_type, resource_id)
            {
                return endpoint.delete(resource_id).await;
            }
        }
        self.raw_client()?.delete(resource_id).await?;
        Ok(())
    }

    /// Map-shaped variant of [`create`](Self::create): dispatches on the
    /// `"@type"` key and falls back on the `"id"` key.
    pub async fn create_map(
        &self,
        resource: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let type_name = map_type_name(resource)?;
        let value = serde_json::Value::Object(resource.clone());
        let services = self.service_clients().await?;
        for service in &services {
            if let Some(endpoint) = service.resource_endpoint_client(&type_name) {
                let created: serde_json::Value = endpoint.post("", &value).await?;
                return as_object(created);
            }
        }
        let id = map_id(resource).ok_or_else(|| no_endpoint_and_no_id(&type_name))?;
        let response = self.raw_client()?.post(&id, serde_json::to_vec(&value)?).await?;
        as_object(response.json()?)
    }

    /// Map-shaped variant of [`update`](Self::update).
    pub async fn update_map(
        &self,
        resource: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let type_name = map_type_name(resource)?;
        let value = serde_json::Value::Object(resource.clone());
        let services = self.service_clients().await?;
        for service in &services {
            if let Some(endpoint) = service.resource_endpoint_client(&type_name) {
                let path = map_id(resource).unwrap_or_default();
                let updated: serde_json::Value = endpoint.put(&path, &value).await?;
                return as_object(updated);
            }
        }
        let id = map_id(resource).ok_or_else(|| no_endpoint_and_no_id(&type_name))?;
        let response = self.raw_client()?.put(&id, serde_json::to_vec(&value)?).await?;
        as_object(response.json()?)
    }

    /// Wraps `{source, content}` in a Notification and POSTs it to the given
    /// endpoint. Prefers a declared endpoint owning the URL so that
    /// service's authentication and tracking apply; no-op when the endpoint
    /// URL is empty.
    pub async fn send_notification<T: Serialize>(
        &self,
        source_id: &str,
        content: &T,
        notification_endpoint: &NotificationEndpoint,
    ) -> Result<()> {
        if notification_endpoint.http_endpoint.is_empty() {
            debug!("notification endpoint has no url, skipping notification");
            return Ok(());
        }
        let notification = Notification::new(source_id, serde_json::to_value(content)?);
        let body = serde_json::to_vec(&notification)?;

        let services = self.service_clients().await?;
        let endpoint = services
            .iter()
            .find_map(|s| s.endpoint_owning(&notification_endpoint.http_endpoint));
        match endpoint {
            Some(endpoint) => {
                endpoint
                    .post_raw(&notification_endpoint.http_endpoint, body)
                    .await?;
            }
            None => {
                self.raw_client()?
                    .post(&notification_endpoint.http_endpoint, body)
                    .await?;
            }
        }
        Ok(())
    }
}

fn map_type_name(resource: &serde_json::Map<String, serde_json::Value>) -> Result<String> {
    resource
        .get("@type")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            McmaClientError::Configuration(
                "map-shaped resource is missing the '@type' discriminator".to_string(),
            )
        })
}

fn map_id(resource: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    resource
        .get("id")
        .and_then(serde_json::Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn no_endpoint_and_no_id(type_name: &str) -> McmaClientError {
    McmaClientError::Configuration(format!(
        "no resource endpoint available for type '{}' and no id on resource",
        type_name
    ))
}

fn as_object(
    value: serde_json::Value,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    serde_json::from_value(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    fn widget_type() -> String {
        "Widget".to_string()
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Widget {
        #[serde(rename = "@type", default = "widget_type")]
        mcma_type: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        id: String,
        name: String,
    }

    impl Widget {
        fn named(name: &str) -> Self {
            Self {
                mcma_type: widget_type(),
                id: String::new(),
                name: name.to_string(),
            }
        }
    }

    impl McmaResource for Widget {
        const TYPE: &'static str = "Widget";

        fn id(&self) -> Option<&str> {
            if self.id.is_empty() {
                None
            } else {
                Some(&self.id)
            }
        }
    }

    fn widget_service(base: &str) -> serde_json::Value {
        widget_service_at(base, "/widgets")
    }

    fn widget_service_at(base: &str, path: &str) -> serde_json::Value {
        json!({
            "@type": "Service",
            "name": format!("Widget Service{}", path),
            "resources": [
                {"@type": "ResourceEndpoint", "resourceType": "Widget", "httpEndpoint": format!("{}{}", base, path)}
            ]
        })
    }

    async fn mock_registry(
        server: &mut mockito::Server,
        services: serde_json::Value,
    ) -> mockito::Mock {
        server
            .mock("GET", "/services")
            .with_status(200)
            .with_body(json!({ "results": services }).to_string())
            .expect(1)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn create_posts_to_the_endpoint_declared_for_the_type() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        // a registry self-record must be excluded from discovery
        let registry_record = json!({
            "@type": "Service",
            "name": "Service Registry",
            "resources": [
                {"@type": "ResourceEndpoint", "resourceType": "Widget", "httpEndpoint": format!("{}/registry-widgets", base)}
            ]
        });
        let registry = mock_registry(
            &mut server,
            json!([registry_record, widget_service(&base)]),
        )
        .await;
        let wrong = server
            .mock("POST", "/registry-widgets")
            .expect(0)
            .create_async()
            .await;
        let created = json!({"@type": "Widget", "id": format!("{}/widgets/1", base), "name": "x"});
        let post = server
            .mock("POST", "/widgets")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({"@type": "Widget", "name": "x"})))
            .with_status(201)
            .with_body(created.to_string())
            .expect(1)
            .create_async()
            .await;

        let manager = ResourceManager::new(&base);
        let widget = manager.create(&Widget::named("x")).await.unwrap();

        assert_eq!(widget.name, "x");
        assert_eq!(widget.id, format!("{}/widgets/1", base));
        registry.assert_async().await;
        post.assert_async().await;
        wrong.assert_async().await;
    }

    #[tokio::test]
    async fn get_by_full_url_returns_none_when_the_server_answers_404() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        mock_registry(&mut server, json!([widget_service(&base)])).await;
        server
            .mock("GET", "/widgets/123")
            .with_status(404)
            .create_async()
            .await;

        let manager = ResourceManager::new(&base);
        let widget: Option<Widget> = manager
            .get("Widget", &format!("{}/widgets/123", base))
            .await
            .unwrap();
        assert!(widget.is_none());
    }

    #[tokio::test]
    async fn get_falls_back_to_a_raw_fetch_for_unrecognized_urls() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        mock_registry(&mut server, json!([widget_service(&base)])).await;
        let raw = server
            .mock("GET", "/elsewhere/9")
            .with_status(200)
            .with_body(json!({"@type": "Widget", "name": "stray"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let manager = ResourceManager::new(&base);
        let widget: Option<Widget> = manager
            .get("Widget", &format!("{}/elsewhere/9", base))
            .await
            .unwrap();
        assert_eq!(widget.unwrap().name, "stray");
        raw.assert_async().await;
    }

    #[tokio::test]
    async fn query_merges_each_distinct_endpoint_once() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        // two services exposing Widget at the identical base URL
        mock_registry(
            &mut server,
            json!([widget_service(&base), widget_service(&base)]),
        )
        .await;
        let widgets = server
            .mock("GET", "/widgets")
            .with_status(200)
            .with_body(
                json!({"results": [
                    {"@type": "Widget", "name": "a"},
                    {"@type": "Widget", "name": "b"}
                ]})
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let manager = ResourceManager::new(&base);
        let results: Vec<Widget> = manager.query("Widget", &[]).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "a");
        widgets.assert_async().await;
    }

    #[tokio::test]
    async fn query_drops_a_failing_endpoint_when_another_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        mock_registry(
            &mut server,
            json!([
                widget_service_at(&base, "/widgets-a"),
                widget_service_at(&base, "/widgets-b")
            ]),
        )
        .await;
        // a 400 is definitive, so the broken endpoint fails on the first attempt
        let broken = server
            .mock("GET", "/widgets-a")
            .with_status(400)
            .with_body("bad filter")
            .expect(1)
            .create_async()
            .await;
        let healthy = server
            .mock("GET", "/widgets-b")
            .with_status(200)
            .with_body(json!({"results": [{"@type": "Widget", "name": "survivor"}]}).to_string())
            .expect(1)
            .create_async()
            .await;

        let manager = ResourceManager::new(&base);
        let results: Vec<Widget> = manager.query("Widget", &[]).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "survivor");
        broken.assert_async().await;
        healthy.assert_async().await;
    }

    #[tokio::test]
    async fn query_with_every_endpoint_failing_is_a_fanout_error() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        mock_registry(
            &mut server,
            json!([
                widget_service_at(&base, "/widgets-a"),
                widget_service_at(&base, "/widgets-b")
            ]),
        )
        .await;
        for path in ["/widgets-a", "/widgets-b"] {
            server
                .mock("GET", path)
                .with_status(400)
                .with_body("bad filter")
                .expect(1)
                .create_async()
                .await;
        }

        let manager = ResourceManager::new(&base);
        let err = manager.query::<Widget>("Widget", &[]).await.unwrap_err();

        match err {
            McmaClientError::QueryFanout(detail) => {
                // one line per failed endpoint
                assert_eq!(detail.lines().count(), 2);
                assert!(detail.contains("400"));
            }
            other => panic!("expected QueryFanout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn query_of_an_unserved_type_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        mock_registry(&mut server, json!([widget_service(&base)])).await;

        let manager = ResourceManager::new(&base);
        let err = manager.query::<Widget>("Gadget", &[]).await.unwrap_err();
        assert!(matches!(err, McmaClientError::NotFound(_)));
        assert!(err.to_string().contains("Gadget"));
    }

    /// Serves the given statuses one connection at a time, answering 2xx
    /// with a registry envelope. Used where the registry's answer must
    /// change between retries, which mockito cannot sequence.
    async fn serve_registry_statuses(
        statuses: Vec<u16>,
        envelope: serde_json::Value,
    ) -> (String, tokio::task::JoinHandle<usize>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut served = 0;
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let body = if status < 400 {
                    envelope.to_string()
                } else {
                    "not yet".to_string()
                };
                let response = format!(
                    "HTTP/1.1 {} mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                served += 1;
            }
            served
        });
        (base, handle)
    }

    #[tokio::test]
    async fn discovery_retries_through_a_registry_that_is_still_warming_up() {
        let (base, server) =
            serve_registry_statuses(vec![404, 404, 200], json!({"results": []})).await;

        let manager = ResourceManager::new(&base);
        manager.ensure_init().await.unwrap();

        // two 404 answers preceded the successful one
        assert_eq!(server.await.unwrap(), 3);
        assert_eq!(manager.services.read().await.len(), 1); // just the registry
    }

    #[tokio::test]
    async fn concurrent_first_use_discovers_exactly_once() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let registry = mock_registry(&mut server, json!([widget_service(&base)])).await;

        let manager = Arc::new(ResourceManager::new(&base));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.ensure_init().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        registry.assert_async().await;
        assert_eq!(manager.services.read().await.len(), 2); // registry + widget service
    }

    #[tokio::test]
    async fn replacing_the_http_client_rearms_discovery() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let registry = server
            .mock("GET", "/services")
            .with_status(200)
            .with_body(json!({"results": [widget_service(&base)]}).to_string())
            .expect(2)
            .create_async()
            .await;

        let manager = ResourceManager::new(&base);
        manager.ensure_init().await.unwrap();
        manager.set_http_client(reqwest::Client::new()).await.unwrap();
        manager.ensure_init().await.unwrap();

        registry.assert_async().await;
    }

    #[tokio::test]
    async fn create_without_endpoint_or_id_fails_fast() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        mock_registry(&mut server, json!([])).await;

        let manager = ResourceManager::new(&base);
        let err = manager.create(&Widget::named("orphan")).await.unwrap_err();
        assert!(matches!(err, McmaClientError::Configuration(_)));
    }

    #[tokio::test]
    async fn create_map_dispatches_on_the_type_discriminator() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        mock_registry(&mut server, json!([widget_service(&base)])).await;
        let post = server
            .mock("POST", "/widgets")
            .with_status(201)
            .with_body(json!({"@type": "Widget", "id": "1", "name": "m"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let manager = ResourceManager::new(&base);
        let resource = json!({"@type": "Widget", "name": "m"});
        let created = manager
            .create_map(resource.as_object().unwrap())
            .await
            .unwrap();

        assert_eq!(created["name"], "m");
        post.assert_async().await;
    }

    #[tokio::test]
    async fn notification_prefers_the_declared_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        mock_registry(&mut server, json!([widget_service(&base)])).await;
        let notify = server
            .mock("POST", "/widgets/1/notifications")
            .match_body(mockito::Matcher::PartialJson(json!({
                "@type": "Notification",
                "source": format!("{}/widgets/1", base)
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let manager = ResourceManager::new(&base);
        let endpoint =
            NotificationEndpoint::new("", format!("{}/widgets/1/notifications", base));
        manager
            .send_notification(
                &format!("{}/widgets/1", base),
                &Widget::named("x"),
                &endpoint,
            )
            .await
            .unwrap();
        notify.assert_async().await;
    }

    #[tokio::test]
    async fn notification_without_an_endpoint_url_is_a_no_op() {
        let manager = ResourceManager::new("http://registry.invalid");
        let endpoint = NotificationEndpoint::new("", "");
        manager
            .send_notification("source", &Widget::named("x"), &endpoint)
            .await
            .unwrap();
    }
}
