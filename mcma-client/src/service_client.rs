use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;

use mcma_model::{short_type_name, McmaTracker, Service};

use crate::auth::AuthProvider;
use crate::resource_endpoint_client::ResourceEndpointClient;

/// Wraps one registered [`Service`] and hands out
/// [`ResourceEndpointClient`]s for the resource types it declares.
///
/// The endpoint list builds lazily on first access; each endpoint inherits
/// the service's auth type and auth context as fallback.
pub struct ServiceClient {
    service: Service,
    auth_provider: Arc<RwLock<AuthProvider>>,
    http: reqwest::Client,
    tracker: Option<Arc<McmaTracker>>,
    endpoints: OnceCell<Vec<Arc<ResourceEndpointClient>>>,
}

impl ServiceClient {
    pub fn new(
        service: Service,
        auth_provider: Arc<RwLock<AuthProvider>>,
        http: reqwest::Client,
        tracker: Option<Arc<McmaTracker>>,
    ) -> Self {
        Self {
            service,
            auth_provider,
            http,
            tracker,
            endpoints: OnceCell::new(),
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn name(&self) -> &str {
        &self.service.name
    }

    fn endpoints(&self) -> &[Arc<ResourceEndpointClient>] {
        self.endpoints.get_or_init(|| {
            self.service
                .resources
                .iter()
                .map(|endpoint| {
                    Arc::new(ResourceEndpointClient::new(
                        endpoint.clone(),
                        self.service.auth_type.clone(),
                        self.service.auth_context.clone(),
                        self.auth_provider.clone(),
                        self.http.clone(),
                        self.tracker.clone(),
                    ))
                })
                .collect()
        })
    }

    /// The endpoint serving the given resource type, matched by short type
    /// name (namespaced identifiers are reduced on both sides). When a
    /// service declares the same type twice, the first declaration wins.
    pub fn resource_endpoint_client(
        &self,
        resource_type: &str,
    ) -> Option<Arc<ResourceEndpointClient>> {
        let short = short_type_name(resource_type);
        self.endpoints()
            .iter()
            .find(|e| short_type_name(e.resource_type()) == short)
            .cloned()
    }

    /// Like [`resource_endpoint_client`](Self::resource_endpoint_client),
    /// but the endpoint's base URL must also own `url`. Disambiguates when
    /// multiple services expose the same type at different endpoints.
    pub fn resource_endpoint_client_matching(
        &self,
        resource_type: &str,
        url: &str,
    ) -> Option<Arc<ResourceEndpointClient>> {
        let short = short_type_name(resource_type);
        self.endpoints()
            .iter()
            .find(|e| short_type_name(e.resource_type()) == short && e.owns_url(url))
            .cloned()
    }

    /// Any endpoint of this service whose base URL owns the given URL.
    pub fn endpoint_owning(&self, url: &str) -> Option<Arc<ResourceEndpointClient>> {
        self.endpoints().iter().find(|e| e.owns_url(url)).cloned()
    }
}
