pub mod auth;
pub mod errors;
pub mod http_client;
pub mod resource_endpoint_client;
pub mod resource_manager;
pub mod retry;
pub mod service_client;

// Re-export key types
pub use auth::aws4::{Aws4AuthContext, Aws4Authenticator};
pub use auth::{Authenticator, AuthProvider, McmaApiKeyAuthenticator};
pub use errors::McmaClientError;
pub use http_client::{HttpRequest, HttpResponse, McmaHttpClient};
pub use resource_endpoint_client::ResourceEndpointClient;
pub use resource_manager::ResourceManager;
pub use retry::RetryOptions;
pub use service_client::ServiceClient;

pub type Result<T> = std::result::Result<T, McmaClientError>;
