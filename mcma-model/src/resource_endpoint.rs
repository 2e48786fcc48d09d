use serde::{Deserialize, Serialize};

fn default_type() -> String {
    "ResourceEndpoint".to_string()
}

/// One resource type exposed by a service at a base URL.
///
/// `auth_type` and `auth_context`, when absent, inherit the values declared
/// on the owning [`Service`](crate::Service).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEndpoint {
    #[serde(rename = "@type", default = "default_type")]
    pub mcma_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_context: Option<String>,
}

impl ResourceEndpoint {
    pub fn new(resource_type: impl Into<String>, http_endpoint: impl Into<String>) -> Self {
        Self {
            mcma_type: default_type(),
            resource_type: resource_type.into(),
            http_endpoint: http_endpoint.into(),
            auth_type: None,
            auth_context: None,
        }
    }

    pub fn with_auth(mut self, auth_type: impl Into<String>) -> Self {
        self.auth_type = Some(auth_type.into());
        self
    }
}
