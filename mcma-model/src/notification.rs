use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn notification_type() -> String {
    "Notification".to_string()
}

fn notification_endpoint_type() -> String {
    "NotificationEndpoint".to_string()
}

/// Fire-and-forget payload posted to a notification endpoint, wrapping the
/// resource that changed together with the URL it changed at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "@type", default = "notification_type")]
    pub mcma_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, serde_json::Value>,
}

impl Notification {
    pub fn new(source: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            mcma_type: notification_type(),
            source: source.into(),
            content,
            custom: HashMap::new(),
        }
    }
}

/// Where to post notifications about a resource's progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEndpoint {
    #[serde(rename = "@type", default = "notification_endpoint_type")]
    pub mcma_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_endpoint: String,
}

impl NotificationEndpoint {
    pub fn new(id: impl Into<String>, http_endpoint: impl Into<String>) -> Self {
        Self {
            mcma_type: notification_endpoint_type(),
            id: id.into(),
            http_endpoint: http_endpoint.into(),
        }
    }
}
