use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_type() -> String {
    "McmaTracker".to_string()
}

/// Correlation context forwarded on every outgoing request of one logical
/// operation, carried as a base64-encoded JSON header.
///
/// A tracker is immutable after construction and shared by `Arc` across all
/// calls it correlates; clone it if a call needs per-call customization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct McmaTracker {
    #[serde(rename = "@type", default = "default_type")]
    pub mcma_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, String>,
}

impl McmaTracker {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            mcma_type: default_type(),
            id: id.into(),
            label: label.into(),
            custom: HashMap::new(),
        }
    }

    pub fn with_custom(mut self, custom: HashMap<String, String>) -> Self {
        self.custom = custom;
        self
    }
}
