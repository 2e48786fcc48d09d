use serde::{Deserialize, Serialize};

fn default_type() -> String {
    "Locator".to_string()
}

/// Points at a media essence or other file by URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
    #[serde(rename = "@type", default = "default_type")]
    pub mcma_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

impl Locator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            mcma_type: default_type(),
            url: url.into(),
        }
    }
}
