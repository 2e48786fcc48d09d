use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Envelope returned by a query against a resource endpoint.
///
/// Results are kept opaque until projected into a concrete shape with
/// [`typed`](QueryResults::typed). The continuation token is carried but
/// never followed automatically; pagination is caller-driven.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_start_token: Option<String>,
}

impl QueryResults {
    /// Re-decodes each opaque result into the requested shape.
    pub fn typed<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        self.results
            .iter()
            .map(|value| serde_json::from_value(value.clone()))
            .collect()
    }
}
