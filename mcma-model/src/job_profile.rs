use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::McmaResource;

fn default_type() -> String {
    "JobProfile".to_string()
}

/// A named input/output parameter of a job profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobParameter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameter_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameter_type: String,
}

impl JobParameter {
    pub fn new(parameter_name: impl Into<String>, parameter_type: impl Into<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            parameter_type: parameter_type.into(),
        }
    }
}

/// Describes a kind of job a service can run, with its expected parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobProfile {
    #[serde(rename = "@type", default = "default_type")]
    pub mcma_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_parameters: Vec<JobParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_parameters: Vec<JobParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_input_parameters: Vec<JobParameter>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_properties: HashMap<String, serde_json::Value>,
}

impl JobProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            mcma_type: default_type(),
            id: String::new(),
            date_created: None,
            date_modified: None,
            name: name.into(),
            input_parameters: Vec::new(),
            output_parameters: Vec::new(),
            optional_input_parameters: Vec::new(),
            custom_properties: HashMap::new(),
        }
    }
}

impl McmaResource for JobProfile {
    const TYPE: &'static str = "JobProfile";

    fn id(&self) -> Option<&str> {
        if self.id.is_empty() {
            None
        } else {
            Some(&self.id)
        }
    }
}
