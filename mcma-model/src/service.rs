use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::locator::Locator;
use crate::resource::McmaResource;
use crate::resource_endpoint::ResourceEndpoint;

fn default_type() -> String {
    "Service".to_string()
}

/// A service registered in the service registry, together with the resource
/// types it serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub job_profile_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_locations: Vec<Locator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_locations: Vec<Locator>,
}

impl Service {
    pub fn new(
        name: impl Into<String>,
        auth_type: Option<String>,
        resources: Vec<ResourceEndpoint>,
    ) -> Self {
        Self {
            mcma_type: default_type(),
            id: String::new(),
            date_created: None,
            date_modified: None,
            name: name.into(),
            auth_type,
            auth_context: None,
            resources,
            job_type: None,
            job_profile_ids: Vec::new(),
            input_locations: Vec::new(),
            output_locations: Vec::new(),
        }
    }

    /// A service that processes jobs of the given type against the given
    /// job profiles, reading from and writing to the given locations.
    pub fn for_job_type(
        name: impl Into<String>,
        auth_type: Option<String>,
        resources: Vec<ResourceEndpoint>,
        job_type: impl Into<String>,
        job_profile_ids: Vec<String>,
        input_locations: Vec<Locator>,
        output_locations: Vec<Locator>,
    ) -> Self {
        let mut service = Self::new(name, auth_type, resources);
        service.job_type = Some(job_type.into());
        service.job_profile_ids = job_profile_ids;
        service.input_locations = input_locations;
        service.output_locations = output_locations;
        service
    }

    pub fn with_auth_context(mut self, auth_context: impl Into<String>) -> Self {
        self.auth_context = Some(auth_context.into());
        self
    }
}

impl McmaResource for Service {
    const TYPE: &'static str = "Service";

    fn id(&self) -> Option<&str> {
        if self.id.is_empty() {
            None
        } else {
            Some(&self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_preserves_endpoints_in_order() {
        let service = Service::new(
            "test",
            Some("AWS4".to_string()),
            vec![
                ResourceEndpoint::new("JobAssignment", "https://svc/job-assignments"),
                ResourceEndpoint::new("Widget", "https://svc/widgets").with_auth("McmaApiKey"),
            ],
        );

        let json = serde_json::to_string(&service).unwrap();
        let back: Service = serde_json::from_str(&json).unwrap();

        assert_eq!(back, service);
        assert_eq!(back.auth_type.as_deref(), Some("AWS4"));
        assert_eq!(back.resources[0].resource_type, "JobAssignment");
        assert_eq!(back.resources[1].resource_type, "Widget");
        assert_eq!(back.resources[1].auth_type.as_deref(), Some("McmaApiKey"));
    }

    #[test]
    fn deserializes_registry_record() {
        let json = r#"{
            "@type": "Service",
            "id": "https://registry/services/1",
            "dateCreated": "2021-03-01T10:00:00Z",
            "dateModified": "2021-03-02T10:00:00Z",
            "name": "ame-service",
            "authType": "AWS4",
            "resources": [
                {"@type": "ResourceEndpoint", "resourceType": "AmeJob", "httpEndpoint": "https://ame/jobs"}
            ],
            "jobType": "AmeJob"
        }"#;
        let service: Service = serde_json::from_str(json).unwrap();
        assert_eq!(service.name, "ame-service");
        assert_eq!(service.job_type.as_deref(), Some("AmeJob"));
        assert_eq!(service.resources.len(), 1);
        assert!(service.date_created.is_some());
    }

    #[test]
    fn empty_service_serializes_without_optional_fields() {
        let service = Service::new("bare", None, Vec::new());
        let json = serde_json::to_string(&service).unwrap();
        assert_eq!(json, r#"{"@type":"Service","name":"bare"}"#);
    }
}
