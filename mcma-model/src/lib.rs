pub mod job_profile;
pub mod locator;
pub mod notification;
pub mod query_results;
pub mod resource;
pub mod resource_endpoint;
pub mod service;
pub mod tracker;

// Re-export key types
pub use job_profile::{JobParameter, JobProfile};
pub use locator::Locator;
pub use notification::{Notification, NotificationEndpoint};
pub use query_results::QueryResults;
pub use resource::{short_type_name, McmaResource};
pub use resource_endpoint::ResourceEndpoint;
pub use service::Service;
pub use tracker::McmaTracker;
