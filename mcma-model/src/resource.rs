use serde::de::DeserializeOwned;
use serde::Serialize;

/// A resource that can be managed through the MCMA generic REST protocol.
///
/// Every persisted MCMA entity carries an `@type` discriminator, an `id`
/// holding its own URL, and `dateCreated`/`dateModified` timestamps. The
/// associated `TYPE` is the short resource type name used to look up the
/// endpoint that serves this kind of resource.
pub trait McmaResource: Serialize + DeserializeOwned {
    /// Short resource type name, e.g. `"JobAssignment"`.
    const TYPE: &'static str;

    /// The resource's own URL, when it has been persisted.
    fn id(&self) -> Option<&str>;
}

/// Reduces a namespaced type identifier to its short resource type name.
///
/// Registry records may carry qualified names such as `model.Service` or
/// `mcma::model::Service`; endpoint lookup always happens by the last
/// segment (`Service`).
pub fn short_type_name(name: &str) -> &str {
    let name = name.rsplit("::").next().unwrap_or(name);
    name.rsplit('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_of_plain_identifier_is_unchanged() {
        assert_eq!(short_type_name("JobAssignment"), "JobAssignment");
    }

    #[test]
    fn short_name_strips_dotted_namespace() {
        assert_eq!(short_type_name("model.Service"), "Service");
        assert_eq!(short_type_name("a.b.c.JobProfile"), "JobProfile");
    }

    #[test]
    fn short_name_strips_rust_path_segments() {
        assert_eq!(short_type_name("mcma_model::service::Service"), "Service");
    }
}
