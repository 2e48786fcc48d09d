pub mod aws4;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::McmaClientError;
use crate::http_client::HttpRequest;
use crate::Result;

/// Header carrying the static MCMA API key.
pub const API_KEY_HEADER: &str = "x-mcma-api-key";

/// Per-scheme request mutation; typically adds or overwrites headers on the
/// outgoing request. Signing may fail (for example on missing credentials),
/// which is a configuration error and never retried.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &mut HttpRequest) -> Result<()>;
}

/// Maps auth type names to authenticators; lookup is case-insensitive.
///
/// While exactly one authenticator is registered it doubles as the default,
/// used for calls that declare no auth type (such as raw fallback HTTP).
/// Registering a second authenticator clears the default.
#[derive(Default)]
pub struct AuthProvider {
    authenticators: HashMap<String, Arc<dyn Authenticator>>,
}

impl AuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, auth_type: &str, authenticator: Arc<dyn Authenticator>) {
        self.authenticators
            .insert(auth_type.to_lowercase(), authenticator);
    }

    pub fn get(&self, auth_type: &str) -> Result<Arc<dyn Authenticator>> {
        self.authenticators
            .get(&auth_type.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                McmaClientError::NotFound(format!(
                    "no authenticator registered for auth type '{}'",
                    auth_type
                ))
            })
    }

    /// The sole registered authenticator, if exactly one exists.
    pub fn default_authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        if self.authenticators.len() == 1 {
            self.authenticators.values().next().cloned()
        } else {
            None
        }
    }
}

/// Static-credential header signer: sets `x-mcma-api-key`.
pub struct McmaApiKeyAuthenticator {
    api_key: String,
}

impl McmaApiKeyAuthenticator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Authenticator for McmaApiKeyAuthenticator {
    async fn authenticate(&self, request: &mut HttpRequest) -> Result<()> {
        let value = reqwest::header::HeaderValue::from_str(&self.api_key)
            .map_err(|e| McmaClientError::Configuration(format!("invalid api key: {}", e)))?;
        request.headers.insert(API_KEY_HEADER, value);
        Ok(())
    }
}
