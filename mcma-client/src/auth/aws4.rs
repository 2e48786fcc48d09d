use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::auth::Authenticator;
use crate::errors::McmaClientError;
use crate::http_client::HttpRequest;
use crate::Result;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_SERVICE: &str = "execute-api";

/// Strongly-typed configuration for AWS Signature V4 signing.
#[derive(Debug, Clone)]
pub struct Aws4AuthContext {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

impl Aws4AuthContext {
    pub fn from_keys(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: Option<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token,
            region: region.into(),
        }
    }

    /// Reads credentials and region from the standard AWS environment
    /// variables, with `AWS_DEFAULT_REGION` as the region fallback.
    pub fn from_env() -> Result<Self> {
        let access_key = env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
            McmaClientError::Configuration("AWS_ACCESS_KEY_ID is not set".to_string())
        })?;
        let secret_key = env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            McmaClientError::Configuration("AWS_SECRET_ACCESS_KEY is not set".to_string())
        })?;
        let session_token = env::var("AWS_SESSION_TOKEN").ok();
        let region = env::var("AWS_REGION")
            .or_else(|_| env::var("AWS_DEFAULT_REGION"))
            .map_err(|_| {
                McmaClientError::Configuration(
                    "neither AWS_REGION nor AWS_DEFAULT_REGION is set".to_string(),
                )
            })?;
        Ok(Self {
            access_key,
            secret_key,
            session_token,
            region,
        })
    }
}

/// AWS Signature V4 request signer for API Gateway (`execute-api`).
///
/// Computes a canonical request over method, path, query, signed headers and
/// the SHA-256 of the exact body bytes the transport will send, then sets
/// `X-Amz-Date`, `Authorization` and, for temporary credentials,
/// `X-Amz-Security-Token`.
pub struct Aws4Authenticator {
    context: Aws4AuthContext,
    service: String,
}

impl Aws4Authenticator {
    pub fn new(context: Aws4AuthContext) -> Result<Self> {
        if context.access_key.is_empty() || context.secret_key.is_empty() {
            return Err(McmaClientError::Configuration(
                "AWS4 signing requires an access key and a secret key".to_string(),
            ));
        }
        if context.region.is_empty() {
            return Err(McmaClientError::Configuration(
                "AWS4 signing requires a region".to_string(),
            ));
        }
        Ok(Self {
            context,
            service: SIGNED_SERVICE.to_string(),
        })
    }

    fn sign_at(&self, request: &mut HttpRequest, now: DateTime<Utc>) -> Result<()> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let host = request.url.host_str().ok_or_else(|| {
            McmaClientError::Configuration(format!("url '{}' has no host to sign", request.url))
        })?;
        let host = match request.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let payload_hash = hex::encode(Sha256::digest(request.body.as_deref().unwrap_or(&[])));
        let canonical_uri = match request.url.path() {
            "" => "/",
            path => path,
        };
        let canonical_query = canonical_query_string(&request.url);

        // canonical headers sorted by name: host, x-amz-date, x-amz-security-token
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = String::from("host;x-amz-date");
        if let Some(token) = &self.context.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method, canonical_uri, canonical_query, canonical_headers, signed_headers,
            payload_hash
        );

        let scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.context.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = derive_signing_key(
            &self.context.secret_key,
            &date_stamp,
            &self.context.region,
            &self.service,
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.context.access_key, scope, signed_headers, signature
        );

        set_header(request, "x-amz-date", &amz_date)?;
        if let Some(token) = &self.context.session_token {
            set_header(request, "x-amz-security-token", token)?;
        }
        set_header(request, "authorization", &authorization)?;
        Ok(())
    }
}

#[async_trait]
impl Authenticator for Aws4Authenticator {
    async fn authenticate(&self, request: &mut HttpRequest) -> Result<()> {
        self.sign_at(request, Utc::now())
    }
}

fn set_header(request: &mut HttpRequest, name: &'static str, value: &str) -> Result<()> {
    let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
        McmaClientError::Configuration(format!("invalid value for header '{}': {}", name, e))
    })?;
    request.headers.insert(name, value);
    Ok(())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| McmaClientError::Configuration(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// `kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// Query pairs percent-encoded per RFC 3986 and sorted by key, then value.
fn canonical_query_string(url: &url::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
