//! Amazon S3 [`ObjectStore`].
//!
//! Talks to the S3 REST API directly with AWS Signature V4 authentication:
//!
//! | Primitive | S3 operation |
//! |-----------|--------------|
//! | `read` | `GetObject` |
//! | `copy` | `CopyObject` (`PUT` with `x-amz-copy-source`) |
//! | `delete` | `DeleteObject` |
//!
//! Uses only pure-Rust dependencies (`hmac`, `sha2`) for signing, so it
//! builds anywhere `rustls` does.
//!
//! # Addressing
//!
//! On AWS, requests use virtual-hosted style
//! (`<bucket>.s3.<region>.amazonaws.com/<key>`). When `endpoint_url` is set
//! (MinIO, LocalStack) requests use path style (`<endpoint>/<bucket>/<key>`)
//! and keep the endpoint's scheme.
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID` — required
//! - `AWS_SECRET_ACCESS_KEY` — required
//! - `AWS_SESSION_TOKEN` — optional (temporary credentials / IAM roles)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Method;
use sha2::{Digest, Sha256};

use crate::config::StorageConfig;
use crate::models::ObjectRef;

use super::{ObjectStore, StorageError};

type HmacSha256 = Hmac<Sha256>;

// ============ AWS Credentials ============

/// AWS credentials loaded from environment variables.
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    /// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// and optionally `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Result<Self, StorageError> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| StorageError::Credentials(format!("{} environment variable not set", name)))
        };
        Ok(Self {
            access_key_id: var("AWS_ACCESS_KEY_ID")?,
            secret_access_key: var("AWS_SECRET_ACCESS_KEY")?,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

// ============ Store ============

/// Custom S3-compatible endpoint, addressed path-style.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: &'static str,
    host: String,
}

impl Endpoint {
    fn parse(url: &str) -> Self {
        let scheme = if url.starts_with("http://") { "http" } else { "https" };
        let host = url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        Self { scheme, host }
    }
}

pub struct S3Store {
    region: String,
    endpoint: Option<Endpoint>,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3Store {
    pub fn new(config: &StorageConfig, creds: AwsCredentials) -> Self {
        Self {
            region: config.region.clone(),
            endpoint: config.endpoint_url.as_deref().map(Endpoint::parse),
            creds,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env(config: &StorageConfig) -> Result<Self, StorageError> {
        Ok(Self::new(config, AwsCredentials::from_env()?))
    }

    /// Scheme, host, and canonical URI for an object.
    fn locate(&self, object: &ObjectRef) -> (&'static str, String, String) {
        let encoded_key = encode_key(&object.key);
        match &self.endpoint {
            Some(endpoint) => (
                endpoint.scheme,
                endpoint.host.clone(),
                format!("/{}/{}", uri_encode(&object.container), encoded_key),
            ),
            None => (
                "https",
                format!("{}.s3.{}.amazonaws.com", object.container, self.region),
                format!("/{}", encoded_key),
            ),
        }
    }

    /// Sign and send a body-less request against `object`.
    async fn send(
        &self,
        op: &'static str,
        method: Method,
        object: &ObjectRef,
        extra_headers: Vec<(String, String)>,
    ) -> Result<reqwest::Response, StorageError> {
        let (scheme, host, canonical_uri) = self.locate(object);
        let signed = sign_request(
            &self.creds,
            &self.region,
            method.as_str(),
            &host,
            &canonical_uri,
            &extra_headers,
            Utc::now(),
        )?;

        let url = format!("{}://{}{}", scheme, host, canonical_uri);
        let mut req_builder = self
            .client
            .request(method, &url)
            .header("Authorization", &signed.authorization)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("x-amz-date", &signed.amz_date);

        if let Some(ref token) = self.creds.session_token {
            req_builder = req_builder.header("x-amz-security-token", token);
        }
        for (name, value) in &extra_headers {
            req_builder = req_builder.header(name.as_str(), value.as_str());
        }

        tracing::debug!(op, %object, url = %url, "sending S3 request");

        req_builder.send().await.map_err(|e| StorageError::Request {
            op,
            message: format!("{} s3://{}: {}", op, object, e),
        })
    }
}

/// Turn a failed S3 response into a [`StorageError`].
///
/// `NoSuchKey` (or a bare 404) becomes [`StorageError::NotFound`] for
/// `object`; everything else keeps the HTTP status and S3 error message.
async fn response_error(
    op: &'static str,
    object: &ObjectRef,
    resp: reqwest::Response,
) -> StorageError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    error_from_body(op, object, status, &body)
}

fn error_from_body(op: &'static str, object: &ObjectRef, status: u16, body: &str) -> StorageError {
    let code = extract_xml_value(body, "Code");
    if status == 404 && code.as_deref().map_or(true, |c| c == "NoSuchKey") {
        return StorageError::not_found(object);
    }
    let message = match (code, extract_xml_value(body, "Message")) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code,
        (None, _) => body.chars().take(500).collect(),
    };
    StorageError::Status {
        op,
        status,
        message,
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn backend(&self) -> &str {
        "s3"
    }

    async fn read(&self, object: &ObjectRef) -> Result<Vec<u8>, StorageError> {
        let resp = self.send("GetObject", Method::GET, object, Vec::new()).await?;
        if !resp.status().is_success() {
            return Err(response_error("GetObject", object, resp).await);
        }
        let bytes = resp.bytes().await.map_err(|e| StorageError::Request {
            op: "GetObject",
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn copy(&self, object: &ObjectRef, dest_container: &str) -> Result<(), StorageError> {
        let dest = object.in_container(dest_container);
        let copy_source = format!("/{}/{}", uri_encode(&object.container), encode_key(&object.key));
        let resp = self
            .send(
                "CopyObject",
                Method::PUT,
                &dest,
                vec![("x-amz-copy-source".to_string(), copy_source)],
            )
            .await?;

        if !resp.status().is_success() {
            return Err(response_error("CopyObject", object, resp).await);
        }

        // CopyObject can fail after the 200 status line has been sent; the
        // failure then arrives as an <Error> document in the body.
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if body.contains("<Error>") {
            return Err(error_from_body("CopyObject", object, status, &body));
        }
        Ok(())
    }

    async fn delete(&self, object: &ObjectRef) -> Result<(), StorageError> {
        let resp = self
            .send("DeleteObject", Method::DELETE, object, Vec::new())
            .await?;
        if !resp.status().is_success() {
            // Some S3-compatible servers answer 404 where AWS answers 204.
            return match response_error("DeleteObject", object, resp).await {
                e if e.is_not_found() => Ok(()),
                e => Err(e),
            };
        }
        Ok(())
    }
}

// ============ AWS SigV4 Helpers ============

/// Headers produced by [`sign_request`].
struct SignedRequest {
    authorization: String,
    amz_date: String,
    payload_hash: String,
}

/// Sign a body-less, query-less S3 request.
///
/// `extra_headers` must use lowercase names; they are included in the
/// signature alongside `host`, `x-amz-content-sha256`, `x-amz-date`, and
/// the session token when present.
fn sign_request(
    creds: &AwsCredentials,
    region: &str,
    method: &str,
    host: &str,
    canonical_uri: &str,
    extra_headers: &[(String, String)],
    now: DateTime<Utc>,
) -> Result<SignedRequest, StorageError> {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let payload_hash = hex_sha256(b"");

    let mut headers = vec![
        ("host".to_string(), host.to_string()),
        ("x-amz-content-sha256".to_string(), payload_hash.clone()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.extend(extra_headers.iter().cloned());
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, canonical_uri, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, region, "s3")?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        creds.access_key_id, credential_scope, signed_headers, signature
    );

    Ok(SignedRequest {
        authorization,
        amz_date,
        payload_hash,
    })
}

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::Credentials(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, StorageError> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode an object key, keeping `/` separators.
fn encode_key(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// URI-encode a string per RFC 3986 (used in SigV4 canonical requests).
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// Extract the text content of an XML tag (simple, non-nested).
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let value_start = xml.find(&open)? + open.len();
    let end = xml[value_start..].find(&close)?;
    Some(xml[value_start..value_start + end].to_string())
}
