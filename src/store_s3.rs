//! Amazon S3 object store.
//!
//! Reads and writes the website bucket through the S3 REST API with AWS
//! Signature V4 authentication. Supports custom endpoints for
//! S3-compatible services (MinIO, LocalStack); those are addressed
//! path-style as `{endpoint}/{bucket}/{key}`.
//!
//! Uses only pure-Rust dependencies (`hmac`, `sha2`) for signing.
//!
//! # Configuration
//!
//! ```toml
//! [store]
//! bucket = "hackingstudio-informant-amp-web-prod"
//! region = "eu-central-1"
//! # endpoint_url = "http://localhost:9000"   # MinIO
//! ```
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID` — required
//! - `AWS_SECRET_ACCESS_KEY` — required
//! - `AWS_SESSION_TOKEN` — optional (Lambda roles, temporary credentials)
//!
//! # Object metadata
//!
//! | Header | Source |
//! |--------|--------|
//! | `Content-Type` | [`PutObject::content_type`] |
//! | `x-amz-acl` | [`PutObject::acl`] |
//! | `x-amz-website-redirect-location` | [`PutObject::redirect_location`] |

use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};

use informant_core::error::{PublishError, Result};
use informant_core::store::{ObjectStore, PutObject};

use crate::config::Config;

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
    pub fn from_env() -> anyhow::Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self::new(access_key_id, secret_access_key, session_token))
    }
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

// ============ Endpoint ============

/// Where requests for one bucket go.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: String,
    host: String,
    /// Bucket in the path instead of the host name.
    path_style: bool,
}

impl Endpoint {
    fn resolve(bucket: &str, region: &str, endpoint_url: Option<&str>) -> anyhow::Result<Self> {
        let Some(url) = endpoint_url else {
            return Ok(Self {
                scheme: "https".to_string(),
                host: format!("{}.s3.{}.amazonaws.com", bucket, region),
                path_style: false,
            });
        };

        let (scheme, rest) = if let Some(rest) = url.strip_prefix("https://") {
            ("https", rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            ("http", rest)
        } else {
            bail!("store.endpoint_url must start with http:// or https://, got '{}'", url);
        };
        let host = rest.trim_end_matches('/');
        if host.is_empty() || host.contains('/') {
            bail!("store.endpoint_url must be a bare host, got '{}'", url);
        }
        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            path_style: true,
        })
    }
}

// ============ Store ============

/// [`ObjectStore`] backed by an S3 bucket.
pub struct S3Store {
    bucket: String,
    region: String,
    endpoint: Endpoint,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3Store {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint_url: Option<&str>,
        creds: AwsCredentials,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let bucket = bucket.into();
        let region = region.into();
        let endpoint = Endpoint::resolve(&bucket, &region, endpoint_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build S3 HTTP client")?;
        Ok(Self {
            bucket,
            region,
            endpoint,
            creds,
            client,
        })
    }

    /// Store for the configured bucket, with credentials from the environment.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            config.bucket_name(),
            config.store.region.clone(),
            config.store.endpoint_url.as_deref(),
            AwsCredentials::from_env()?,
            Duration::from_secs(config.store.timeout_secs),
        )
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Canonical (already encoded) request path for `key`. An empty key
    /// addresses the bucket itself.
    fn path(&self, key: &str) -> String {
        let encoded = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        if self.endpoint.path_style {
            if key.is_empty() {
                format!("/{}", uri_encode(&self.bucket))
            } else {
                format!("/{}/{}", uri_encode(&self.bucket), encoded)
            }
        } else {
            format!("/{}", encoded)
        }
    }

    /// Sign and send one request.
    async fn send(
        &self,
        method: Method,
        key: &str,
        query: &[(&str, &str)],
        extra_headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> anyhow::Result<reqwest::Response> {
        let path = self.path(key);
        let mut sorted_params: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (uri_encode(k), uri_encode(v)))
            .collect();
        sorted_params.sort();
        let canonical_querystring = sorted_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let request = CanonicalRequest::new(
            method.as_str(),
            &path,
            &canonical_querystring,
            &self.endpoint.host,
            extra_headers,
            hex_sha256(&body),
            &self.creds,
            Utc::now(),
        );
        let authorization = request.authorization(&self.creds, &self.region);

        let mut url = format!("{}://{}{}", self.endpoint.scheme, self.endpoint.host, path);
        if !canonical_querystring.is_empty() {
            url.push('?');
            url.push_str(&canonical_querystring);
        }

        let mut req_builder = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", &authorization);
        for (name, value) in &request.headers {
            // reqwest derives Host from the URL.
            if name != "host" {
                req_builder = req_builder.header(name.as_str(), value.as_str());
            }
        }
        if !body.is_empty() || method == Method::PUT {
            req_builder = req_builder.body(body);
        }

        req_builder.send().await.map_err(|e| {
            anyhow!(
                "{} s3://{}/{} failed: {}",
                method,
                self.bucket,
                key,
                e
            )
        })
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> anyhow::Result<ListPage> {
        let mut query = vec![("list-type", "2"), ("max-keys", "1000")];
        if !prefix.is_empty() {
            query.push(("prefix", prefix));
        }
        if let Some(token) = continuation_token {
            query.push(("continuation-token", token));
        }

        let resp = self.send(Method::GET, "", &query, Vec::new(), Vec::new()).await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "S3 ListObjectsV2 failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }
        let xml_body = resp.text().await?;
        parse_list_objects_response(&xml_body)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .send(Method::GET, key, &[], Vec::new(), Vec::new())
            .await
            .map_err(|e| PublishError::store(key, e))?;

        let status = resp.status();
        if status.is_success() {
            let bytes = resp.bytes().await.map_err(|e| PublishError::store(key, e))?;
            return Ok(bytes.to_vec());
        }

        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND || body.contains("<Code>NoSuchKey</Code>") {
            return Err(PublishError::StoreNotFound(key.to_string()));
        }
        Err(PublishError::store(
            key,
            anyhow!("S3 GetObject failed (HTTP {})", status),
        ))
    }

    async fn put(&self, object: PutObject) -> Result<()> {
        let mut headers = vec![
            ("content-type".to_string(), object.content_type.clone()),
            ("x-amz-acl".to_string(), object.acl.as_str().to_string()),
        ];
        if let Some(ref location) = object.redirect_location {
            headers.push((
                "x-amz-website-redirect-location".to_string(),
                location.clone(),
            ));
        }

        let resp = self
            .send(Method::PUT, &object.key, &[], headers, object.body)
            .await
            .map_err(|e| PublishError::store(&object.key, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::store(
                &object.key,
                anyhow!(
                    "S3 PutObject failed (HTTP {}): {}",
                    status,
                    body.chars().take(500).collect::<String>()
                ),
            ));
        }
        tracing::debug!(bucket = %self.bucket, key = %object.key, "put object");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .list_page(prefix, continuation_token.as_deref())
                .await
                .map_err(|e| PublishError::store(prefix, e))?;
            keys.extend(page.keys);

            match (page.is_truncated, page.next_token) {
                (true, Some(token)) => continuation_token = Some(token),
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let resp = self
            .send(Method::DELETE, key, &[], Vec::new(), Vec::new())
            .await
            .map_err(|e| PublishError::store(key, e))?;

        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(PublishError::store(
            key,
            anyhow!("S3 DeleteObject failed (HTTP {})", status),
        ))
    }
}

// ============ AWS SigV4 ============

/// A request in SigV4 canonical form.
struct CanonicalRequest {
    method: String,
    path: String,
    query: String,
    /// Lowercase names, sorted.
    headers: Vec<(String, String)>,
    payload_hash: String,
    amz_date: String,
    date_stamp: String,
}

impl CanonicalRequest {
    #[allow(clippy::too_many_arguments)]
    fn new(
        method: &str,
        path: &str,
        query: &str,
        host: &str,
        extra_headers: Vec<(String, String)>,
        payload_hash: String,
        creds: &AwsCredentials,
        now: DateTime<Utc>,
    ) -> Self {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let mut headers = vec![
            ("host".to_string(), host.to_string()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.extend(
            extra_headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string())),
        );
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            method: method.to_string(),
            path: path.to_string(),
            query: query.to_string(),
            headers,
            payload_hash,
            amz_date,
            date_stamp,
        }
    }

    fn signed_headers(&self) -> String {
        self.headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }

    fn canonical_string(&self) -> String {
        let canonical_headers: String = self
            .headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            self.path,
            self.query,
            canonical_headers,
            self.signed_headers(),
            self.payload_hash
        )
    }

    /// Value of the `Authorization` header.
    fn authorization(&self, creds: &AwsCredentials, region: &str) -> String {
        let credential_scope = format!("{}/{}/s3/aws4_request", self.date_stamp, region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            self.amz_date,
            credential_scope,
            hex_sha256(self.canonical_string().as_bytes())
        );
        let signing_key =
            derive_signing_key(&creds.secret_access_key, &self.date_stamp, region, "s3");
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id,
            credential_scope,
            self.signed_headers(),
            signature
        )
    }
}

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986, leaving `A-Z a-z 0-9 - _ . ~` as is.
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

// ============ ListObjectsV2 ============

#[derive(Debug, Default)]
struct ListPage {
    keys: Vec<String>,
    is_truncated: bool,
    next_token: Option<String>,
}

/// Parse one `ListObjectsV2` response page.
fn parse_list_objects_response(xml: &str) -> anyhow::Result<ListPage> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = ListPage::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event().context("Malformed ListObjectsV2 response")? {
            Event::Start(e) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Text(t) => {
                let value = t.unescape().context("Malformed ListObjectsV2 text")?;
                let names: Vec<&str> = path.iter().map(String::as_str).collect();
                match names.as_slice() {
                    [_, "Contents", "Key"] => page.keys.push(value.into_owned()),
                    [_, "IsTruncated"] => page.is_truncated = value == "true",
                    [_, "NextContinuationToken"] => page.next_token = Some(value.into_owned()),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(page)
}
