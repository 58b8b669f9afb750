//! Object store abstraction.
//!
//! The [`ObjectStore`] trait is the only way the engine touches the website
//! bucket. The production implementation signs S3 REST calls; tests use
//! [`memory::InMemoryStore`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get`](ObjectStore::get) | Read an object body; missing keys are [`StoreNotFound`](crate::error::PublishError::StoreNotFound) |
//! | [`put`](ObjectStore::put) | Write a body with content type, ACL, and optional redirect |
//! | [`list`](ObjectStore::list) | List keys under a prefix |
//! | [`delete`](ObjectStore::delete) | Delete a key (missing keys are not an error) |

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_XML: &str = "application/xml";

/// Canned ACL applied to a written object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acl {
    Private,
    PublicRead,
}

impl Acl {
    pub fn as_str(self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
        }
    }
}

/// A write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: Acl,
    /// Website redirect target. When set, the static website answers
    /// requests for `key` with a redirect instead of the body.
    pub redirect_location: Option<String>,
}

impl PutObject {
    /// Public HTML page.
    pub fn html(key: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
            content_type: CONTENT_TYPE_HTML.to_string(),
            acl: Acl::PublicRead,
            redirect_location: None,
        }
    }

    /// Public XML document.
    pub fn xml(key: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
            content_type: CONTENT_TYPE_XML.to_string(),
            acl: Acl::PublicRead,
            redirect_location: None,
        }
    }

    pub fn with_redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect_location = Some(target.into());
        self
    }
}

/// Abstract website bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the body stored at `key`.
    ///
    /// Returns [`PublishError::StoreNotFound`](crate::error::PublishError::StoreNotFound)
    /// when nothing is stored there; every other failure is
    /// [`PublishError::Store`](crate::error::PublishError::Store).
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Write (or overwrite) an object. Last write wins per key.
    async fn put(&self, object: PutObject) -> Result<()>;

    /// All keys starting with `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}
