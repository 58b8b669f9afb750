//! Failure kinds surfaced by the engine and its collaborators.

use thiserror::Error;

/// Result alias used across the publishing engine.
pub type Result<T, E = PublishError> = std::result::Result<T, E>;

/// Everything that can go wrong while publishing or unpublishing a report.
///
/// Only [`StoreNotFound`](PublishError::StoreNotFound) is ever absorbed
/// inside the engine (sitemap bootstrapping). Everything else propagates
/// to the request-handling layer, which maps it to a transport response.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Malformed or missing request fields. Never retried.
    #[error("{0}")]
    BadInput(String),

    /// The CMS API (or another upstream) could not be reached or answered
    /// with an error.
    #[error("upstream fetch failed: {0:#}")]
    UpstreamFetch(anyhow::Error),

    /// The object store has no object at this key.
    #[error("object not found: {0}")]
    StoreNotFound(String),

    /// Any other object store failure. Aborts the current operation;
    /// keys already written are left as they are.
    #[error("object store failure on '{key}': {source:#}")]
    Store {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A stored sitemap document could not be parsed.
    #[error("invalid sitemap document '{key}': {message}")]
    Sitemap { key: String, message: String },

    /// The rendered page failed the AMP check. Raised after the article and
    /// sitemaps were already published. `failed_redirects` lists superseded
    /// keys whose redirect rewrite failed during that publish.
    #[error(
        "AMP validation failed for '{url}' ({errors} error(s), {} failed redirect(s))",
        .failed_redirects.len()
    )]
    Validation {
        url: String,
        errors: usize,
        failed_redirects: Vec<String>,
    },
}

impl PublishError {
    /// Wraps an arbitrary store error for `key`.
    pub fn store(key: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        PublishError::Store {
            key: key.into(),
            source: source.into(),
        }
    }

    /// `true` for the distinguished "no such key" store error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PublishError::StoreNotFound(_))
    }
}
