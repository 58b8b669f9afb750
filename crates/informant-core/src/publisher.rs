//! Article objects and redirect markers.
//!
//! For one `(period, id)` the bucket holds exactly one full article (the
//! canonical key) plus one redirect marker for every slug the report was
//! ever published under.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::error::Result;
use crate::keys::{id_prefix, ArticleKeys};
use crate::models::{Period, ReportId};
use crate::store::{ObjectStore, PutObject};

/// A redirect rewrite that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectFailure {
    pub key: String,
    pub error: String,
}

/// Result of [`ArticlePublisher::publish`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleWrite {
    pub canonical_key: String,
    /// Superseded keys now redirecting to the canonical key.
    pub redirected: Vec<String>,
    /// Superseded keys whose redirect rewrite failed. Nothing is rolled back.
    pub failed_redirects: Vec<RedirectFailure>,
}

/// Writes, redirects, and deletes article objects.
#[derive(Clone)]
pub struct ArticlePublisher {
    store: Arc<dyn ObjectStore>,
}

impl ArticlePublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Publish `content` under the canonical key and turn every other key
    /// of this report into a redirect to it.
    ///
    /// # Errors
    ///
    /// Fails if listing or the canonical write fails. Redirect failures are
    /// reported in [`ArticleWrite::failed_redirects`] instead.
    pub async fn publish(&self, content: &str, keys: &ArticleKeys) -> Result<ArticleWrite> {
        let canonical_key = keys.canonical_key();
        let existing = self.store.list(&keys.prefix()).await?;

        self.store
            .put(PutObject::html(&canonical_key, content.as_bytes()))
            .await?;
        tracing::info!(key = %canonical_key, "wrote article");

        let target = keys.redirect_target();
        let stale: Vec<String> = existing
            .into_iter()
            .filter(|k| *k != canonical_key)
            .collect();

        // Independent and idempotent, so they can all be in flight at once.
        let writes = stale.iter().map(|key| {
            let object = PutObject::html(key, content.as_bytes()).with_redirect(&target);
            self.store.put(object)
        });
        let results = join_all(writes).await;

        let mut redirected = Vec::new();
        let mut failed_redirects = Vec::new();
        for (key, result) in stale.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    tracing::info!(key = %key, target = %target, "redirected superseded key");
                    redirected.push(key);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "redirect rewrite failed");
                    failed_redirects.push(RedirectFailure {
                        key,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(ArticleWrite {
            canonical_key,
            redirected,
            failed_redirects,
        })
    }

    /// Delete every key ever published for `id` in `period`.
    ///
    /// Returns the deleted keys.
    pub async fn unpublish(&self, period: Period, id: &ReportId) -> Result<Vec<String>> {
        let keys = self.store.list(&id_prefix(period, id)).await?;
        for key in &keys {
            self.store.delete(key).await?;
            tracing::info!(key = %key, "deleted article object");
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn keys(headline: &str) -> ArticleKeys {
        ArticleKeys::new(
            Period {
                year: 2018,
                month: 5,
            },
            ReportId::from(696),
            headline,
        )
    }

    #[tokio::test]
    async fn test_first_publish_writes_only_canonical() {
        let mem = Arc::new(InMemoryStore::new());
        let publisher = ArticlePublisher::new(mem.clone());

        let out = publisher.publish("<html/>", &keys("A3 dicht")).await.unwrap();

        assert_eq!(out.canonical_key, "2018/5/696-a3-dicht");
        assert!(out.redirected.is_empty());
        let obj = mem.object("2018/5/696-a3-dicht").unwrap();
        assert_eq!(obj.content_type, "text/html");
        assert!(!obj.is_redirect());
    }

    #[tokio::test]
    async fn test_slug_change_redirects_old_key() {
        let mem = Arc::new(InMemoryStore::new());
        let publisher = ArticlePublisher::new(mem.clone());

        publisher.publish("v1", &keys("A3 dicht")).await.unwrap();
        let out = publisher.publish("v2", &keys("A3 wieder frei")).await.unwrap();

        assert_eq!(out.redirected, vec!["2018/5/696-a3-dicht"]);
        let old = mem.object("2018/5/696-a3-dicht").unwrap();
        assert_eq!(
            old.redirect_location.as_deref(),
            Some("/2018/5/696-a3-wieder-frei")
        );
        assert_eq!(mem.object("2018/5/696-a3-wieder-frei").unwrap().body_str(), "v2");
    }

    #[tokio::test]
    async fn test_failed_redirect_is_reported_not_fatal() {
        let mem = Arc::new(InMemoryStore::new());
        let publisher = ArticlePublisher::new(mem.clone());
        publisher.publish("v1", &keys("one")).await.unwrap();
        publisher.publish("v2", &keys("two")).await.unwrap();

        mem.fail_puts_to("2018/5/696-one");
        let out = publisher.publish("v3", &keys("three")).await.unwrap();

        assert_eq!(out.redirected, vec!["2018/5/696-two"]);
        assert_eq!(out.failed_redirects.len(), 1);
        assert_eq!(out.failed_redirects[0].key, "2018/5/696-one");
        assert!(mem.object("2018/5/696-three").is_some());
    }

    #[tokio::test]
    async fn test_failed_canonical_write_aborts() {
        let mem = Arc::new(InMemoryStore::new());
        let publisher = ArticlePublisher::new(mem.clone());
        mem.fail_puts_to("2018/5/696-a3-dicht");
        assert!(publisher.publish("v1", &keys("A3 dicht")).await.is_err());
    }

    #[tokio::test]
    async fn test_unpublish_leaves_neighbouring_ids() {
        let mem = Arc::new(InMemoryStore::new());
        let publisher = ArticlePublisher::new(mem.clone());
        publisher.publish("a", &keys("a")).await.unwrap();
        mem.put(PutObject::html("2018/5/6960-other", "b")).await.unwrap();

        let period = Period {
            year: 2018,
            month: 5,
        };
        let deleted = publisher
            .unpublish(period, &ReportId::from(696))
            .await
            .unwrap();

        assert_eq!(deleted, vec!["2018/5/696-a"]);
        assert_eq!(mem.keys(), vec!["2018/5/6960-other"]);
    }
}
