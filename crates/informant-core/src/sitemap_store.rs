//! Loading and saving sitemap documents in the object store.
//!
//! A missing sitemap is not an error: [`SitemapStore::load`] synthesizes an
//! empty document of the requested kind. Saving an empty document deletes
//! the object instead, so the bucket never holds empty sitemap files.

use std::sync::Arc;

use crate::error::{PublishError, Result};
use crate::sitemap::{SitemapDocument, SitemapKind};
use crate::store::{ObjectStore, PutObject};

/// What [`SitemapStore::save`] did with the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    Deleted,
}

/// Sitemap persistence over an [`ObjectStore`].
#[derive(Clone)]
pub struct SitemapStore {
    store: Arc<dyn ObjectStore>,
}

impl SitemapStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Load the document at `key`, or an empty one of `kind` if absent.
    pub async fn load(&self, key: &str, kind: SitemapKind) -> Result<SitemapDocument> {
        let bytes = match self.store.get(key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                tracing::debug!(key, "sitemap absent, starting empty {}", kind.root_tag());
                return Ok(SitemapDocument::new(kind));
            }
            Err(e) => return Err(e),
        };

        let xml = String::from_utf8_lossy(&bytes);
        SitemapDocument::parse_as(&xml, kind).map_err(|e| PublishError::Sitemap {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Write `doc` to `key`, or delete `key` when `doc` has no entries.
    pub async fn save(&self, key: &str, doc: &SitemapDocument) -> Result<SaveOutcome> {
        if doc.is_empty() {
            self.store.delete(key).await?;
            tracing::info!(key, "deleted empty sitemap");
            return Ok(SaveOutcome::Deleted);
        }

        self.store
            .put(PutObject::xml(key, doc.to_xml().into_bytes()))
            .await?;
        tracing::info!(key, entries = doc.len(), "wrote sitemap");
        Ok(SaveOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::SitemapEntry;
    use crate::store::memory::InMemoryStore;
    use crate::store::CONTENT_TYPE_XML;

    fn setup() -> (Arc<InMemoryStore>, SitemapStore) {
        let mem = Arc::new(InMemoryStore::new());
        let sitemaps = SitemapStore::new(mem.clone());
        (mem, sitemaps)
    }

    #[tokio::test]
    async fn test_load_missing_bootstraps_empty_document() {
        let (_, sitemaps) = setup();
        let doc = sitemaps.load("sitemap.xml", SitemapKind::Index).await.unwrap();
        assert_eq!(doc.kind(), SitemapKind::Index);
        assert!(doc.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (mem, sitemaps) = setup();
        let mut doc = SitemapDocument::new(SitemapKind::UrlSet);
        doc.upsert(SitemapEntry::new("https://example.org/2018/5/1-a"), |_| false);

        let outcome = sitemaps.save("2018/5/sitemap.xml", &doc).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Written);
        assert_eq!(
            mem.object("2018/5/sitemap.xml").unwrap().content_type,
            CONTENT_TYPE_XML
        );

        let loaded = sitemaps
            .load("2018/5/sitemap.xml", SitemapKind::UrlSet)
            .await
            .unwrap();
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn test_save_empty_deletes_object() {
        let (mem, sitemaps) = setup();
        mem.put(PutObject::xml("2018/5/sitemap.xml", "<urlset/>"))
            .await
            .unwrap();

        let empty = SitemapDocument::new(SitemapKind::UrlSet);
        let outcome = sitemaps.save("2018/5/sitemap.xml", &empty).await.unwrap();

        assert_eq!(outcome, SaveOutcome::Deleted);
        assert!(mem.object("2018/5/sitemap.xml").is_none());
    }

    #[tokio::test]
    async fn test_load_unparseable_is_fatal() {
        let (mem, sitemaps) = setup();
        mem.put(PutObject::xml("sitemap.xml", "<html/>")).await.unwrap();
        let err = sitemaps
            .load("sitemap.xml", SitemapKind::Index)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Sitemap { .. }));
    }
}
