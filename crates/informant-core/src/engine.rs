//! Publish / unpublish orchestration.
//!
//! [`PublishEngine`] drives one report through the full workflow:
//!
//! ```text
//! publish_report                      delete_report
//! ──────────────                      ─────────────
//! resolve keys                        resolve period
//! write article + redirects           delete every {period}/{id}- key
//! upsert month sitemap entry          remove month sitemap entries
//! upsert index entry for the month    if month sitemap is gone:
//!                                       remove its index entry
//! ```
//!
//! Each step awaits the previous one. A failure aborts the workflow and
//! leaves already-written keys in place; running the same call again
//! converges to the same final state.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::Serialize;
use tracing::Instrument;

use crate::error::Result;
use crate::keys::{id_prefix, ArticleKeys, INDEX_KEY};
use crate::models::{Period, Report, ReportId};
use crate::publisher::{ArticlePublisher, ArticleWrite};
use crate::sitemap::{ChangeFreq, SitemapEntry, SitemapKind};
use crate::sitemap_store::{SaveOutcome, SitemapStore};
use crate::store::ObjectStore;

/// Source of "now" for index `lastmod` values.
pub type Clock = fn() -> DateTime<Utc>;

/// Result of [`PublishEngine::publish_report`].
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub url: String,
    pub article: ArticleWrite,
    pub sitemap_key: String,
    /// Month sitemap entries of older slugs that were dropped.
    pub superseded_entries: usize,
    pub index_updated: bool,
}

/// Result of [`PublishEngine::delete_report`].
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub deleted_keys: Vec<String>,
    pub removed_entries: usize,
    /// The month sitemap became empty and was deleted.
    pub sitemap_deleted: bool,
    pub index_updated: bool,
}

/// Publishing engine bound to one bucket and one site origin.
#[derive(Clone)]
pub struct PublishEngine {
    origin: String,
    articles: ArticlePublisher,
    sitemaps: SitemapStore,
    clock: Clock,
}

impl PublishEngine {
    /// `origin` is the public site root, e.g. `https://informant.example.org`.
    /// A trailing slash is ignored.
    pub fn new(store: Arc<dyn ObjectStore>, origin: impl Into<String>) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        Self {
            origin,
            articles: ArticlePublisher::new(store.clone()),
            sitemaps: SitemapStore::new(store),
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Public URL the report is published under.
    pub fn canonical_url(&self, report: &Report) -> String {
        ArticleKeys::for_report(report).canonical_url(&self.origin)
    }

    fn month_sitemap_url(&self, period: Period) -> String {
        format!("{}/{}", self.origin, period.sitemap_key())
    }

    /// Create or update the published page for `report`.
    pub async fn publish_report(&self, report: &Report, content: &str) -> Result<PublishOutcome> {
        let keys = ArticleKeys::for_report(report);
        let span = tracing::info_span!("publish_report", id = %report.id, key = %keys.canonical_key());
        self.publish_keys(report, &keys, content)
            .instrument(span)
            .await
    }

    async fn publish_keys(
        &self,
        report: &Report,
        keys: &ArticleKeys,
        content: &str,
    ) -> Result<PublishOutcome> {
        let url = keys.canonical_url(&self.origin);
        let article = self.articles.publish(content, keys).await?;

        let sitemap_key = keys.sitemap_key();
        let mut month = self.sitemaps.load(&sitemap_key, SitemapKind::UrlSet).await?;
        let entry = SitemapEntry::new(&url)
            .with_lastmod(report.last_modified().to_rfc3339())
            .with_changefreq(ChangeFreq::Never);
        let id_url_prefix = format!("{}/{}", self.origin, keys.prefix());
        let upsert = month.upsert(entry, |e| e.loc.starts_with(&id_url_prefix));
        let saved = self.sitemaps.save(&sitemap_key, &month).await?;

        let index_updated = match saved {
            SaveOutcome::Written => {
                let month_url = self.month_sitemap_url(keys.period);
                let mut index = self.sitemaps.load(INDEX_KEY, SitemapKind::Index).await?;
                let now = (self.clock)().to_rfc3339_opts(SecondsFormat::Secs, true);
                index.upsert(SitemapEntry::new(&month_url).with_lastmod(now), |e| {
                    e.loc == month_url
                });
                self.sitemaps.save(INDEX_KEY, &index).await?;
                true
            }
            SaveOutcome::Deleted => false,
        };

        tracing::info!(
            url = %url,
            redirected = article.redirected.len(),
            superseded = upsert.superseded,
            "published report"
        );

        Ok(PublishOutcome {
            url,
            article,
            sitemap_key,
            superseded_entries: upsert.superseded,
            index_updated,
        })
    }

    /// Remove every trace of report `id` created at `created`.
    ///
    /// The caller must already have confirmed that the report no longer
    /// exists at the CMS.
    pub async fn delete_report(
        &self,
        id: &ReportId,
        created: &DateTime<FixedOffset>,
    ) -> Result<DeleteOutcome> {
        let period = Period::of(created);
        let span = tracing::info_span!("delete_report", id = %id, period = %period);
        self.delete_in_period(id, period).instrument(span).await
    }

    async fn delete_in_period(&self, id: &ReportId, period: Period) -> Result<DeleteOutcome> {
        let deleted_keys = self.articles.unpublish(period, id).await?;

        let sitemap_key = period.sitemap_key();
        let mut month = self.sitemaps.load(&sitemap_key, SitemapKind::UrlSet).await?;
        let id_url_prefix = format!("{}/{}", self.origin, id_prefix(period, id));
        let removed_entries = month.remove(|e| e.loc.starts_with(&id_url_prefix));
        let saved = self.sitemaps.save(&sitemap_key, &month).await?;

        let sitemap_deleted = saved == SaveOutcome::Deleted;
        let mut index_updated = false;
        if sitemap_deleted {
            let month_url = self.month_sitemap_url(period);
            let mut index = self.sitemaps.load(INDEX_KEY, SitemapKind::Index).await?;
            if index.remove(|e| e.loc == month_url) > 0 {
                self.sitemaps.save(INDEX_KEY, &index).await?;
                index_updated = true;
            }
        }

        tracing::info!(
            deleted = deleted_keys.len(),
            removed_entries,
            sitemap_deleted,
            "deleted report"
        );

        Ok(DeleteOutcome {
            deleted_keys,
            removed_entries,
            sitemap_deleted,
            index_updated,
        })
    }
}
