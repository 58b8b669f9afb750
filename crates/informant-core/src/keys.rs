//! Object keys and URLs derived from a report's identity.
//!
//! Layout of the website bucket:
//!
//! ```text
//! sitemap.xml                       sitemap index
//! {year}/{month}/sitemap.xml        month sitemap
//! {year}/{month}/{id}-{slug}        article or redirect marker
//! ```

use crate::models::{Period, Report, ReportId};
use crate::slug::slugify;

/// Key of the global sitemap index.
pub const INDEX_KEY: &str = "sitemap.xml";

/// Slug used when a headline contains nothing sluggable.
const FALLBACK_SLUG: &str = "report";

/// Prefix shared by every key ever published for `id` in `period`.
///
/// Always ends with `-` so that id `12` never matches keys of id `123`.
pub fn id_prefix(period: Period, id: &ReportId) -> String {
    format!("{}/{}-", period, id)
}

/// Canonical key, URL, and id prefix of one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleKeys {
    pub period: Period,
    pub id: ReportId,
    pub slug: String,
}

impl ArticleKeys {
    pub fn new(period: Period, id: ReportId, headline: &str) -> Self {
        let slug = match slugify(headline) {
            s if s.is_empty() => FALLBACK_SLUG.to_string(),
            s => s,
        };
        Self { period, id, slug }
    }

    pub fn for_report(report: &Report) -> Self {
        Self::new(report.period(), report.id.clone(), &report.headline)
    }

    /// `{year}/{month}/{id}-{slug}`
    pub fn canonical_key(&self) -> String {
        format!("{}{}", self.prefix(), self.slug)
    }

    /// `{year}/{month}/{id}-`
    pub fn prefix(&self) -> String {
        id_prefix(self.period, &self.id)
    }

    pub fn canonical_url(&self, origin: &str) -> String {
        format!("{}/{}", origin, self.canonical_key())
    }

    /// Site-relative redirect target for superseded keys.
    pub fn redirect_target(&self) -> String {
        format!("/{}", self.canonical_key())
    }

    pub fn sitemap_key(&self) -> String {
        self.period.sitemap_key()
    }
}
