//! Data types read from the CMS and derived by the engine.
//!
//! [`Report`] and [`Fragment`] are owned by the CMS; the engine only reads
//! them. Fields the engine does not interpret are kept in `extra` so the
//! renderer still sees the full record.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Immutable identifier of a report. The CMS sends integers, but string ids
/// are accepted as well.
///
/// Ids are restricted to ASCII letters and digits. Article keys are found by
/// the prefix `{y}/{m}/{id}-`, so an id containing `-` or `/` could reach
/// another report's objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    /// Builds an id from surrounding-whitespace-trimmed input. Returns
    /// `None` for empty values or anything other than ASCII alphanumerics.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            None
        } else {
            Some(ReportId(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ReportId {
    fn from(id: u64) -> Self {
        ReportId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ReportId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(ReportId::from(n)),
            Raw::Str(s) => ReportId::new(s.as_str())
                .ok_or_else(|| serde::de::Error::custom(format!("invalid report id '{}'", s))),
        }
    }
}

/// Pixel dimensions of a media item, attached before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSize {
    pub width: u32,
    pub height: u32,
}

/// A CMS-authored news item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub created: DateTime<FixedOffset>,
    #[serde(default)]
    pub modified: Option<DateTime<FixedOffset>>,
    pub headline: String,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(rename = "mediaSize", default, skip_serializing_if = "Option::is_none")]
    pub media_size: Option<MediaSize>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Report {
    /// Timestamp used as the sitemap `lastmod`. Falls back to `created`
    /// for records that were never edited.
    pub fn last_modified(&self) -> DateTime<FixedOffset> {
        self.modified.unwrap_or(self.created)
    }

    pub fn period(&self) -> Period {
        Period::of(&self.created)
    }
}

/// A Q&A-style sub-item attached to a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub id: ReportId,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(rename = "mediaSize", default, skip_serializing_if = "Option::is_none")]
    pub media_size: Option<MediaSize>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Year/month bucket that partitions articles and sitemaps.
///
/// Taken from the creation instant in UTC. Renders as `2018/5`: the month
/// is 1-indexed and never zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn of(created: &DateTime<FixedOffset>) -> Self {
        let utc = created.with_timezone(&Utc);
        Period {
            year: utc.year(),
            month: utc.month(),
        }
    }

    /// Object key of this period's sitemap, e.g. `2018/5/sitemap.xml`.
    pub fn sitemap_key(&self) -> String {
        format!("{}/sitemap.xml", self)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_period_is_not_zero_padded() {
        let p = Period::of(&ts("2018-05-14T04:11:47+02:00"));
        assert_eq!(p.to_string(), "2018/5");
        assert_eq!(p.sitemap_key(), "2018/5/sitemap.xml");
    }

    #[test]
    fn test_period_uses_utc_instant() {
        // 00:30 local on June 1st is still May 31st in UTC.
        let p = Period::of(&ts("2018-06-01T00:30:00+02:00"));
        assert_eq!(p, Period { year: 2018, month: 5 });
    }

    #[test]
    fn test_report_deserializes_cms_json() {
        let json = serde_json::json!({
            "id": 696,
            "created": "2018-05-14T04:11:47+02:00",
            "headline": "Wasserbüffel legen Verkehr auf A3 lahm",
            "media": null,
            "tags": [{"id": 1265, "name": "A3"}],
            "published": true
        });
        let report: Report = serde_json::from_value(json).unwrap();
        assert_eq!(report.id.as_str(), "696");
        assert!(report.media.is_none());
        assert_eq!(report.last_modified(), report.created);
        assert!(report.extra.contains_key("tags"));
    }

    #[test]
    fn test_report_id_accepts_strings_and_rejects_empty() {
        let id: ReportId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
        assert!(serde_json::from_str::<ReportId>("\"  \"").is_err());
    }

    #[test]
    fn test_report_id_rejects_key_delimiters() {
        for raw in ["12-a3", "12/a3", "2018/5/12", "12 a3", "12.a3", "zwölf", "-"] {
            assert!(ReportId::new(raw).is_none(), "accepted {:?}", raw);
            let json = serde_json::Value::String(raw.to_string());
            assert!(serde_json::from_value::<ReportId>(json).is_err());
        }
        assert_eq!(ReportId::new(" 696 ").unwrap().as_str(), "696");
        assert_eq!(ReportId::new("A12b").unwrap().as_str(), "A12b");
    }

    #[test]
    fn test_media_size_serializes_camel_case_key() {
        let json = serde_json::json!({
            "id": 1,
            "created": "2018-05-14T04:11:47+02:00",
            "headline": "x"
        });
        let mut report: Report = serde_json::from_value(json).unwrap();
        report.media_size = Some(MediaSize {
            width: 800,
            height: 600,
        });
        let out = serde_json::to_value(&report).unwrap();
        assert_eq!(out["mediaSize"]["width"], 800);
    }
}
