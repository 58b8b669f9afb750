//! Typed sitemap and sitemap-index documents.
//!
//! A [`SitemapDocument`] is always a sequence of [`SitemapEntry`] values,
//! whether the stored XML holds zero, one, or many `<url>` / `<sitemap>`
//! elements. Mutations go through [`SitemapDocument::upsert`] and
//! [`SitemapDocument::remove`], which keep at most one live entry per
//! match predicate.
//!
//! # Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.org/2018/5/696-a3-wieder-frei</loc>
//!     <lastmod>2018-05-14T04:11:47+02:00</lastmod>
//!     <changefreq>never</changefreq>
//!   </url>
//! </urlset>
//! ```

use std::fmt;
use std::str::FromStr;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Namespace declared on every sitemap root element.
pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Root element kind of a sitemap document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapKind {
    /// `<urlset>` listing article pages (one per period).
    UrlSet,
    /// `<sitemapindex>` listing month sitemaps.
    Index,
}

impl SitemapKind {
    pub fn root_tag(self) -> &'static str {
        match self {
            SitemapKind::UrlSet => "urlset",
            SitemapKind::Index => "sitemapindex",
        }
    }

    pub fn entry_tag(self) -> &'static str {
        match self {
            SitemapKind::UrlSet => "url",
            SitemapKind::Index => "sitemap",
        }
    }

    fn from_root(tag: &[u8]) -> Result<Self, SitemapError> {
        match tag {
            b"urlset" => Ok(SitemapKind::UrlSet),
            b"sitemapindex" => Ok(SitemapKind::Index),
            other => Err(SitemapError::UnexpectedRoot(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }
}

/// `<changefreq>` values defined by the sitemap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        }
    }
}

impl FromStr for ChangeFreq {
    type Err = SitemapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(ChangeFreq::Always),
            "hourly" => Ok(ChangeFreq::Hourly),
            "daily" => Ok(ChangeFreq::Daily),
            "weekly" => Ok(ChangeFreq::Weekly),
            "monthly" => Ok(ChangeFreq::Monthly),
            "yearly" => Ok(ChangeFreq::Yearly),
            "never" => Ok(ChangeFreq::Never),
            other => Err(SitemapError::InvalidChangeFreq(other.to_string())),
        }
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while parsing stored sitemap XML.
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),
    #[error("expected <{expected}> document, found <{found}>")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("entry without <loc>")]
    MissingLoc,
    #[error("invalid changefreq '{0}'")]
    InvalidChangeFreq(String),
    #[error("document has no root element")]
    Empty,
}

/// One `<url>` (or `<sitemap>`) element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<ChangeFreq>,
    pub priority: Option<String>,
}

impl SitemapEntry {
    pub fn new(loc: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            lastmod: None,
            changefreq: None,
            priority: None,
        }
    }

    pub fn with_lastmod(mut self, lastmod: impl Into<String>) -> Self {
        self.lastmod = Some(lastmod.into());
        self
    }

    pub fn with_changefreq(mut self, changefreq: ChangeFreq) -> Self {
        self.changefreq = Some(changefreq);
        self
    }
}

/// What an [`upsert`](SitemapDocument::upsert) did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertResult {
    /// An entry with the same location existed and was replaced in place.
    pub replaced: bool,
    /// Matching entries with a different location that were dropped.
    pub superseded: usize,
}

/// In-memory sitemap or sitemap-index document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapDocument {
    kind: SitemapKind,
    entries: Vec<SitemapEntry>,
}

impl SitemapDocument {
    pub fn new(kind: SitemapKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> SitemapKind {
        self.kind
    }

    pub fn entries(&self) -> &[SitemapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, loc: &str) -> Option<&SitemapEntry> {
        self.entries.iter().find(|e| e.loc == loc)
    }

    /// Insert `entry`, superseding every entry that `matches`.
    ///
    /// The first matching entry with the same location is replaced in
    /// place; all other matching entries are dropped. When nothing matched,
    /// the entry is appended. Afterwards exactly one entry satisfies both
    /// `matches` and `loc == entry.loc`.
    pub fn upsert<F>(&mut self, entry: SitemapEntry, matches: F) -> UpsertResult
    where
        F: Fn(&SitemapEntry) -> bool,
    {
        let mut pending = Some(entry);
        let mut result = UpsertResult {
            replaced: false,
            superseded: 0,
        };

        let old = std::mem::take(&mut self.entries);
        for existing in old {
            if !matches(&existing) {
                self.entries.push(existing);
                continue;
            }
            let same_loc = pending.as_ref().is_some_and(|p| p.loc == existing.loc);
            match pending.take() {
                Some(fresh) if same_loc => {
                    self.entries.push(fresh);
                    result.replaced = true;
                }
                other => {
                    pending = other;
                    result.superseded += 1;
                }
            }
        }

        if let Some(fresh) = pending {
            self.entries.push(fresh);
        }
        result
    }

    /// Drop every entry that `matches`. Returns how many were removed.
    pub fn remove<F>(&mut self, matches: F) -> usize
    where
        F: Fn(&SitemapEntry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|e| !matches(e));
        before - self.entries.len()
    }

    /// Parse a stored document. The kind is taken from the root element.
    pub fn parse(xml: &str) -> Result<Self, SitemapError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut kind: Option<SitemapKind> = None;
        let mut entries = Vec::new();
        let mut depth = 0usize;
        let mut current: Option<EntryBuilder> = None;
        let mut field: Option<Field> = None;
        let mut text = String::new();

        loop {
            match reader
                .read_event()
                .map_err(|e| SitemapError::Xml(e.to_string()))?
            {
                Event::Start(e) => {
                    depth += 1;
                    match depth {
                        1 => kind = Some(SitemapKind::from_root(e.local_name().as_ref())?),
                        2 => {
                            let entry_tag = kind.map(SitemapKind::entry_tag).unwrap_or_default();
                            if e.local_name().as_ref() == entry_tag.as_bytes() {
                                current = Some(EntryBuilder::default());
                            }
                        }
                        3 if current.is_some() => {
                            // Qualified name, so extension children such as
                            // <image:loc> never shadow the protocol fields.
                            field = Field::from_tag(e.name().as_ref());
                            text.clear();
                        }
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    if depth == 0 {
                        kind = Some(SitemapKind::from_root(e.local_name().as_ref())?);
                    }
                }
                Event::Text(t) if depth == 3 && field.is_some() => {
                    let unescaped = t.unescape().map_err(|e| SitemapError::Xml(e.to_string()))?;
                    text.push_str(&unescaped);
                }
                Event::CData(c) if depth == 3 && field.is_some() => {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
                Event::End(_) => {
                    if depth == 3 {
                        if let (Some(f), Some(builder)) = (field.take(), current.as_mut()) {
                            builder.set(f, text.trim())?;
                        }
                    } else if depth == 2 {
                        if let Some(builder) = current.take() {
                            entries.push(builder.finish()?);
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let kind = kind.ok_or(SitemapError::Empty)?;
        Ok(Self { kind, entries })
    }

    /// Parse a stored document and require a specific root kind.
    pub fn parse_as(xml: &str, expected: SitemapKind) -> Result<Self, SitemapError> {
        let doc = Self::parse(xml)?;
        if doc.kind != expected {
            return Err(SitemapError::KindMismatch {
                expected: expected.root_tag(),
                found: doc.kind.root_tag(),
            });
        }
        Ok(doc)
    }

    /// Serialize to sitemap-protocol XML.
    pub fn to_xml(&self) -> String {
        let root = self.kind.root_tag();
        let tag = self.kind.entry_tag();

        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!("<{} xmlns=\"{}\">\n", root, SITEMAP_NAMESPACE));
        for entry in &self.entries {
            out.push_str(&format!("  <{}>\n", tag));
            push_element(&mut out, "loc", &entry.loc);
            if let Some(ref lastmod) = entry.lastmod {
                push_element(&mut out, "lastmod", lastmod);
            }
            if let Some(changefreq) = entry.changefreq {
                push_element(&mut out, "changefreq", changefreq.as_str());
            }
            if let Some(ref priority) = entry.priority {
                push_element(&mut out, "priority", priority);
            }
            out.push_str(&format!("  </{}>\n", tag));
        }
        out.push_str(&format!("</{}>\n", root));
        out
    }
}

fn push_element(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!(
        "    <{name}>{}</{name}>\n",
        quick_xml::escape::escape(value)
    ));
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"loc" => Some(Field::Loc),
            b"lastmod" => Some(Field::LastMod),
            b"changefreq" => Some(Field::ChangeFreq),
            b"priority" => Some(Field::Priority),
            _ => None,
        }
    }
}

#[derive(Default)]
struct EntryBuilder {
    loc: Option<String>,
    lastmod: Option<String>,
    changefreq: Option<ChangeFreq>,
    priority: Option<String>,
}

impl EntryBuilder {
    fn set(&mut self, field: Field, value: &str) -> Result<(), SitemapError> {
        if value.is_empty() {
            return Ok(());
        }
        match field {
            Field::Loc => self.loc = Some(value.to_string()),
            Field::LastMod => self.lastmod = Some(value.to_string()),
            Field::ChangeFreq => self.changefreq = Some(value.parse()?),
            Field::Priority => self.priority = Some(value.to_string()),
        }
        Ok(())
    }

    fn finish(self) -> Result<SitemapEntry, SitemapError> {
        Ok(SitemapEntry {
            loc: self.loc.ok_or(SitemapError::MissingLoc)?,
            lastmod: self.lastmod,
            changefreq: self.changefreq,
            priority: self.priority,
        })
    }
}
