//! AMP page validation.
//!
//! [`AmpValidator`] checks a rendered page before it is reported as
//! published. The built-in [`StructuralValidator`] covers the required
//! AMP document markup and the tags AMP forbids; it does not evaluate CSS
//! limits or extension-specific attribute rules.
//!
//! Every problem becomes a [`Diagnostic`] with a 1-based line and column
//! pointing at the offending tag (or at the start of the document for
//! missing elements).

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const SPEC_REQUIRED_MARKUP: &str = "https://amp.dev/documentation/guides-and-tutorials/learn/spec/amphtml#required-markup";
const SPEC_HTML_TAGS: &str = "https://amp.dev/documentation/guides-and-tutorials/learn/spec/amphtml#html-tags";
const SPEC_AMP_IMG: &str = "https://amp.dev/documentation/components/amp-img";
const AMP_RUNTIME: &str = "https://cdn.ampproject.org/v0.js";
const AMP_CDN: &str = "https://cdn.ampproject.org/";

/// Tags AMP replaces with its own components (or forbids outright).
const FORBIDDEN_TAGS: &[(&str, Option<&str>)] = &[
    ("img", Some("amp-img")),
    ("video", Some("amp-video")),
    ("audio", Some("amp-audio")),
    ("iframe", Some("amp-iframe")),
    ("frame", None),
    ("frameset", None),
    ("object", None),
    ("embed", None),
    ("applet", None),
    ("base", None),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub col: usize,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let status = if diagnostics.iter().any(|d| d.severity == Severity::Error) {
            ValidationStatus::Fail
        } else {
            ValidationStatus::Pass
        };
        Self {
            status,
            diagnostics,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Pass
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }
}

/// Checks a rendered page against AMP rules.
pub trait AmpValidator: Send + Sync {
    fn validate(&self, html: &str) -> ValidationResult;
}

/// Markup-level AMP checks without a network round trip.
#[derive(Debug, Default, Clone)]
pub struct StructuralValidator;

impl StructuralValidator {
    pub fn new() -> Self {
        Self
    }
}

/// One start tag found in the document.
#[derive(Debug)]
struct Tag {
    name: String,
    attrs: Vec<(String, Option<String>)>,
    offset: usize,
}

impl Tag {
    fn has(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_deref())
    }
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^<(/?)([A-Za-z][A-Za-z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
            .expect("valid tag regex")
    })
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
            .expect("valid attribute regex")
    })
}

fn parse_attrs(raw: &str) -> Vec<(String, Option<String>)> {
    attr_regex()
        .captures_iter(raw)
        .map(|c| {
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| m.as_str().to_string());
            (c[1].to_ascii_lowercase(), value)
        })
        .collect()
}

/// All start tags, skipping comments and the bodies of `script`/`style`.
fn scan_tags(html: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(rel) = html[pos..].find('<') {
        let start = pos + rel;
        let rest = &html[start..];

        if rest.starts_with("<!--") {
            pos = match rest.find("-->") {
                Some(end) => start + end + 3,
                None => html.len(),
            };
            continue;
        }

        let Some(caps) = tag_regex().captures(rest) else {
            pos = start + 1;
            continue;
        };
        let end = start + caps[0].len();
        if &caps[1] == "/" {
            pos = end;
            continue;
        }

        let name = caps[2].to_ascii_lowercase();
        tags.push(Tag {
            attrs: parse_attrs(&caps[3]),
            name: name.clone(),
            offset: start,
        });

        pos = end;
        if name == "script" || name == "style" {
            let close = format!("</{}", name);
            pos = match html[pos..].to_ascii_lowercase().find(&close) {
                Some(rel_close) => pos + rel_close,
                None => html.len(),
            };
        }
    }

    tags
}

/// 1-based line and column (in characters) of a byte offset.
fn line_col(html: &str, offset: usize) -> (usize, usize) {
    let before = &html[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let col = before[line_start..].chars().count() + 1;
    (line, col)
}

struct Collector<'a> {
    html: &'a str,
    diagnostics: Vec<Diagnostic>,
}

impl Collector<'_> {
    fn push(&mut self, offset: usize, severity: Severity, message: String, spec_url: &str) {
        let (line, col) = line_col(self.html, offset);
        self.diagnostics.push(Diagnostic {
            line,
            col,
            message,
            severity,
            spec_url: Some(spec_url.to_string()),
        });
    }

    fn error(&mut self, offset: usize, message: impl Into<String>, spec_url: &str) {
        self.push(offset, Severity::Error, message.into(), spec_url);
    }

    fn warning(&mut self, offset: usize, message: impl Into<String>, spec_url: &str) {
        self.push(offset, Severity::Warning, message.into(), spec_url);
    }
}

impl AmpValidator for StructuralValidator {
    fn validate(&self, html: &str) -> ValidationResult {
        let mut out = Collector {
            html,
            diagnostics: Vec::new(),
        };

        let leading = html.len() - html.trim_start().len();
        if !html.trim_start().to_ascii_lowercase().starts_with("<!doctype html>") {
            out.error(
                leading,
                "The mandatory '<!doctype html>' declaration is missing.",
                SPEC_REQUIRED_MARKUP,
            );
        }

        let tags = scan_tags(html);

        match tags.iter().find(|t| t.name == "html") {
            Some(t) if t.has("⚡") || t.has("amp") => {}
            Some(t) => out.error(
                t.offset,
                "The mandatory attribute '⚡' is missing in tag 'html'.",
                SPEC_REQUIRED_MARKUP,
            ),
            None => out.error(0, "The mandatory tag 'html' is missing.", SPEC_REQUIRED_MARKUP),
        }

        let has_charset = tags.iter().any(|t| {
            t.name == "meta"
                && t
                    .get("charset")
                    .is_some_and(|c| c.eq_ignore_ascii_case("utf-8"))
        });
        if !has_charset {
            out.error(
                0,
                "The mandatory tag 'meta charset=utf-8' is missing.",
                SPEC_REQUIRED_MARKUP,
            );
        }

        let has_viewport = tags
            .iter()
            .any(|t| t.name == "meta" && t.get("name") == Some("viewport"));
        if !has_viewport {
            out.error(
                0,
                "The mandatory tag 'meta name=viewport' is missing.",
                SPEC_REQUIRED_MARKUP,
            );
        }

        let has_canonical = tags.iter().any(|t| {
            t.name == "link"
                && t.get("rel")
                    .is_some_and(|rel| rel.split_whitespace().any(|r| r == "canonical"))
                && t.get("href").is_some_and(|h| !h.is_empty())
        });
        if !has_canonical {
            out.error(
                0,
                "The mandatory tag 'link rel=canonical' is missing.",
                SPEC_REQUIRED_MARKUP,
            );
        }

        let has_runtime = tags.iter().any(|t| {
            t.name == "script" && t.get("src") == Some(AMP_RUNTIME) && t.has("async")
        });
        if !has_runtime {
            out.error(
                0,
                "The mandatory tag 'amphtml engine v0.js script' is missing.",
                SPEC_REQUIRED_MARKUP,
            );
        }

        if !tags
            .iter()
            .any(|t| t.name == "style" && t.has("amp-boilerplate"))
        {
            out.error(
                0,
                "The mandatory tag 'style amp-boilerplate' is missing.",
                SPEC_REQUIRED_MARKUP,
            );
        }

        let has_amp_form = tags
            .iter()
            .any(|t| t.name == "script" && t.get("custom-element") == Some("amp-form"));

        let mut custom_styles = 0;
        for tag in &tags {
            if let Some((_, replacement)) = FORBIDDEN_TAGS.iter().find(|(n, _)| *n == tag.name) {
                let message = match replacement {
                    Some(r) => format!(
                        "The tag '{}' may only appear as a descendant of tag 'noscript'. Did you mean '{}'?",
                        tag.name, r
                    ),
                    None => format!("The tag '{}' is disallowed.", tag.name),
                };
                out.error(tag.offset, message, SPEC_HTML_TAGS);
                continue;
            }

            match tag.name.as_str() {
                "form" if !has_amp_form => out.error(
                    tag.offset,
                    "The tag 'form' requires including the 'amp-form' extension JavaScript.",
                    SPEC_HTML_TAGS,
                ),
                "script" => {
                    let src = tag.get("src").unwrap_or_default();
                    let json = matches!(
                        tag.get("type"),
                        Some("application/ld+json") | Some("application/json")
                    );
                    if !json && !src.starts_with(AMP_CDN) {
                        out.error(
                            tag.offset,
                            "Custom JavaScript is not allowed.",
                            SPEC_HTML_TAGS,
                        );
                    }
                }
                "style" => {
                    if tag.has("amp-custom") {
                        custom_styles += 1;
                        if custom_styles > 1 {
                            out.error(
                                tag.offset,
                                "The tag 'style amp-custom' appears more than once in the document.",
                                SPEC_HTML_TAGS,
                            );
                        }
                    } else if !tag.has("amp-boilerplate") {
                        out.error(
                            tag.offset,
                            "The tag 'style' is only allowed with the 'amp-custom' or 'amp-boilerplate' attribute.",
                            SPEC_HTML_TAGS,
                        );
                    }
                }
                "amp-img" => {
                    let layout = tag.get("layout").unwrap_or_default();
                    let sized = tag.has("width") && tag.has("height");
                    if !sized && !matches!(layout, "fill" | "nodisplay" | "flex-item") {
                        out.error(
                            tag.offset,
                            "The implied layout 'CONTAINER' is not supported by tag 'amp-img'; set 'width' and 'height'.",
                            SPEC_AMP_IMG,
                        );
                    }
                    if !tag.has("alt") {
                        out.warning(
                            tag.offset,
                            "The tag 'amp-img' should have an 'alt' attribute.",
                            SPEC_AMP_IMG,
                        );
                    }
                }
                _ => {}
            }
        }

        ValidationResult::from_diagnostics(out.diagnostics)
    }
}
