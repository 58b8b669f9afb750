//! AMP page rendering.
//!
//! Pages are rendered with Handlebars from a [`PageData`] value. The
//! built-in template lives in `templates/report.html.hbs` and is compiled
//! into the binary; `[render] template` in the config replaces it with a
//! file read at startup.
//!
//! Template data:
//!
//! | Path | Content |
//! |------|---------|
//! | `report` | the CMS report, plus `mediaSize` when its media was probed |
//! | `fragments` | ordered fragments, each with optional `mediaSize` |
//! | `url` | canonical public URL of the page |
//!
//! Helpers: `format_date` turns an RFC 3339 timestamp into `DD.MM.YYYY, HH:MM`.

use std::path::Path;

use anyhow::{Context, Result};
use handlebars::{handlebars_helper, Handlebars};
use serde::Serialize;

use informant_core::models::{Fragment, Report};

use crate::config::RenderConfig;

const TEMPLATE_NAME: &str = "report";
const BUILTIN_TEMPLATE: &str = include_str!("../templates/report.html.hbs");

handlebars_helper!(format_date: |value: str| {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.format("%d.%m.%Y, %H:%M").to_string())
        .unwrap_or_else(|_| value.to_string())
});

/// Everything a page template can see.
#[derive(Debug, Serialize)]
pub struct PageData<'a> {
    pub report: &'a Report,
    pub fragments: &'a [Fragment],
    pub url: &'a str,
}

/// Compiled page template.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Renderer {
    /// Renderer using the built-in AMP template.
    pub fn builtin() -> Result<Self> {
        Self::from_source(BUILTIN_TEMPLATE)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template: {}", path.display()))?;
        Self::from_source(&source)
            .with_context(|| format!("Failed to compile template: {}", path.display()))
    }

    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        match config.template {
            Some(ref path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    fn from_source(source: &str) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_helper("format_date", Box::new(format_date));
        registry
            .register_template_string(TEMPLATE_NAME, source)
            .context("Invalid page template")?;
        Ok(Self { registry })
    }

    pub fn render(&self, data: &PageData<'_>) -> Result<String> {
        self.registry
            .render(TEMPLATE_NAME, data)
            .with_context(|| format!("Failed to render page for report {}", data.report.id))
    }
}
