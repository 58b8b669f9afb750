//! Request workflows: fetch, render, validate, publish, delete.
//!
//! A [`Pipeline`] wires the CMS client, image probe, renderer, AMP
//! validator, and [`PublishEngine`] together. The HTTP server and the CLI
//! both drive it; neither talks to the collaborators directly.
//!
//! # Update
//!
//! ```text
//! payload ─► id ─► fetch report + fragments ─► probe media sizes
//!                                               │
//!         Validation error ◄─ check ◄─ publish ◄┴─ render + validate
//! ```
//!
//! A page that fails the AMP check is still published; the failure is
//! reported afterwards so the caller can fix the content and republish.
//!
//! # Delete
//!
//! The report must already be gone from the CMS. A successful fetch
//! rejects the request; a failed fetch confirms absence.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use informant_core::error::{PublishError, Result};
use informant_core::models::{MediaSize, Report, ReportId};
use informant_core::{DeleteOutcome, PublishEngine, PublishOutcome};

use crate::amp::{AmpValidator, Severity, StructuralValidator, ValidationResult};
use crate::cms::{CmsApi, HttpCms};
use crate::config::Config;
use crate::probe::{HttpProbe, ImageProbe};
use crate::render::{PageData, Renderer};
use crate::store_s3::S3Store;

/// A rendered page that has not been published.
#[derive(Debug, Serialize)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
    pub validation: ValidationResult,
}

/// Result of a successful update.
#[derive(Debug, Serialize)]
pub struct UpdateOutcome {
    #[serde(flatten)]
    pub publish: PublishOutcome,
    pub validation: ValidationResult,
}

pub struct Pipeline {
    cms: Arc<dyn CmsApi>,
    probe: Arc<dyn ImageProbe>,
    renderer: Renderer,
    validator: Arc<dyn AmpValidator>,
    engine: PublishEngine,
}

impl Pipeline {
    pub fn new(
        cms: Arc<dyn CmsApi>,
        probe: Arc<dyn ImageProbe>,
        renderer: Renderer,
        validator: Arc<dyn AmpValidator>,
        engine: PublishEngine,
    ) -> Self {
        Self {
            cms,
            probe,
            renderer,
            validator,
            engine,
        }
    }

    /// Production wiring: HTTP CMS and probe, S3 store, built-in validator.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(S3Store::from_config(config)?);
        tracing::info!(bucket = %store.bucket(), origin = %config.origin(), "using website bucket");
        Ok(Self::new(
            Arc::new(HttpCms::from_config(config)?),
            Arc::new(HttpProbe::new(Duration::from_secs(config.cms.timeout_secs))?),
            Renderer::from_config(&config.render)?,
            Arc::new(StructuralValidator::new()),
            PublishEngine::new(store, config.origin()),
        ))
    }

    pub fn engine(&self) -> &PublishEngine {
        &self.engine
    }

    /// Handle a raw update request body.
    pub async fn update_report(&self, body: &str) -> Result<UpdateOutcome> {
        let payload = parse_payload(body)?;
        let id = payload_id(&payload)?;
        self.publish(&id).await
    }

    /// Handle a raw delete request body.
    pub async fn delete_report(&self, body: &str) -> Result<DeleteOutcome> {
        let payload = parse_payload(body)?;
        let id = payload_id(&payload)?;
        let created = payload_created(&payload)?;
        self.delete(&id, &created).await
    }

    /// Fetch, render, validate, and publish report `id`.
    pub async fn publish(&self, id: &ReportId) -> Result<UpdateOutcome> {
        let span = tracing::info_span!("update_report", id = %id);
        self.publish_inner(id).instrument(span).await
    }

    async fn publish_inner(&self, id: &ReportId) -> Result<UpdateOutcome> {
        let (report, page) = self.render(id).await?;
        let publish = self.engine.publish_report(&report, &page.html).await?;

        if !page.validation.passed() {
            for failure in &publish.article.failed_redirects {
                tracing::warn!(key = %failure.key, error = %failure.error, "redirect not written");
            }
            return Err(PublishError::Validation {
                url: page.url,
                errors: page.validation.error_count(),
                failed_redirects: publish
                    .article
                    .failed_redirects
                    .into_iter()
                    .map(|f| f.key)
                    .collect(),
            });
        }

        Ok(UpdateOutcome {
            publish,
            validation: page.validation,
        })
    }

    /// Render report `id` without publishing it.
    pub async fn render_report(&self, id: &ReportId) -> Result<RenderedPage> {
        let (_, page) = self.render(id).await?;
        Ok(page)
    }

    async fn render(&self, id: &ReportId) -> Result<(Report, RenderedPage)> {
        let mut report = self
            .cms
            .fetch_report(id)
            .await
            .map_err(PublishError::UpstreamFetch)?;
        let mut fragments = self
            .cms
            .fetch_fragments(id)
            .await
            .map_err(PublishError::UpstreamFetch)?;

        if let Some(size) = self.media_size(report.media.as_deref()).await {
            report.media_size = Some(size);
        }
        for fragment in &mut fragments {
            if let Some(size) = self.media_size(fragment.media.as_deref()).await {
                fragment.media_size = Some(size);
            }
        }

        let url = self.engine.canonical_url(&report);
        let html = self
            .renderer
            .render(&PageData {
                report: &report,
                fragments: &fragments,
                url: &url,
            })
            .map_err(|e| PublishError::BadInput(format!("{:#}", e)))?;

        let validation = self.validator.validate(&html);
        log_validation(&url, &validation);

        Ok((
            report,
            RenderedPage {
                url,
                html,
                validation,
            },
        ))
    }

    /// Probe one media URL. Failures only drop the size.
    async fn media_size(&self, media: Option<&str>) -> Option<MediaSize> {
        let url = media.filter(|m| !m.is_empty())?;
        match self.probe.probe(url).await {
            Ok(size) => Some(size),
            Err(e) => {
                tracing::warn!(media = %url, error = %format!("{:#}", e), "image probe failed");
                None
            }
        }
    }

    /// Unpublish report `id` once the CMS confirms it is gone.
    pub async fn delete(
        &self,
        id: &ReportId,
        created: &DateTime<FixedOffset>,
    ) -> Result<DeleteOutcome> {
        match self.cms.fetch_report(id).await {
            Ok(_) => {
                return Err(PublishError::BadInput(format!(
                    "Report {} still exists",
                    id
                )))
            }
            Err(e) => {
                tracing::debug!(id = %id, error = %format!("{:#}", e), "report is gone from the CMS");
            }
        }
        self.engine.delete_report(id, created).await
    }
}

fn log_validation(url: &str, validation: &ValidationResult) {
    for d in &validation.diagnostics {
        match d.severity {
            Severity::Error => tracing::warn!(
                url,
                line = d.line,
                col = d.col,
                spec_url = d.spec_url.as_deref().unwrap_or_default(),
                "AMP error: {}",
                d.message
            ),
            Severity::Warning => tracing::info!(
                url,
                line = d.line,
                col = d.col,
                "AMP warning: {}",
                d.message
            ),
        }
    }
}

fn parse_payload(body: &str) -> Result<Value> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|_| PublishError::BadInput("Invalid JSON payload".to_string()))?;
    if is_falsy(&payload) {
        return Err(PublishError::BadInput("Missing JSON payload".to_string()));
    }
    Ok(payload)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn payload_id(payload: &Value) -> Result<ReportId> {
    let id = match payload.get("id") {
        Some(Value::Number(n)) => n.as_u64().filter(|n| *n != 0).map(ReportId::from),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            return ReportId::new(s.as_str())
                .ok_or_else(|| PublishError::BadInput(format!("Invalid ID: {}", s)));
        }
        _ => None,
    };
    id.ok_or_else(|| PublishError::BadInput("ID is missing".to_string()))
}

fn payload_created(payload: &Value) -> Result<DateTime<FixedOffset>> {
    let raw = payload
        .get("created")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PublishError::BadInput("Created date is missing".to_string()))?;
    DateTime::parse_from_rfc3339(raw)
        .map_err(|_| PublishError::BadInput(format!("Invalid created date: {}", raw)))
}
