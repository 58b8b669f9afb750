//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use informant_amp::amp::StructuralValidator;
use informant_amp::cms::CmsApi;
use informant_amp::pipeline::Pipeline;
use informant_amp::probe::ImageProbe;
use informant_amp::render::Renderer;
use informant_core::models::{Fragment, MediaSize, Report, ReportId};
use informant_core::store::memory::InMemoryStore;
use informant_core::PublishEngine;

pub const ORIGIN: &str = "https://informant.example.org";
pub const CREATED: &str = "2018-05-14T04:11:47+02:00";
pub const HEADLINE: &str = "Wasserbüffel legen Verkehr auf A3 lahm";
pub const MEDIA: &str = "https://media.example.org/bueffel.jpg";
pub const CANONICAL_KEY: &str = "2018/5/696-wasserbueffel-legen-verkehr-auf-a3-lahm";

/// CMS holding report JSON in memory. Missing ids answer like a 404.
#[derive(Default)]
pub struct FakeCms {
    reports: Mutex<HashMap<String, (Value, Value)>>,
    down: AtomicBool,
}

impl FakeCms {
    pub fn set(&self, report: Value, fragments: Value) {
        let id = match &report["id"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.reports.lock().unwrap().insert(id, (report, fragments));
    }

    pub fn remove(&self, id: &str) {
        self.reports.lock().unwrap().remove(id);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn lookup(&self, id: &ReportId) -> Result<(Value, Value)> {
        if self.down.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        self.reports
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("HTTP status client error (404 Not Found)"))
    }
}

#[async_trait]
impl CmsApi for FakeCms {
    async fn fetch_report(&self, id: &ReportId) -> Result<Report> {
        let (report, _) = self.lookup(id)?;
        Ok(serde_json::from_value(report)?)
    }

    async fn fetch_fragments(&self, id: &ReportId) -> Result<Vec<Fragment>> {
        let (_, fragments) = self.lookup(id)?;
        Ok(serde_json::from_value(fragments)?)
    }
}

/// Probe with a fixed table of known images.
#[derive(Default)]
pub struct FakeProbe {
    sizes: Mutex<HashMap<String, MediaSize>>,
}

impl FakeProbe {
    pub fn with(url: &str, width: u32, height: u32) -> Self {
        let probe = Self::default();
        probe
            .sizes
            .lock()
            .unwrap()
            .insert(url.to_string(), MediaSize { width, height });
        probe
    }
}

#[async_trait]
impl ImageProbe for FakeProbe {
    async fn probe(&self, url: &str) -> Result<MediaSize> {
        self.sizes
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .ok_or_else(|| anyhow!("{}: unrecognized image format", url))
    }
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 5, 20, 12, 0, 0).unwrap()
}

pub fn report_json(id: u64, headline: &str) -> Value {
    json!({
        "id": id,
        "created": CREATED,
        "modified": "2018-05-14T09:30:00+02:00",
        "headline": headline,
        "text": "Heute Morgen gab es auf der A3 bei Leverkusen viel Stau.",
        "media": MEDIA,
        "tags": [{"id": 1265, "name": "A3"}],
        "published": true
    })
}

pub fn fragments_json() -> Value {
    json!([
        {"id": 1539, "question": "Kühe?", "text": "Nein, das sind Wasserbüffel.", "media": null, "report": 696},
        {"id": 1540, "question": "Tiere wieder weg?", "text": "Ja, die A3 ist wieder frei.", "media": null, "report": 696}
    ])
}

pub struct Harness {
    pub cms: Arc<FakeCms>,
    pub store: Arc<InMemoryStore>,
    pub pipeline: Arc<Pipeline>,
}

pub fn harness_with(probe: FakeProbe, renderer: Renderer) -> Harness {
    let cms = Arc::new(FakeCms::default());
    let store = Arc::new(InMemoryStore::new());
    let engine = PublishEngine::new(store.clone(), ORIGIN).with_clock(fixed_now);
    let pipeline = Arc::new(Pipeline::new(
        cms.clone(),
        Arc::new(probe),
        renderer,
        Arc::new(StructuralValidator::new()),
        engine,
    ));
    Harness {
        cms,
        store,
        pipeline,
    }
}

/// Harness with report 696 in the CMS and its media probe-able.
pub fn harness() -> Harness {
    let h = harness_with(
        FakeProbe::with(MEDIA, 1280, 720),
        Renderer::builtin().unwrap(),
    );
    h.cms.set(report_json(696, HEADLINE), fragments_json());
    h
}
