//! CMS API client.
//!
//! Reports and their fragments are read from the CMS REST API:
//!
//! | Request | Response |
//! |---------|----------|
//! | `GET {base}v1/reports/{id}` | one report object |
//! | `GET {base}v1/reports/fragments/?report={id}` | ordered fragment list |
//!
//! Any failure (transport, non-2xx status, or undecodable body) is an error.
//! The delete workflow relies on this: a failed report fetch is what
//! confirms that the report is gone.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use informant_core::models::{Fragment, Report, ReportId};

use crate::config::Config;

/// Read access to the CMS.
#[async_trait]
pub trait CmsApi: Send + Sync {
    async fn fetch_report(&self, id: &ReportId) -> Result<Report>;

    async fn fetch_fragments(&self, id: &ReportId) -> Result<Vec<Fragment>>;
}

/// [`CmsApi`] over HTTP.
pub struct HttpCms {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCms {
    /// `base_url` must end with a slash.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build CMS HTTP client")?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.cms_api_url(),
            Duration::from_secs(config.cms.timeout_secs),
        )
    }

    fn report_url(&self, id: &ReportId) -> String {
        format!("{}v1/reports/{}", self.base_url, id)
    }

    fn fragments_url(&self, id: &ReportId) -> String {
        format!("{}v1/reports/fragments/?report={}", self.base_url, id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?;
        resp.json::<T>()
            .await
            .with_context(|| format!("GET {} returned an unexpected body", url))
    }
}

#[async_trait]
impl CmsApi for HttpCms {
    async fn fetch_report(&self, id: &ReportId) -> Result<Report> {
        let url = self.report_url(id);
        tracing::debug!(%url, "fetching report");
        self.get_json(&url).await
    }

    async fn fetch_fragments(&self, id: &ReportId) -> Result<Vec<Fragment>> {
        let url = self.fragments_url(id);
        tracing::debug!(%url, "fetching fragments");
        self.get_json(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let cms = HttpCms::new("https://cms.example.org/", Duration::from_secs(1)).unwrap();
        let id = ReportId::from(696);
        assert_eq!(cms.report_url(&id), "https://cms.example.org/v1/reports/696");
        assert_eq!(
            cms.fragments_url(&id),
            "https://cms.example.org/v1/reports/fragments/?report=696"
        );
    }
}
