use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub cms: CmsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SiteConfig {
    /// Public site root, e.g. `https://informant.example.org`.
    pub origin: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CmsConfig {
    /// CMS API base; `v1/reports/...` is appended.
    pub api_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Website bucket. Defaults to `{service}-web-{stage}`.
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    pub endpoint_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: default_region(),
            endpoint_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_region() -> String {
    "eu-central-1".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RenderConfig {
    /// Handlebars template overriding the built-in AMP page.
    pub template: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeployConfig {
    #[serde(default = "default_service")]
    pub service: String,
    pub stage: Option<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            stage: None,
        }
    }
}

fn default_service() -> String {
    "hackingstudio-informant-amp".to_string()
}

impl Config {
    /// Deployment stage: `SLS_STAGE`, then `DEPLOY_ALIAS`, then the config
    /// file, then `dev`.
    pub fn stage(&self) -> String {
        self.stage_with(|k| std::env::var(k).ok())
    }

    fn stage_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        let non_empty = |s: &String| !s.is_empty();
        env("SLS_STAGE")
            .filter(non_empty)
            .or_else(|| env("DEPLOY_ALIAS").filter(non_empty))
            .or_else(|| self.deploy.stage.clone().filter(non_empty))
            .unwrap_or_else(|| "dev".to_string())
    }

    pub fn bucket_name(&self) -> String {
        self.store
            .bucket
            .clone()
            .unwrap_or_else(|| format!("{}-web-{}", self.deploy.service, self.stage()))
    }

    /// Site origin without trailing slash. Only valid after [`load_config`].
    pub fn origin(&self) -> &str {
        self.site.origin.as_deref().unwrap_or_default()
    }

    /// CMS API base with trailing slash. Only valid after [`load_config`].
    pub fn cms_api_url(&self) -> &str {
        self.cms.api_url.as_deref().unwrap_or_default()
    }

    /// Overlay the environment variables the Lambda deployment used.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env("CMS_API_URL") {
            self.cms.api_url = Some(url);
        }
        if let Some(bucket) = env("BUCKET_NAME") {
            self.store.bucket = Some(bucket);
        }
        if let Some(origin) = env("SITE_ORIGIN") {
            self.site.origin = Some(origin);
        }
        if let Some(region) = env("AWS_REGION") {
            self.store.region = region;
        }
    }

    fn validate(&mut self) -> Result<()> {
        let origin = match self.site.origin.as_deref() {
            Some(o) if !o.trim().is_empty() => o.trim().trim_end_matches('/').to_string(),
            _ => bail!("site.origin must be set (or SITE_ORIGIN)"),
        };
        if !(origin.starts_with("https://") || origin.starts_with("http://")) {
            bail!("site.origin must be an http(s) URL, got '{}'", origin);
        }
        self.site.origin = Some(origin);

        let api_url = match self.cms.api_url.as_deref() {
            Some(u) if !u.trim().is_empty() => u.trim().to_string(),
            _ => bail!("cms.api_url must be set (or CMS_API_URL)"),
        };
        self.cms.api_url = Some(if api_url.ends_with('/') {
            api_url
        } else {
            format!("{}/", api_url)
        });

        if self.cms.timeout_secs == 0 {
            bail!("cms.timeout_secs must be > 0");
        }
        if self.store.timeout_secs == 0 {
            bail!("store.timeout_secs must be > 0");
        }
        if self.store.region.trim().is_empty() {
            bail!("store.region must not be empty");
        }
        Ok(())
    }
}

/// Load the TOML config at `path`, overlay environment variables, and
/// validate. A missing file is allowed when the environment supplies the
/// required settings.
pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with(path, |k| std::env::var(k).ok())
}

fn load_config_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    config.apply_env(env);
    config.validate()?;
    Ok(config)
}
