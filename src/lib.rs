//! # Informant AMP
//!
//! Publishes editorial reports from the Informant CMS as static AMP pages
//! into an S3 website bucket, and keeps the per-month sitemaps and the
//! global sitemap index in sync with what is published.
//!
//! The key and sitemap bookkeeping lives in the `informant-core` crate;
//! this crate adds the collaborators around it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │   CMS    │──▶│ Pipeline                     │──▶│    S3    │
//! │  (HTTP)  │   │ probe → render → validate    │   │ website  │
//! └──────────┘   │ → PublishEngine (core)       │   │  bucket  │
//!                └──────────────┬───────────────┘   └──────────┘
//!                      ┌────────┴────────┐
//!                      ▼                 ▼
//!                 ┌──────────┐     ┌──────────┐
//!                 │   CLI    │     │ webhook  │
//!                 │informant │     │  server  │
//!                 └──────────┘     └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`cms`] | CMS API client |
//! | [`probe`] | Remote image dimension probing |
//! | [`render`] | Handlebars AMP page rendering |
//! | [`amp`] | AMP markup validation |
//! | [`store_s3`] | S3 object store with SigV4 signing |
//! | [`pipeline`] | Update and delete workflows |
//! | [`server`] | Webhook HTTP server |

pub mod amp;
pub mod cms;
pub mod config;
pub mod pipeline;
pub mod probe;
pub mod render;
pub mod server;
pub mod store_s3;
