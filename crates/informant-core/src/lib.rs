//! # Informant Core
//!
//! The publishing engine behind Informant AMP: it decides which object-store
//! keys to write, redirect, or delete for one report, and merges the change
//! into the month sitemap and the global sitemap index.
//!
//! This crate contains no tokio, HTTP, or filesystem code. All I/O goes
//! through the [`store::ObjectStore`] trait, so the engine runs unchanged
//! against S3 or the [`store::memory::InMemoryStore`] used in tests.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Report, fragment, and period types |
//! | [`slug`] | Headline slugification |
//! | [`keys`] | Canonical key and id-prefix resolution |
//! | [`sitemap`] | Typed sitemap / sitemap-index documents |
//! | [`sitemap_store`] | Load-or-bootstrap and save-or-delete of sitemaps |
//! | [`publisher`] | Article writes and redirect fan-out |
//! | [`engine`] | Publish / unpublish orchestration |
//! | [`store`] | Object store abstraction |
//! | [`error`] | Typed failure kinds |

pub mod engine;
pub mod error;
pub mod keys;
pub mod models;
pub mod publisher;
pub mod sitemap;
pub mod sitemap_store;
pub mod slug;
pub mod store;

pub use engine::{DeleteOutcome, PublishEngine, PublishOutcome};
pub use error::{PublishError, Result};
pub use keys::ArticleKeys;
pub use models::{Fragment, MediaSize, Period, Report};
pub use slug::slugify;
