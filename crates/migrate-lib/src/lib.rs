//! `migrate-lib` — Pivotal Tracker to Shortcut migration library.
//!
//! Turns a Pivotal CSV export into Shortcut stories, epics, iterations,
//! labels, and file attachments, created through the rate-limited REST
//! client in dependency order, and provides the post-migration
//! reconciliation utilities that repair cross-entity links afterwards.
//!
//! # Quick Start
//!
//! ```no_run
//! use migrate_lib::api::ShortcutClient;
//! use migrate_lib::builder::build_entity;
//! use migrate_lib::collector::{EntityCollector, Tally};
//! use migrate_lib::mapping::RunContext;
//! use migrate_lib::rowparse::ExportReader;
//!
//! # fn run(ctx: &RunContext) -> migrate_lib::Result<()> {
//! let mut api = ShortcutClient::new(std::env::var("SHORTCUT_API_TOKEN").unwrap());
//! let mut collector = EntityCollector::new(&mut api, ctx, None);
//!
//! let mut stats = Tally::default();
//! for row in ExportReader::open("pivotal_export.csv".as_ref())? {
//!     stats.merge(&collector.collect(build_entity(ctx, row?)));
//! }
//! let manifest = collector.commit()?;
//! migrate_lib::manifest::save("created_entities.csv".as_ref(), &manifest)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod builder;
pub mod collector;
pub mod error;
pub mod manifest;
pub mod mapping;
pub mod model;
pub mod ratelimit;
pub mod reconcile;
pub mod rowparse;
pub mod workspace;

pub use builder::build_entity;
pub use collector::{EntityCollector, Tally, BATCH_SIZE};
pub use error::{MigrateError, Result};
pub use mapping::RunContext;
pub use model::{CreatedEntity, Entity, EntityKind, ParsedRow};
pub use workspace::WorkspaceSnapshot;
