pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;

pub use adapters::storage::LocalStorage;
pub use app::pipelines::{ContactPipeline, ContributorPipeline, ParticipantPipeline};
pub use config::HarvestConfig;
pub use core::etl::{EtlEngine, RunReport};
pub use domain::model::{ContactKind, ContactLink, ContactRecord, ContributorRecord, ParticipantRecord};
pub use domain::policy::{FailurePolicy, RenderMode};
pub use utils::error::{HarvestError, Result};
