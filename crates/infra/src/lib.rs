//! Infrastructure layer: provider clients and adapters, reconciliation,
//! concrete pipeline steps, publish jobs, persistence and configuration.

pub mod collaborators;
pub mod config;
pub mod context;
pub mod guard;
pub mod jobs;
pub mod media;
pub mod pipeline;
pub mod providers;
pub mod publisher;
pub mod reconcile;
pub mod repository;
pub mod run;
pub mod steps;


pub use config::PublisherConfig;
pub use context::{EmitLedger, PublishContext, Services};
pub use guard::{ShopGuard, ShopGuards};
pub use pipeline::{BatchOutcome, BatchReport, PipelineError, PublishPipeline, SkipReason};
pub use publisher::{Publisher, PublisherError};
pub use run::{PublishRun, RunCache};
