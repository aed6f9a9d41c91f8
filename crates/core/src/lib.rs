//! Identifiers, the domain error model and the entity trait shared by every
//! storefront crate.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CollectionId, ImageId, JobId, ProductId, RunId, ShopId, StepId, WorkflowId};
