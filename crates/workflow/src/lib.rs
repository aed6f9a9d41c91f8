//! Publishing workflows: component registry, typed step inputs, workflow
//! validation and the step executor.
//!
//! ## Design
//!
//! - Components are a closed set of codes (`ComponentCode`) with static metadata
//!   (`ComponentRegistry`): parameters, prerequisite, instance limit.
//! - Step inputs are decoded against the component's parameter schema when a
//!   workflow is loaded, never at point of use.
//! - Implementations live behind the `Step<C>` trait and are looked up through a
//!   `StepRegistry<C>` built at startup. `C` is the caller's run context, so this
//!   crate stays free of provider/storage concerns.

pub mod component;
pub mod error;
pub mod executor;
pub mod params;
pub mod step;
pub mod workflow;

pub use component::{ComponentCode, ComponentKind, ComponentRegistry, ParamSpec, ParamType, WorkflowComponent};
pub use error::{StepError, ValidationError, ValidationIssue, WorkflowError};
pub use executor::{LoadedStep, RunOutcome, RunState, WorkflowExecutor, WorkflowRun};
pub use params::{ParamError, ParamValue, StepInputs, decode_inputs};
pub use step::{Step, StepRegistry};
pub use workflow::{Workflow, WorkflowStep};
