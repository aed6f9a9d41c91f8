//! Workflow executor.
//!
//! A run moves through `Loaded → Validated → Running(i) → Completed | Aborted`.
//! Validation is fail-closed: any issue stops the run before the first step
//! executes, and every issue is reported at once.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use storefront_catalog::Product;
use storefront_core::{ShopId, StepId, WorkflowId};

use crate::component::{ComponentCode, ComponentKind, ComponentRegistry};
use crate::error::{ValidationError, ValidationIssue, WorkflowError};
use crate::params::{StepInputs, decode_inputs};
use crate::step::StepRegistry;
use crate::workflow::Workflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunState {
    Loaded,
    Validated,
    Running { step_index: usize },
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

/// A step with its component metadata resolved and its inputs decoded.
#[derive(Debug, Clone)]
pub struct LoadedStep {
    pub id: StepId,
    pub code: ComponentCode,
    pub order: u32,
    /// `None` when the component is missing from the registry.
    pub kind: Option<ComponentKind>,
    pub inputs: StepInputs,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub batch: Vec<Product>,
    pub steps_run: usize,
}

/// One execution of a workflow over one batch.
pub struct WorkflowRun<C> {
    workflow_id: WorkflowId,
    shop_id: ShopId,
    steps: Vec<LoadedStep>,
    state: RunState,
    load_issues: Vec<ValidationIssue>,
    components: Arc<ComponentRegistry>,
    implementations: Arc<StepRegistry<C>>,
}

impl<C> WorkflowRun<C>
where
    C: Send + Sync,
{
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    pub fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn steps(&self) -> &[LoadedStep] {
        &self.steps
    }

    /// Check prerequisites, instance limits, inputs, implementations and the
    /// presence of an emit step.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        if self.state == RunState::Validated {
            return Ok(());
        }

        let mut issues = self.load_issues.clone();

        let mut counts: BTreeMap<ComponentCode, usize> = BTreeMap::new();
        for step in &self.steps {
            *counts.entry(step.code).or_default() += 1;
        }

        for (&code, &found) in &counts {
            let Some(component) = self.components.get(code) else {
                issues.push(ValidationIssue::UnavailableComponent { code });
                continue;
            };

            if let Some(prerequisite) = component.prerequisite {
                if !counts.contains_key(&prerequisite) {
                    issues.push(ValidationIssue::MissingPrerequisite { code, prerequisite });
                }
            }

            if let Some(limit) = component.instance_limit {
                if found > limit {
                    issues.push(ValidationIssue::InstanceLimitExceeded { code, limit, found });
                }
            }

            if !self.implementations.contains(code) {
                issues.push(ValidationIssue::UnavailableComponent { code });
            }
        }

        if !self
            .steps
            .iter()
            .any(|s| s.kind == Some(ComponentKind::EmitEvent))
        {
            issues.push(ValidationIssue::NoEmitStep);
        }

        let loaded = self.state == RunState::Loaded;
        if issues.is_empty() {
            if loaded {
                self.state = RunState::Validated;
            }
            debug!(workflow_id = %self.workflow_id, steps = self.steps.len(), "workflow validated");
            Ok(())
        } else {
            if loaded {
                self.state = RunState::Aborted;
            }
            warn!(
                workflow_id = %self.workflow_id,
                issues = issues.len(),
                "workflow validation failed"
            );
            Err(ValidationError { issues })
        }
    }

    /// Run every step in order, feeding each step's output into the next.
    pub async fn run(&mut self, ctx: &C, batch: Vec<Product>) -> Result<RunOutcome, WorkflowError> {
        if self.state != RunState::Validated {
            return Err(WorkflowError::InvalidState(format!(
                "run requires a validated workflow, state is {:?}",
                self.state
            )));
        }

        let mut batch = batch;
        for index in 0..self.steps.len() {
            self.state = RunState::Running { step_index: index };
            let step = &self.steps[index];

            let Some(implementation) = self.implementations.get(step.code) else {
                self.state = RunState::Aborted;
                return Err(WorkflowError::InvalidState(format!(
                    "no implementation for {}",
                    step.code
                )));
            };

            let before = batch.len();
            info!(
                workflow_id = %self.workflow_id,
                shop_id = %self.shop_id,
                step_index = index,
                code = %step.code,
                batch_size = before,
                "running workflow step"
            );

            batch = match implementation.run(ctx, batch, &step.inputs).await {
                Ok(next) => next,
                Err(source) => {
                    warn!(
                        workflow_id = %self.workflow_id,
                        step_index = index,
                        code = %step.code,
                        error = %source,
                        "workflow step failed"
                    );
                    self.state = RunState::Aborted;
                    return Err(WorkflowError::StepFailed {
                        index,
                        code: step.code,
                        source,
                    });
                }
            };

            if batch.len() != before {
                debug!(step_index = index, before, after = batch.len(), "batch size changed");
            }
        }

        self.state = RunState::Completed;
        Ok(RunOutcome {
            batch,
            steps_run: self.steps.len(),
        })
    }
}

/// Loads, validates and runs workflows against shared registries.
pub struct WorkflowExecutor<C> {
    components: Arc<ComponentRegistry>,
    implementations: Arc<StepRegistry<C>>,
}

impl<C> Clone for WorkflowExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            components: Arc::clone(&self.components),
            implementations: Arc::clone(&self.implementations),
        }
    }
}

impl<C> WorkflowExecutor<C>
where
    C: Send + Sync,
{
    pub fn new(components: Arc<ComponentRegistry>, implementations: Arc<StepRegistry<C>>) -> Self {
        Self {
            components,
            implementations,
        }
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Resolve metadata, sort by order and decode inputs. Problems are kept for
    /// the validate phase.
    pub fn load(&self, workflow: &Workflow) -> WorkflowRun<C> {
        let mut load_issues = Vec::new();
        let mut steps = Vec::with_capacity(workflow.steps().len());

        for step in workflow.ordered_steps() {
            let component = self.components.get(step.code);
            let inputs = match component {
                Some(component) => match decode_inputs(component, &step.inputs) {
                    Ok(inputs) => inputs,
                    Err(errors) => {
                        load_issues.extend(errors.into_iter().map(|error| {
                            ValidationIssue::InvalidParameter {
                                step_id: step.id,
                                code: step.code,
                                error,
                            }
                        }));
                        StepInputs::default()
                    }
                },
                None => StepInputs::default(),
            };

            steps.push(LoadedStep {
                id: step.id,
                code: step.code,
                order: step.order,
                kind: component.map(|c| c.kind),
                inputs,
            });
        }

        WorkflowRun {
            workflow_id: workflow.id,
            shop_id: workflow.shop_id,
            steps,
            state: RunState::Loaded,
            load_issues,
            components: Arc::clone(&self.components),
            implementations: Arc::clone(&self.implementations),
        }
    }

    pub fn validate_workflow(&self, workflow: &Workflow) -> Result<(), ValidationError> {
        self.load(workflow).validate()
    }

    /// Load, validate and run `workflow` over `batch`.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        ctx: &C,
        batch: Vec<Product>,
    ) -> Result<RunOutcome, WorkflowError> {
        let mut run = self.load(workflow);
        run.validate()?;
        run.run(ctx, batch).await
    }
}
