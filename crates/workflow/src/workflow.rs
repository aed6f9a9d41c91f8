use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use storefront_core::{DomainError, DomainResult, Entity, ShopId, StepId, WorkflowId};

use crate::component::{ComponentCode, ComponentRegistry};
use crate::params::decode_inputs;

/// A configured step: component code, raw inputs and an explicit order number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub code: ComponentCode,
    pub order: u32,
    #[serde(default)]
    pub inputs: Map<String, JsonValue>,
}

impl WorkflowStep {
    pub fn new(code: ComponentCode, order: u32, inputs: Map<String, JsonValue>) -> Self {
        Self {
            id: StepId::new(),
            code,
            order,
            inputs,
        }
    }
}

/// The step chain configured for one shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub shop_id: ShopId,
    steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(shop_id: ShopId) -> Self {
        Self {
            id: WorkflowId::new(),
            shop_id,
            steps: Vec::new(),
        }
    }

    /// Rebuild a stored workflow without re-checking its steps.
    ///
    /// Stored data is checked by the executor's validate phase instead.
    pub fn from_parts(id: WorkflowId, shop_id: ShopId, steps: Vec<WorkflowStep>) -> Self {
        Self { id, shop_id, steps }
    }

    /// Add a step after checking the component's instance limit and parameter schema.
    ///
    /// Prerequisites are not checked here; they are resolved when the workflow is
    /// validated, so steps may be added in any order.
    pub fn insert_step(
        &mut self,
        registry: &ComponentRegistry,
        step: WorkflowStep,
    ) -> DomainResult<StepId> {
        let component = registry.get(step.code).ok_or_else(|| {
            DomainError::validation(format!("component {} is not registered", step.code))
        })?;

        if let Some(limit) = component.instance_limit {
            let existing = self.steps.iter().filter(|s| s.code == step.code).count();
            if existing >= limit {
                return Err(DomainError::conflict(format!(
                    "{} may appear at most {limit} time(s)",
                    step.code
                )));
            }
        }

        if let Err(errors) = decode_inputs(component, &step.inputs) {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DomainError::validation(message));
        }

        let id = step.id;
        self.steps.push(step);
        Ok(id)
    }

    pub fn remove_step(&mut self, step_id: StepId) -> DomainResult<WorkflowStep> {
        let pos = self
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or_else(DomainError::not_found)?;
        Ok(self.steps.remove(pos))
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    /// Steps by ascending order number. Ties keep insertion order.
    pub fn ordered_steps(&self) -> Vec<&WorkflowStep> {
        let mut steps: Vec<&WorkflowStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }

    pub fn contains(&self, code: ComponentCode) -> bool {
        self.steps.iter().any(|s| s.code == code)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Entity for Workflow {
    type Id = WorkflowId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
