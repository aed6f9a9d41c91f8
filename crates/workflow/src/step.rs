use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use storefront_catalog::Product;

use crate::component::ComponentCode;
use crate::error::StepError;
use crate::params::StepInputs;

/// Implementation of one component.
///
/// `C` is the run context supplied by the caller (provider handles, run cache,
/// collaborators). A step receives the current batch and returns the batch for
/// the next step; filters return fewer products.
#[async_trait]
pub trait Step<C>: Send + Sync
where
    C: Send + Sync,
{
    fn code(&self) -> ComponentCode;

    async fn run(
        &self,
        ctx: &C,
        batch: Vec<Product>,
        inputs: &StepInputs,
    ) -> Result<Vec<Product>, StepError>;
}

/// Component code → implementation, built once at startup.
pub struct StepRegistry<C> {
    steps: HashMap<ComponentCode, Arc<dyn Step<C>>>,
}

impl<C> Default for StepRegistry<C> {
    fn default() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }
}

impl<C> StepRegistry<C>
where
    C: Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `step` under its own code, replacing any previous implementation.
    pub fn register<S>(&mut self, step: S) -> &mut Self
    where
        S: Step<C> + 'static,
    {
        self.steps.insert(step.code(), Arc::new(step));
        self
    }

    pub fn with<S>(mut self, step: S) -> Self
    where
        S: Step<C> + 'static,
    {
        self.register(step);
        self
    }

    pub fn get(&self, code: ComponentCode) -> Option<Arc<dyn Step<C>>> {
        self.steps.get(&code).cloned()
    }

    pub fn contains(&self, code: ComponentCode) -> bool {
        self.steps.contains_key(&code)
    }

    pub fn codes(&self) -> Vec<ComponentCode> {
        let mut codes: Vec<_> = self.steps.keys().copied().collect();
        codes.sort();
        codes
    }
}

impl<C> core::fmt::Debug for StepRegistry<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut codes: Vec<_> = self.steps.keys().collect();
        codes.sort();
        f.debug_struct("StepRegistry").field("codes", &codes).finish()
    }
}
