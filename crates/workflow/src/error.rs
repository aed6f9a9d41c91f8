use serde::Serialize;
use thiserror::Error;

use storefront_core::StepId;

use crate::component::ComponentCode;
use crate::params::ParamError;

/// One reason a workflow cannot run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ValidationIssue {
    #[error("step {code} requires a {prerequisite} step")]
    MissingPrerequisite {
        code: ComponentCode,
        prerequisite: ComponentCode,
    },

    #[error("{code} may appear at most {limit} time(s), found {found}")]
    InstanceLimitExceeded {
        code: ComponentCode,
        limit: usize,
        found: usize,
    },

    #[error("step {step_id} ({code}): {error}")]
    InvalidParameter {
        step_id: StepId,
        code: ComponentCode,
        error: ParamError,
    },

    #[error("no implementation registered for {code}")]
    UnavailableComponent { code: ComponentCode },

    #[error("workflow has no step that publishes to the shop")]
    NoEmitStep,
}

/// Every issue found while validating a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("workflow is invalid: {}", summary(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn summary(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure raised by a step implementation.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("reconciliation failed: {0}")]
    Reconciliation(String),

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("repository error: {0}")]
    Repository(String),
}

impl StepError {
    /// Whether re-running the whole batch later may succeed.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, StepError::Input(_))
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("step {index} ({code}) failed: {source}")]
    StepFailed {
        index: usize,
        code: ComponentCode,
        #[source]
        source: StepError,
    },

    #[error("unknown component code `{0}`")]
    UnknownComponent(String),

    #[error("invalid run state: {0}")]
    InvalidState(String),
}

impl WorkflowError {
    /// Validation and state problems are permanent; step failures defer to the step.
    pub fn is_retriable(&self) -> bool {
        match self {
            WorkflowError::StepFailed { source, .. } => source.is_retriable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_issue() {
        let err = ValidationError {
            issues: vec![
                ValidationIssue::NoEmitStep,
                ValidationIssue::UnavailableComponent {
                    code: ComponentCode::RewriteName,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("no step that publishes"));
        assert!(text.contains("rewrite_name"));
    }

    #[test]
    fn only_step_failures_may_be_retried() {
        let provider = WorkflowError::StepFailed {
            index: 2,
            code: ComponentCode::EmitToShop,
            source: StepError::Provider("timeout".into()),
        };
        let input = WorkflowError::StepFailed {
            index: 0,
            code: ComponentCode::AdjustPrice,
            source: StepError::Input("percent".into()),
        };
        let invalid = WorkflowError::Invalid(ValidationError { issues: vec![] });

        assert!(provider.is_retriable());
        assert!(!input.is_retriable());
        assert!(!invalid.is_retriable());
    }
}
