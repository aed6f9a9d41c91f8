//! Static catalog of pipeline step types.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::params::ParamValue;

/// Stable identifier of a step type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCode {
    SyncImages,
    SetImageMetadata,
    RewriteName,
    NameTemplate,
    AdjustPrice,
    FilterByPrice,
    EmitToShop,
}

impl ComponentCode {
    pub const ALL: [ComponentCode; 7] = [
        ComponentCode::SyncImages,
        ComponentCode::SetImageMetadata,
        ComponentCode::RewriteName,
        ComponentCode::NameTemplate,
        ComponentCode::AdjustPrice,
        ComponentCode::FilterByPrice,
        ComponentCode::EmitToShop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentCode::SyncImages => "sync_images",
            ComponentCode::SetImageMetadata => "set_image_metadata",
            ComponentCode::RewriteName => "rewrite_name",
            ComponentCode::NameTemplate => "name_template",
            ComponentCode::AdjustPrice => "adjust_price",
            ComponentCode::FilterByPrice => "filter_by_price",
            ComponentCode::EmitToShop => "emit_to_shop",
        }
    }
}

impl core::fmt::Display for ComponentCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentCode {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentCode::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownComponent(s.to_string()))
    }
}

/// What a component does to the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Mutates products, keeps the batch size.
    Transform,
    /// May drop products from the batch.
    Filter,
    /// Pushes the batch to the shop's provider; terminal for publish status.
    EmitEvent,
}

/// Declared type of a step parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Text,
    Integer,
    Decimal,
    Boolean,
}

/// One declared parameter.
///
/// A `constant` parameter always takes its default; steps may not override it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub constant: bool,
    pub required: bool,
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            constant: false,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            constant: false,
            required: false,
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: ParamValue) -> Self {
        Self {
            name: name.into(),
            ty: default.param_type(),
            constant: false,
            required: false,
            default: Some(default),
        }
    }

    pub fn constant(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            ty: value.param_type(),
            constant: true,
            required: false,
            default: Some(value),
        }
    }
}

/// Registry entry describing one step type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowComponent {
    pub code: ComponentCode,
    pub display_name: String,
    pub kind: ComponentKind,
    pub params: Vec<ParamSpec>,
    pub prerequisite: Option<ComponentCode>,
    /// Maximum number of steps with this code in one workflow.
    pub instance_limit: Option<usize>,
}

impl WorkflowComponent {
    pub fn new(code: ComponentCode, display_name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            code,
            display_name: display_name.into(),
            kind,
            params: Vec::new(),
            prerequisite: None,
            instance_limit: None,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn requires(mut self, prerequisite: ComponentCode) -> Self {
        self.prerequisite = Some(prerequisite);
        self
    }

    pub fn limit(mut self, max: usize) -> Self {
        self.instance_limit = Some(max);
        self
    }

    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Lookup table of component metadata, keyed by code.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: BTreeMap<ComponentCode, WorkflowComponent>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The components shipped with the publisher.
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.register(
            WorkflowComponent::new(ComponentCode::SyncImages, "Sync images to storage", ComponentKind::Transform)
                .param(ParamSpec::with_default("folder", ParamValue::Text("products".to_string())))
                .param(ParamSpec::constant("overwrite", ParamValue::Boolean(true))),
        );
        registry.register(
            WorkflowComponent::new(
                ComponentCode::SetImageMetadata,
                "Write image metadata tag",
                ComponentKind::Transform,
            )
            .param(ParamSpec::required("tag", ParamType::Text))
            .param(ParamSpec::required("value", ParamType::Text))
            .requires(ComponentCode::SyncImages),
        );
        registry.register(
            WorkflowComponent::new(ComponentCode::RewriteName, "Rewrite product names", ComponentKind::Transform)
                .param(ParamSpec::required("instructions", ParamType::Text))
                .param(ParamSpec::with_default("max_length", ParamValue::Integer(120))),
        );
        registry.register(
            WorkflowComponent::new(ComponentCode::NameTemplate, "Apply name template", ComponentKind::Transform)
                .param(ParamSpec::required("template", ParamType::Text)),
        );
        registry.register(
            WorkflowComponent::new(ComponentCode::AdjustPrice, "Adjust prices", ComponentKind::Transform)
                .param(ParamSpec::required("percent", ParamType::Decimal)),
        );
        registry.register(
            WorkflowComponent::new(ComponentCode::FilterByPrice, "Filter by price", ComponentKind::Filter)
                .param(ParamSpec::with_default("min", ParamValue::Decimal(0.0)))
                .param(ParamSpec::optional("max", ParamType::Decimal)),
        );
        registry.register(
            WorkflowComponent::new(ComponentCode::EmitToShop, "Publish to shop", ComponentKind::EmitEvent)
                .limit(1),
        );

        registry
    }

    pub fn register(&mut self, component: WorkflowComponent) {
        self.components.insert(component.code, component);
    }

    pub fn get(&self, code: ComponentCode) -> Option<&WorkflowComponent> {
        self.components.get(&code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkflowComponent> {
        self.components.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_covers_every_code() {
        let registry = ComponentRegistry::standard();
        for code in ComponentCode::ALL {
            assert!(registry.get(code).is_some(), "missing {code}");
        }
    }

    #[test]
    fn codes_round_trip_through_their_string_form() {
        for code in ComponentCode::ALL {
            assert_eq!(code.as_str().parse::<ComponentCode>().unwrap(), code);
        }
        assert!(matches!(
            "load_module".parse::<ComponentCode>(),
            Err(WorkflowError::UnknownComponent(_))
        ));
    }

    #[test]
    fn metadata_step_requires_image_sync() {
        let registry = ComponentRegistry::standard();
        let c = registry.get(ComponentCode::SetImageMetadata).unwrap();
        assert_eq!(c.prerequisite, Some(ComponentCode::SyncImages));
    }

    #[test]
    fn emit_is_limited_to_one_instance() {
        let registry = ComponentRegistry::standard();
        let c = registry.get(ComponentCode::EmitToShop).unwrap();
        assert_eq!(c.kind, ComponentKind::EmitEvent);
        assert_eq!(c.instance_limit, Some(1));
    }
}
