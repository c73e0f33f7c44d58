use crate::error::LookupError;
use crate::model::{AggregationMethod, ComputedValueType, TypeId};
use crate::rules::Registry;

/// Computed-value types and aggregation methods of the run, as generated
/// from the rule registry.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: Vec<ComputedValueType>,
    methods: Vec<AggregationMethod>,
}

impl TypeTable {
    pub fn from_registry(registry: &Registry) -> Self {
        Self {
            types: registry.computed_value_types(),
            methods: registry.aggregation_methods(),
        }
    }

    pub fn types(&self) -> &[ComputedValueType] {
        &self.types
    }

    pub fn methods(&self) -> &[AggregationMethod] {
        &self.methods
    }

    pub fn type_by_id(&self, id: TypeId) -> Result<&ComputedValueType, LookupError> {
        self.types
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| LookupError::ComputedValueType(id.to_string()))
    }

    pub fn method_by_name(&self, name: &str) -> Result<&AggregationMethod, LookupError> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| LookupError::AggregationMethod(name.to_string()))
    }
}
