//! Declarative capability contracts enforced at install.

use std::collections::HashSet;

use crate::error::{Result, SubsystemError};

use super::hook::FacetRecord;

/// A descriptor of the methods/properties a dynamically-installed facet must
/// expose, plus an optional custom validator. Well-known facets (Router,
/// Scheduler) are compile-time typed and never pass through this path; it
/// exists for the open `Custom(kind)` extension channel.
pub struct FacetContract {
    pub name: String,
    pub required_methods: HashSet<String>,
    pub required_properties: HashSet<String>,
    pub validate: Option<Box<dyn Fn(&FacetRecord) -> Result<()> + Send + Sync>>,
}

impl FacetContract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_methods: HashSet::new(),
            required_properties: HashSet::new(),
            validate: None,
        }
    }

    pub fn require_method(mut self, name: impl Into<String>) -> Self {
        self.required_methods.insert(name.into());
        self
    }

    pub fn require_property(mut self, name: impl Into<String>) -> Self {
        self.required_properties.insert(name.into());
        self
    }

    pub fn with_validate(
        mut self,
        validate: impl Fn(&FacetRecord) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Box::new(validate));
        self
    }

    /// Checks `facet` against this contract, using the methods/properties
    /// `facet` itself declares via `with_method`/`with_property`.
    ///
    /// Because facets in this crate are typed Rust values rather than duck
    /// -typed objects, "missing method/property" failures are raised against
    /// the manifest a `Custom` facet's builder attaches to its `FacetRecord`
    /// rather than runtime introspection; the static Router/Scheduler
    /// contracts below never fail this step in practice because their shape
    /// is enforced by the compiler, not by a manifest.
    pub fn enforce(&self, facet: &FacetRecord) -> Result<()> {
        let missing_methods: Vec<_> = self
            .required_methods
            .difference(&facet.provides_methods)
            .cloned()
            .collect();
        if !missing_methods.is_empty() {
            return Err(SubsystemError::ContractViolation {
                contract: self.name.clone(),
                reason: format!("missing required methods: {}", missing_methods.join(", ")),
            });
        }

        let missing_properties: Vec<_> = self
            .required_properties
            .difference(&facet.provides_properties)
            .cloned()
            .collect();
        if !missing_properties.is_empty() {
            return Err(SubsystemError::ContractViolation {
                contract: self.name.clone(),
                reason: format!(
                    "missing required properties: {}",
                    missing_properties.join(", ")
                ),
            });
        }

        if let Some(validate) = &self.validate {
            validate(facet).map_err(|e| SubsystemError::ContractViolation {
                contract: self.name.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}

/// The Router contract: requires `register_route`/`unregister_route`/`match`
/// methods and a non-null `_route_registry` property.
pub fn router_contract() -> FacetContract {
    FacetContract::new("Router")
        .require_method("register_route")
        .require_method("unregister_route")
        .require_method("match_path")
        .require_property("_route_registry")
}

/// The Scheduler contract: requires `process`/`pause_processing`/
/// `resume_processing` methods and a non-null `_scheduler` property.
pub fn scheduler_contract() -> FacetContract {
    FacetContract::new("Scheduler")
        .require_method("process")
        .require_method("pause_processing")
        .require_method("resume_processing")
        .require_property("_scheduler")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::hook::FacetKind;
    use std::sync::Arc;

    #[test]
    fn enforce_fails_on_missing_method() {
        let contract = FacetContract::new("Test").require_method("foo");
        let facet = FacetRecord::new(FacetKind::Custom("x".into()), Arc::new(()));
        let err = contract.enforce(&facet).unwrap_err();
        assert!(matches!(err, SubsystemError::ContractViolation { .. }));
    }

    #[test]
    fn enforce_passes_when_methods_and_properties_present() {
        let contract = FacetContract::new("Test")
            .require_method("foo")
            .require_property("bar");
        let facet = FacetRecord::new(FacetKind::Custom("x".into()), Arc::new(()))
            .with_method("foo")
            .with_property("bar");
        assert!(contract.enforce(&facet).is_ok());
    }
}
