//! `SubsystemBuilder`: resolves, caches, instantiates, and installs facets
//! transactionally.

use std::collections::HashMap;

use tracing::{error, info, instrument};

use super::cache::DependencyGraphCache;

use crate::context::BuildContext;
use crate::error::{Result, SubsystemError};
use crate::facet::{FacetKind, FacetManager, FacetRecord, HookDescriptor, PartialFacets};

use super::dependency::{fingerprint, DependencyResolver};

/// `{ resolvedCtx, orderedKinds, facetsByKind, fingerprint }`.
#[derive(Clone, Debug)]
pub struct Plan {
    pub resolved_ctx: BuildContext,
    pub ordered_kinds: Vec<FacetKind>,
    pub facets_by_kind: HashMap<FacetKind, FacetRecord>,
    pub overwrite_by_kind: HashMap<FacetKind, bool>,
    pub fingerprint: u64,
}

impl Plan {
    fn is_coherent(&self) -> bool {
        self.ordered_kinds.len() == self.facets_by_kind.len()
            && self
                .ordered_kinds
                .iter()
                .all(|k| self.facets_by_kind.contains_key(k))
    }
}

/// Plans a build from a hook set, then installs the resulting facets into a
/// [`FacetManager`] under a single transaction.
#[derive(Default)]
pub struct SubsystemBuilder {
    last_plan: Option<Plan>,
}

impl SubsystemBuilder {
    pub fn new() -> Self {
        Self { last_plan: None }
    }

    pub fn get_plan(&self) -> Option<&Plan> {
        self.last_plan.as_ref()
    }

    pub fn invalidate(&mut self) {
        self.last_plan = None;
    }

    /// Computes the fingerprint, consults `ctx.graph_cache` for a resolved
    /// order, and on a miss runs [`DependencyResolver`] and caches the
    /// result. Facets are always freshly instantiated from `hooks`, never
    /// taken from the cache. Each freshly-built facet is checked against its
    /// hook's `contract`, if any, immediately after construction and before
    /// any facet's `on_init` runs (which happens later, at `build`/commit
    /// time) — a `ContractViolation` here aborts the whole plan.
    #[instrument(skip(self, ctx, hooks))]
    pub fn plan(&mut self, ctx: &BuildContext, hooks: &[HookDescriptor]) -> Result<Plan> {
        let fp = fingerprint(hooks);

        let ordered_kinds = match ctx.graph_cache.get(fp) {
            Some(cached) => {
                info!(fingerprint = fp, "dependency graph cache hit");
                cached
            }
            None => {
                let resolved = DependencyResolver::resolve(hooks)?;
                ctx.graph_cache.put(fp, resolved.clone());
                resolved
            }
        };

        let hooks_by_kind: HashMap<FacetKind, &HookDescriptor> =
            hooks.iter().map(|h| (h.kind.clone(), h)).collect();

        let mut facets_by_kind: HashMap<FacetKind, FacetRecord> = HashMap::new();
        let mut overwrite_by_kind = HashMap::new();
        for kind in &ordered_kinds {
            let hook = hooks_by_kind
                .get(kind)
                .ok_or_else(|| SubsystemError::InvalidPlan(format!("no hook for kind `{kind}`")))?;
            let partial = PartialFacets::new(&facets_by_kind);
            let facet = (hook.build)(ctx, &partial)?;
            if let Some(contract) = &hook.contract {
                contract.enforce(&facet)?;
            }
            overwrite_by_kind.insert(kind.clone(), hook.overwrite);
            facets_by_kind.insert(kind.clone(), facet);
        }

        let plan = Plan {
            resolved_ctx: ctx.clone(),
            ordered_kinds,
            facets_by_kind,
            overwrite_by_kind,
            fingerprint: fp,
        };
        self.last_plan = Some(plan.clone());
        Ok(plan)
    }

    /// Installs every facet in `plan.ordered_kinds` order inside one
    /// [`FacetManager`] transaction. On any failure, rolls back and
    /// re-raises, including the offending kind in the error.
    #[instrument(skip(self, manager, plan))]
    pub async fn build(&mut self, manager: &mut FacetManager, plan: &Plan) -> Result<()> {
        if !plan.is_coherent() {
            return Err(SubsystemError::InvalidPlan(
                "ordered_kinds incoherent with facets_by_kind".to_string(),
            ));
        }

        manager.begin_transaction();
        for kind in &plan.ordered_kinds {
            let facet = plan
                .facets_by_kind
                .get(kind)
                .cloned()
                .expect("coherence checked above");
            let overwrite = *plan.overwrite_by_kind.get(kind).unwrap_or(&false);
            if let Err(err) = manager.add(facet, overwrite).await {
                error!(kind = %kind, error = %err, "facet add failed, rolling back");
                manager.rollback().await;
                return Err(err);
            }
        }

        if let Err(err) = manager.commit().await {
            error!(error = %err, "commit failed, rolling back");
            manager.rollback().await;
            return Err(err);
        }

        info!(installed = plan.ordered_kinds.len(), "build committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{RandomIdGen, SystemClock};
    use serde_json::Value;
    use std::sync::Arc;

    fn test_ctx() -> BuildContext {
        BuildContext::new(
            None,
            Value::Null,
            false,
            Arc::new(SystemClock),
            Arc::new(RandomIdGen),
            Arc::new(DependencyGraphCache::default()),
        )
    }

    fn hook(kind: FacetKind) -> HookDescriptor {
        HookDescriptor {
            kind: kind.clone(),
            required: vec![],
            overwrite: false,
            attach: false,
            source: "test".to_string(),
            build: Arc::new(move |_ctx, _partial| Ok(FacetRecord::new(kind.clone(), Arc::new(())))),
            contract: None,
        }
    }

    #[test]
    fn plan_instantiates_facets_in_resolved_order() {
        let ctx = test_ctx();
        let mut builder = SubsystemBuilder::new();
        let hooks = vec![hook(FacetKind::Router), hook(FacetKind::Queue)];
        let plan = builder.plan(&ctx, &hooks).unwrap();
        assert_eq!(plan.ordered_kinds, vec![FacetKind::Router, FacetKind::Queue]);
        assert_eq!(plan.facets_by_kind.len(), 2);
    }

    #[test]
    fn cache_returns_same_order_on_second_plan() {
        let ctx = test_ctx();
        let mut builder = SubsystemBuilder::new();
        let hooks = vec![hook(FacetKind::Router), hook(FacetKind::Queue)];
        let plan1 = builder.plan(&ctx, &hooks).unwrap();
        let plan2 = builder.plan(&ctx, &hooks).unwrap();
        assert_eq!(plan1.ordered_kinds, plan2.ordered_kinds);
        assert_eq!(ctx.graph_cache.len(), 1);
    }

    #[tokio::test]
    async fn build_installs_every_planned_facet() {
        let ctx = test_ctx();
        let mut builder = SubsystemBuilder::new();
        let hooks = vec![hook(FacetKind::Router), hook(FacetKind::Queue)];
        let plan = builder.plan(&ctx, &hooks).unwrap();
        let mut manager = FacetManager::new();
        builder.build(&mut manager, &plan).await.unwrap();
        assert_eq!(manager.size(), 2);
    }

    #[tokio::test]
    async fn build_rolls_back_on_init_failure() {
        let ctx = test_ctx();
        let mut builder = SubsystemBuilder::new();
        let ok_hook = hook(FacetKind::Router);
        let failing = HookDescriptor {
            kind: FacetKind::Queue,
            required: vec![],
            overwrite: false,
            attach: false,
            source: "test".to_string(),
            build: Arc::new(|_ctx, _partial| {
                Ok(FacetRecord::new(FacetKind::Queue, Arc::new(())).with_init(Arc::new(|| {
                    Box::pin(async { Err(SubsystemError::invalid_argument("boom")) })
                })))
            }),
            contract: None,
        };
        let plan = builder.plan(&ctx, &[ok_hook, failing]).unwrap();
        let mut manager = FacetManager::new();
        let err = builder.build(&mut manager, &plan).await.unwrap_err();
        assert!(err.to_string().contains("Queue") || err.to_string().contains("queue"));
        assert_eq!(manager.size(), 0);
    }

    #[test]
    fn plan_rejects_custom_facet_missing_contract_method_before_init_runs() {
        use crate::facet::FacetContract;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let ctx = test_ctx();
        let mut builder = SubsystemBuilder::new();
        let init_ran = Arc::new(AtomicUsize::new(0));
        let init_ran2 = init_ran.clone();
        let bad_hook = HookDescriptor {
            kind: FacetKind::Custom("widget".to_string()),
            required: vec![],
            overwrite: false,
            attach: false,
            source: "test".to_string(),
            build: Arc::new(move |_ctx, _partial| {
                let init_ran = init_ran2.clone();
                Ok(
                    FacetRecord::new(FacetKind::Custom("widget".to_string()), Arc::new(()))
                        .with_property("_widget")
                        .with_init(Arc::new(move || {
                            let init_ran = init_ran.clone();
                            Box::pin(async move {
                                init_ran.fetch_add(1, Ordering::SeqCst);
                                Ok(())
                            })
                        })),
                )
            }),
            contract: Some(Arc::new(
                FacetContract::new("Widget")
                    .require_method("spin")
                    .require_property("_widget"),
            )),
        };

        let err = builder.plan(&ctx, &[bad_hook]).unwrap_err();
        assert!(matches!(err, SubsystemError::ContractViolation { .. }));
        assert_eq!(init_ran.load(Ordering::SeqCst), 0);
    }
}
