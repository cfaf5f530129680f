//! Topological ordering of hook descriptors with overwrite and cycle
//! detection.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use crate::error::{Result, SubsystemError};
use crate::facet::{FacetKind, HookDescriptor};

/// Stable hash over (sorted kinds, each kind's required set, overwrite
/// flags). Deliberately excludes context/subsystem identity, so identical
/// hook shapes from different subsystems share a cache entry.
pub fn fingerprint(hooks: &[HookDescriptor]) -> u64 {
    let mut keyed: Vec<(String, Vec<String>, bool)> = hooks
        .iter()
        .map(|h| {
            let mut required: Vec<String> = h.required.iter().map(|k| k.to_string()).collect();
            required.sort();
            (h.kind.to_string(), required, h.overwrite)
        })
        .collect();
    keyed.sort();

    let mut hasher = DefaultHasher::new();
    keyed.hash(&mut hasher);
    hasher.finish()
}

/// Stateless resolver: given a set of hooks, computes a total order such
/// that every hook's dependencies appear earlier.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Winning declaration per kind, honoring `overwrite`: later-registered
    /// hooks with `overwrite: true` replace an earlier declaration of the
    /// same kind; any other duplicate is ambiguous.
    fn winning_hooks(hooks: &[HookDescriptor]) -> Result<Vec<&HookDescriptor>> {
        let mut by_kind: HashMap<FacetKind, usize> = HashMap::new();
        let mut winners: Vec<&HookDescriptor> = Vec::new();

        for hook in hooks {
            if hook.required.contains(&hook.kind) {
                return Err(SubsystemError::MissingDependency {
                    from: hook.kind.clone(),
                    missing: hook.kind.clone(),
                });
            }
            let mut required_set = HashSet::new();
            for req in &hook.required {
                if !required_set.insert(req.clone()) {
                    return Err(SubsystemError::InvalidPlan(format!(
                        "hook `{}` declares duplicate required kind `{req}`",
                        hook.kind
                    )));
                }
            }

            if let Some(&idx) = by_kind.get(&hook.kind) {
                if hook.overwrite {
                    winners[idx] = hook;
                } else {
                    return Err(SubsystemError::AmbiguousHook(hook.kind.clone()));
                }
            } else {
                by_kind.insert(hook.kind.clone(), winners.len());
                winners.push(hook);
            }
        }

        Ok(winners)
    }

    /// Computes the install order. Ties among ready nodes are broken by
    /// original hook registration order, so the result is deterministic for
    /// a given input sequence.
    pub fn resolve(hooks: &[HookDescriptor]) -> Result<Vec<FacetKind>> {
        let winners = Self::winning_hooks(hooks)?;
        let known: HashSet<FacetKind> = winners.iter().map(|h| h.kind.clone()).collect();

        for hook in &winners {
            for req in &hook.required {
                if !known.contains(req) {
                    return Err(SubsystemError::MissingDependency {
                        from: hook.kind.clone(),
                        missing: req.clone(),
                    });
                }
            }
        }

        let registration_order: HashMap<FacetKind, usize> = winners
            .iter()
            .enumerate()
            .map(|(i, h)| (h.kind.clone(), i))
            .collect();

        let mut in_degree: HashMap<FacetKind, usize> = HashMap::new();
        let mut dependents: HashMap<FacetKind, Vec<FacetKind>> = HashMap::new();
        for hook in &winners {
            let degree = hook.required.len();
            in_degree.insert(hook.kind.clone(), degree);
            for req in &hook.required {
                dependents.entry(req.clone()).or_default().push(hook.kind.clone());
            }
        }

        let mut ready: VecDeque<FacetKind> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(k, _)| k.clone())
            .collect();
        ready.make_contiguous().sort_by_key(|k| registration_order[k]);

        let mut ordered = Vec::with_capacity(winners.len());
        while let Some(kind) = ready.pop_front() {
            ordered.push(kind.clone());
            if let Some(deps) = dependents.get(&kind) {
                let mut newly_ready = Vec::new();
                for dep in deps {
                    let degree = in_degree.get_mut(dep).expect("dependent must be tracked");
                    *degree -= 1;
                    if *degree == 0 {
                        newly_ready.push(dep.clone());
                    }
                }
                newly_ready.sort_by_key(|k| registration_order[k]);
                let mut merged: Vec<FacetKind> = ready.drain(..).collect();
                merged.extend(newly_ready);
                merged.sort_by_key(|k| registration_order[k]);
                ready = merged.into();
            }
        }

        if ordered.len() != winners.len() {
            let remaining: Vec<FacetKind> = winners
                .iter()
                .map(|h| h.kind.clone())
                .filter(|k| !ordered.contains(k))
                .collect();
            return Err(SubsystemError::UnresolvableDependencies(remaining));
        }

        Ok(ordered)
    }
}
