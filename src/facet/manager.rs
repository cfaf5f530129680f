//! Transactional, keyed registry of installed facets.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{Result, SubsystemError};

use super::hook::{FacetKind, FacetRecord};

/// One step recorded while a transaction is open, sufficient to undo itself.
enum JournalEntry {
    Added { kind: FacetKind },
    Removed { kind: FacetKind, prior: FacetRecord },
}

/// `{ facets, journal, in-transaction }`. Facets are only ever
/// mutated through `add`/`remove`/`commit`/`rollback`; no external caller may
/// mutate the map directly during a transaction.
pub struct FacetManager {
    facets: HashMap<FacetKind, FacetRecord>,
    /// Install order, independent of `facets`' unordered iteration. Survives
    /// `commit` (unlike `journal`); `dispose_all` tears down its reverse.
    order: Vec<FacetKind>,
    order_snapshot: Option<Vec<FacetKind>>,
    journal: Vec<JournalEntry>,
    in_transaction: bool,
}

impl Default for FacetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FacetManager {
    pub fn new() -> Self {
        Self {
            facets: HashMap::new(),
            order: Vec::new(),
            order_snapshot: None,
            journal: Vec::new(),
            in_transaction: false,
        }
    }

    pub fn begin_transaction(&mut self) {
        self.in_transaction = true;
        self.journal.clear();
        self.order_snapshot = Some(self.order.clone());
    }

    pub fn has(&self, kind: &FacetKind) -> bool {
        self.facets.contains_key(kind)
    }

    pub fn find(&self, kind: &FacetKind) -> Option<&FacetRecord> {
        self.facets.get(kind)
    }

    pub fn get_all_kinds(&self) -> Vec<FacetKind> {
        self.facets.keys().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.facets.len()
    }

    /// Registers `facet` under `kind`. Fails with [`SubsystemError::NameConflict`]-
    /// adjacent semantics via `ContractViolation`-free duplicate rejection:
    /// a pre-existing kind is rejected unless `overwrite` is set, in which
    /// case the prior facet is disposed immediately. That disposal is a
    /// single, non-journaled step, not undone by a later `rollback`.
    pub async fn add(&mut self, facet: FacetRecord, overwrite: bool) -> Result<()> {
        let kind = facet.kind.clone();
        if let Some(prior) = self.facets.get(&kind) {
            if !overwrite {
                return Err(SubsystemError::InvalidPlan(format!(
                    "kind `{kind}` already installed and hook does not set overwrite"
                )));
            }
            dispose_record(prior).await;
        }

        let replaced = self.facets.insert(kind.clone(), facet);
        if !self.order.contains(&kind) {
            self.order.push(kind.clone());
        }
        if self.in_transaction {
            if let Some(prior) = replaced {
                self.journal.push(JournalEntry::Removed {
                    kind: kind.clone(),
                    prior,
                });
            }
            self.journal.push(JournalEntry::Added { kind });
        }
        Ok(())
    }

    pub async fn add_many(&mut self, facets: Vec<(FacetRecord, bool)>) -> Result<()> {
        for (facet, overwrite) in facets {
            self.add(facet, overwrite).await?;
        }
        Ok(())
    }

    /// Removes and returns the facet at `kind`, journaling the removal when
    /// inside a transaction so `rollback` can restore it.
    pub fn remove(&mut self, kind: &FacetKind) -> Option<FacetRecord> {
        let removed = self.facets.remove(kind);
        if removed.is_some() {
            self.order.retain(|k| k != kind);
        }
        if self.in_transaction {
            if let Some(prior) = removed.clone() {
                self.journal.push(JournalEntry::Removed {
                    kind: kind.clone(),
                    prior,
                });
            }
        }
        removed
    }

    /// Invokes every newly-added facet's `on_init` callbacks, in add order,
    /// then clears the journal. `add` only registers a facet; `commit` is
    /// what actually runs initialization.
    pub async fn commit(&mut self) -> Result<()> {
        let added_kinds: Vec<FacetKind> = self
            .journal
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Added { kind } => Some(kind.clone()),
                JournalEntry::Removed { .. } => None,
            })
            .collect();

        for kind in added_kinds {
            let callbacks = match self.facets.get(&kind) {
                Some(facet) => facet.on_init.clone(),
                None => continue,
            };
            for cb in callbacks {
                cb().await.map_err(|e| {
                    SubsystemError::InvalidPlan(format!("init failed for `{kind}`: {e}"))
                })?;
            }
            debug!(kind = %kind, "facet committed");
        }

        self.in_transaction = false;
        self.journal.clear();
        self.order_snapshot = None;
        Ok(())
    }

    /// Undoes every mutation recorded since `begin_transaction`, in reverse
    /// order. Newly-added facets have their dispose callbacks run (in
    /// reverse of declared order) before being removed; removed facets are
    /// restored. Callback errors are logged and never abort the unwind.
    /// Install order reverts to its pre-transaction snapshot.
    pub async fn rollback(&mut self) {
        while let Some(entry) = self.journal.pop() {
            match entry {
                JournalEntry::Added { kind } => {
                    if let Some(facet) = self.facets.remove(&kind) {
                        dispose_record(&facet).await;
                    }
                }
                JournalEntry::Removed { kind, prior } => {
                    self.facets.insert(kind, prior);
                }
            }
        }
        if let Some(snapshot) = self.order_snapshot.take() {
            self.order = snapshot;
        }
        self.in_transaction = false;
    }

    /// Tears down every installed facet in reverse install order, logging
    /// (never propagating) callback errors, and empties the registry.
    pub async fn dispose_all(&mut self) {
        let mut kinds = std::mem::take(&mut self.order);
        kinds.reverse();
        for kind in kinds {
            if let Some(facet) = self.facets.remove(&kind) {
                dispose_record(&facet).await;
            }
        }
    }
}

async fn dispose_record(facet: &FacetRecord) {
    for cb in facet.on_dispose.iter().rev() {
        if let Err(err) = cb().await {
            warn!(kind = %facet.kind, error = %err, "dispose callback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn facet_with_counters(kind: FacetKind, init_count: Arc<AtomicUsize>, dispose_log: Arc<parking_lot::Mutex<Vec<&'static str>>>, tag: &'static str) -> FacetRecord {
        let init_count2 = init_count.clone();
        let dispose_log2 = dispose_log.clone();
        FacetRecord::new(kind, Arc::new(()))
            .with_init(Arc::new(move || {
                let c = init_count2.clone();
                Box::pin(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }))
            .with_dispose(Arc::new(move || {
                let log = dispose_log2.clone();
                Box::pin(async move {
                    log.lock().push(tag);
                    Ok(())
                })
            }))
    }

    #[tokio::test]
    async fn commit_runs_init_in_add_order() {
        let mut mgr = FacetManager::new();
        let init_count = Arc::new(AtomicUsize::new(0));
        let dispose_log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        mgr.begin_transaction();
        mgr.add(facet_with_counters(FacetKind::Router, init_count.clone(), dispose_log.clone(), "router"), false)
            .await
            .unwrap();
        mgr.add(facet_with_counters(FacetKind::Queue, init_count.clone(), dispose_log.clone(), "queue"), false)
            .await
            .unwrap();
        assert_eq!(init_count.load(Ordering::SeqCst), 0);
        mgr.commit().await.unwrap();
        assert_eq!(init_count.load(Ordering::SeqCst), 2);
        assert_eq!(mgr.size(), 2);
    }

    #[tokio::test]
    async fn rollback_restores_pre_transaction_state() {
        let mut mgr = FacetManager::new();
        let init_count = Arc::new(AtomicUsize::new(0));
        let dispose_log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        mgr.add(facet_with_counters(FacetKind::Statistics, init_count.clone(), dispose_log.clone(), "stats"), false)
            .await
            .unwrap();
        let pre_size = mgr.size();

        mgr.begin_transaction();
        mgr.add(facet_with_counters(FacetKind::Router, init_count.clone(), dispose_log.clone(), "router"), false)
            .await
            .unwrap();
        mgr.add(facet_with_counters(FacetKind::Queue, init_count.clone(), dispose_log.clone(), "queue"), false)
            .await
            .unwrap();
        mgr.rollback().await;

        assert_eq!(mgr.size(), pre_size);
        assert!(mgr.has(&FacetKind::Statistics));
        assert!(!mgr.has(&FacetKind::Router));
        assert!(!mgr.has(&FacetKind::Queue));
        assert_eq!(dispose_log.lock().as_slice(), &["queue", "router"]);
    }

    #[tokio::test]
    async fn dispose_all_tears_down_in_reverse_install_order() {
        let mut mgr = FacetManager::new();
        let init_count = Arc::new(AtomicUsize::new(0));
        let dispose_log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        mgr.add(facet_with_counters(FacetKind::Statistics, init_count.clone(), dispose_log.clone(), "stats"), false)
            .await
            .unwrap();
        mgr.add(facet_with_counters(FacetKind::Router, init_count.clone(), dispose_log.clone(), "router"), false)
            .await
            .unwrap();
        mgr.add(facet_with_counters(FacetKind::Queue, init_count.clone(), dispose_log.clone(), "queue"), false)
            .await
            .unwrap();

        mgr.dispose_all().await;

        assert_eq!(mgr.size(), 0);
        assert_eq!(dispose_log.lock().as_slice(), &["queue", "router", "stats"]);
    }

    #[tokio::test]
    async fn duplicate_kind_without_overwrite_rejected() {
        let mut mgr = FacetManager::new();
        let init_count = Arc::new(AtomicUsize::new(0));
        let dispose_log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        mgr.add(facet_with_counters(FacetKind::Router, init_count.clone(), dispose_log.clone(), "a"), false)
            .await
            .unwrap();
        let err = mgr
            .add(facet_with_counters(FacetKind::Router, init_count, dispose_log, "b"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SubsystemError::InvalidPlan(_)));
    }
}
