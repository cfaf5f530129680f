//! `BaseSubsystem`: composes the builder and facet manager into a named,
//! hierarchical lifecycle.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument};

use crate::clock::{Clock, IdGen, RandomIdGen, SystemClock};
use crate::context::{BuildContext, ExternalMessageSystem};
use crate::error::{Result, SubsystemError};
use crate::facet::{FacetKind, FacetManager, FacetRecord, HookDescriptor};
use crate::future::BoxFuture;
use crate::message::Message;
use crate::processing::{AcceptOutcome, DispatchOptions, MessageProcessor, ProcessStatus, Scheduler};
use crate::resolver::{DependencyGraphCache, SubsystemBuilder};

/// Constructor options for [`BaseSubsystem::new`].
pub struct SubsystemOptions {
    pub ms: Option<ExternalMessageSystem>,
    pub config: Value,
    pub debug: bool,
    pub require_ms: bool,
    pub clock: Option<Arc<dyn Clock>>,
    pub id_gen: Option<Arc<dyn IdGen>>,
    pub graph_cache: Option<Arc<DependencyGraphCache>>,
}

impl Default for SubsystemOptions {
    fn default() -> Self {
        Self {
            ms: None,
            config: Value::Null,
            debug: false,
            require_ms: false,
            clock: None,
            id_gen: None,
            graph_cache: None,
        }
    }
}

type DisposeCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct Inner {
    ctx: BuildContext,
    hooks: Vec<HookDescriptor>,
    manager: FacetManager,
    builder: SubsystemBuilder,
    is_built: bool,
    explicit_graph_cache: bool,
    dispose_callbacks: Vec<DisposeCallback>,
}

/// Named, hierarchical message-processing unit. Owns a [`FacetManager`] and
/// drives it through [`SubsystemBuilder`]; `accept`/`process`/`pause`/
/// `resume` delegate to whichever facets `use` installed.
pub struct BaseSubsystem {
    name: String,
    inner: AsyncMutex<Inner>,
    parent: SyncMutex<Option<Weak<BaseSubsystem>>>,
    children: SyncMutex<Vec<Arc<BaseSubsystem>>>,
}

impl std::fmt::Debug for BaseSubsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseSubsystem").field("name", &self.name).finish()
    }
}

impl BaseSubsystem {
    pub fn new(name: impl Into<String>, options: SubsystemOptions) -> Result<Arc<Self>> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SubsystemError::invalid_argument("name must be a non-empty string"));
        }
        if options.require_ms && options.ms.is_none() {
            return Err(SubsystemError::invalid_argument("options.ms is required"));
        }

        let explicit_graph_cache = options.graph_cache.is_some();
        let ctx = BuildContext::new(
            options.ms,
            options.config,
            options.debug,
            options.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            options.id_gen.unwrap_or_else(|| Arc::new(RandomIdGen)),
            options.graph_cache.unwrap_or_default(),
        );

        Ok(Arc::new(Self {
            name,
            inner: AsyncMutex::new(Inner {
                ctx,
                hooks: Vec::new(),
                manager: FacetManager::new(),
                builder: SubsystemBuilder::new(),
                is_built: false,
                explicit_graph_cache,
                dispose_callbacks: Vec::new(),
            }),
            parent: SyncMutex::new(None),
            children: SyncMutex::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"<name>://"`.
    pub fn get_name_string(&self) -> String {
        format!("{}://", self.name)
    }

    pub async fn is_built(&self) -> bool {
        self.inner.lock().await.is_built
    }

    /// Appends `hook` if no existing hook shares its `(kind, source)`.
    /// Rejects once the subsystem is built.
    pub async fn use_hook(&self, hook: HookDescriptor) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.is_built {
            return Err(SubsystemError::AlreadyBuilt(self.name.clone()));
        }
        let already_present = inner
            .hooks
            .iter()
            .any(|h| h.kind == hook.kind && h.source == hook.source);
        if !already_present {
            inner.hooks.push(hook);
        }
        Ok(())
    }

    pub async fn on_dispose(&self, cb: DisposeCallback) {
        self.inner.lock().await.dispose_callbacks.push(cb);
    }

    /// Idempotent: a second call while already built is a no-op success.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn build(self: &Arc<Self>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.is_built {
            return Ok(());
        }

        let ctx = inner.ctx.clone();
        let hooks = inner.hooks.clone();
        let plan = inner.builder.plan(&ctx, &hooks)?;
        let Inner { builder, manager, .. } = &mut *inner;
        builder.build(manager, &plan).await?;
        inner.is_built = true;
        info!(facets = plan.ordered_kinds.len(), "subsystem built");
        Ok(())
    }

    /// Disposes children (reverse insertion order), then every installed
    /// facet, then this subsystem's own dispose callbacks (reverse order).
    /// Always completes; callback errors are logged, never propagated.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn dispose(self: &Arc<Self>) {
        let mut children = { self.children.lock().clone() };
        children.reverse();
        for child in children {
            Box::pin(child.dispose()).await;
        }

        let mut inner = self.inner.lock().await;
        inner.manager.dispose_all().await;
        inner.builder.invalidate();
        for cb in inner.dispose_callbacks.iter().rev() {
            cb().await;
        }
        inner.is_built = false;
        info!("subsystem disposed");
    }

    pub async fn accept(&self, msg: Message, opts: DispatchOptions) -> Result<AcceptOutcome> {
        let processor = self.facet::<MessageProcessor>(FacetKind::MessageProcessor).await;
        match processor {
            Some(processor) => processor.accept(msg, opts).await,
            None => Err(SubsystemError::CoreMissing(FacetKind::MessageProcessor)),
        }
    }

    /// `None` when no Scheduler facet is installed (e.g. synchronous-only
    /// subsystems have nothing to time-slice).
    pub async fn process(&self, budget: Option<Duration>) -> Option<ProcessStatus> {
        let scheduler = self.facet::<Scheduler>(FacetKind::Scheduler).await?;
        Some(scheduler.process(budget).await)
    }

    /// Returns `true` if a Scheduler facet was present to act on.
    pub async fn pause(&self) -> bool {
        match self.facet::<Scheduler>(FacetKind::Scheduler).await {
            Some(s) => {
                s.pause_processing();
                true
            }
            None => false,
        }
    }

    pub async fn resume(&self) -> bool {
        match self.facet::<Scheduler>(FacetKind::Scheduler).await {
            Some(s) => {
                s.resume_processing();
                true
            }
            None => false,
        }
    }

    pub async fn facet<T: Send + Sync + 'static>(&self, kind: FacetKind) -> Option<Arc<T>> {
        let inner = self.inner.lock().await;
        downcast_facet(inner.manager.find(&kind))
    }

    pub fn is_root(&self) -> bool {
        self.parent.lock().is_none()
    }

    pub fn get_parent(&self) -> Option<Arc<BaseSubsystem>> {
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }

    pub fn get_root(self: &Arc<Self>) -> Arc<BaseSubsystem> {
        let mut current = self.clone();
        while let Some(parent) = current.get_parent() {
            current = parent;
        }
        current
    }

    /// Registers `parent` as this subsystem's parent and itself as one of
    /// `parent`'s children. If this subsystem was not given an explicit
    /// graph cache, it inherits the parent's current one.
    pub async fn set_parent(self: &Arc<Self>, parent: &Arc<BaseSubsystem>) {
        *self.parent.lock() = Some(Arc::downgrade(parent));
        parent.children.lock().push(self.clone());

        let mut inner = self.inner.lock().await;
        if !inner.explicit_graph_cache {
            let parent_cache = parent.inner.lock().await.ctx.graph_cache.clone();
            inner.ctx.graph_cache = parent_cache;
        }
    }
}

fn downcast_facet<T: Send + Sync + 'static>(record: Option<&FacetRecord>) -> Option<Arc<T>> {
    record.and_then(|r| r.api.clone().downcast::<T>().ok())
}
