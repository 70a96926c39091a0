//! The application root.
//!
//! A [`Lateralus`] owns one node tree. It is the only node whose display name
//! is `"root"`, it carries its own model (whose attribute changes are relayed
//! through [`Node::emit`] as `change:<attribute>`), the mount list of the UI
//! root, and the deferred queue that view post-render hooks are scheduled on.
//!
//! # Example
//!
//! ```
//! use lateralus::prelude::*;
//! use serde_json::json;
//!
//! let app = Lateralus::builder()
//!     .provide("answer", Handler::provider(|_, _| Ok(Some(json!(42)))))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(app.to_string(), "root");
//! assert_eq!(app.collect("answer", vec![]).unwrap(), vec![json!(42)]);
//! app.spiral_out().unwrap();
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use lateralus_core::{
    logging::span_names, DeferredQueue, Emitter, EventHub, ListenerId, PerfSpan, Result,
    SharedDeferredQueue, TaskId, PROVIDE_PREFIX,
};
use serde_json::Map;

use crate::class::{Declarations, Declare};
use crate::debug::ComponentTreeDebug;
use crate::model::{ModelClass, ModelPlacement};
use crate::node::{Node, Shared};
use crate::registry::{AppState, NodeData, NodeDetail, ROOT_NAME};

/// `initialize` hook of an application.
pub type AppInitializeFn = Arc<dyn Fn(&Lateralus) -> Result<()> + Send + Sync>;

/// Configuration of a [`Lateralus`] application.
#[derive(Clone)]
pub struct LateralusConfig {
    /// Class of the application's own model.
    pub model: ModelClass,
    /// Event maps and methods of the application node.
    pub declarations: Declarations,
    /// Runs once the application is fully constructed.
    pub initialize: Option<AppInitializeFn>,
    /// Tasks run per [`Lateralus::run_deferred_batch`] call.
    pub deferred_batch_size: usize,
}

impl Default for LateralusConfig {
    fn default() -> Self {
        Self {
            model: ModelClass::base(),
            declarations: Declarations::new(),
            initialize: None,
            deferred_batch_size: DeferredQueue::DEFAULT_BATCH_SIZE,
        }
    }
}

impl fmt::Debug for LateralusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LateralusConfig")
            .field("model", &self.model)
            .field("declarations", &self.declarations)
            .field("initialize", &self.initialize.is_some())
            .field("deferred_batch_size", &self.deferred_batch_size)
            .finish()
    }
}

/// Builder for [`Lateralus`].
#[derive(Default)]
pub struct LateralusBuilder {
    config: LateralusConfig,
}

impl LateralusBuilder {
    /// Set the class of the application's model.
    pub fn model(mut self, model: ModelClass) -> Self {
        self.config.model = model;
        self
    }

    /// Set the `initialize` hook.
    pub fn initialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&Lateralus) -> Result<()> + Send + Sync + 'static,
    {
        self.config.initialize = Some(Arc::new(f));
        self
    }

    /// Set the deferred batch size. Clamped to at least one.
    pub fn deferred_batch_size(mut self, size: usize) -> Self {
        self.config.deferred_batch_size = size.max(1);
        self
    }

    /// Construct the application.
    pub fn build(self) -> Result<Lateralus> {
        Lateralus::with_config(self.config)
    }
}

impl Declare for LateralusBuilder {
    fn declarations_mut(&mut self) -> &mut Declarations {
        &mut self.config.declarations
    }
}

/// The root of a component tree.
///
/// Dereferences to its [`Node`], so every node operation (`add_component`,
/// `emit`, `collect`, `dispose`, ...) is available directly.
#[derive(Clone)]
pub struct Lateralus {
    node: Node,
}

impl Lateralus {
    /// Construct an application with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(LateralusConfig::default())
    }

    /// Start configuring an application.
    pub fn builder() -> LateralusBuilder {
        LateralusBuilder::default()
    }

    /// Construct an application from `config`.
    #[tracing::instrument(skip_all, target = "lateralus::tree", level = "debug")]
    pub fn with_config(config: LateralusConfig) -> Result<Self> {
        let deferred = SharedDeferredQueue::with_batch_size(config.deferred_batch_size);
        let root = NodeData::new(
            ROOT_NAME,
            NodeDetail::Application(AppState::default()),
            Arc::new(config.declarations),
        );
        let shared = Arc::new(Shared::new(root, deferred));
        let id = shared.registry.read().root();
        let app = Self {
            node: Node::new(shared, id),
        };

        if let Err(err) = app.construct(&config.model, config.initialize.as_ref()) {
            tracing::warn!(target: "lateralus::tree", error = %err, "application construction failed");
            app.node.discard();
            return Err(err);
        }
        tracing::debug!(target: "lateralus::tree", "application created");
        Ok(app)
    }

    fn construct(&self, model: &ModelClass, initialize: Option<&AppInitializeFn>) -> Result<()> {
        let model = self.node.build_model(
            model,
            Map::new(),
            &Map::new(),
            ModelPlacement {
                owner: self.node.id,
                component: None,
                relay_changes: true,
            },
        )?;
        {
            let mut registry = self.node.shared.registry.write();
            registry.get_mut(self.node.id)?.app_mut("model")?.model = Some(model.id);
            registry.bind_model(self.node.id, model.id)?;
        }
        self.node.delegate_lateralus_events()?;
        if let Some(initialize) = initialize {
            initialize(self)?;
        }
        Ok(())
    }

    /// The application node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Let `receiver`'s `collect(provider)` requests reach this application's
    /// providers.
    pub fn share_with(&self, receiver: &Lateralus, provider: &str) -> Result<ListenerId> {
        tracing::debug!(target: "lateralus::events", provider, "sharing provider");
        self.node
            .amplify(&receiver.node, &format!("{PROVIDE_PREFIX}{provider}"))
    }

    /// Dispose the application and its whole tree.
    pub fn spiral_out(&self) -> Result<()> {
        self.node.dispose()
    }

    /// Schedule a task to run on the next [`Lateralus::run_deferred`].
    pub fn defer<F>(&self, task: F) -> TaskId
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.node.shared.deferred.post(task)
    }

    /// Cancel a scheduled task that has not run yet.
    pub fn cancel_deferred(&self, id: TaskId) -> bool {
        self.node.shared.deferred.cancel(id)
    }

    /// Number of scheduled tasks.
    pub fn pending_deferred(&self) -> usize {
        self.node.shared.deferred.pending_count()
    }

    /// Run every scheduled task, including tasks scheduled while running.
    ///
    /// Stops at the first failing task and returns its error.
    pub fn run_deferred(&self) -> Result<usize> {
        let _perf = PerfSpan::new(span_names::DEFERRED);
        self.node.shared.deferred.process_all()
    }

    /// Run at most one batch of scheduled tasks.
    pub fn run_deferred_batch(&self) -> Result<usize> {
        let _perf = PerfSpan::new(span_names::DEFERRED);
        self.node.shared.deferred.process_batch()
    }

    /// Views attached to the UI root, in mount order.
    pub fn mounted_views(&self) -> Result<Vec<Node>> {
        let ids = self
            .node
            .read(|d| d.app("mountedViews").map(|app| app.mounted.clone()))??;
        Ok(ids.into_iter().map(|id| self.node.handle(id)).collect())
    }

    /// Number of live nodes in the tree, the application included.
    pub fn node_count(&self) -> usize {
        self.node.shared.registry.read().len()
    }

    /// A printable dump of the component tree.
    pub fn tree_debug(&self) -> ComponentTreeDebug {
        ComponentTreeDebug::new(self.node.clone())
    }
}

impl Deref for Lateralus {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl Emitter for Lateralus {
    fn event_hub(&self) -> Result<EventHub> {
        self.node.hub()
    }
}

impl fmt::Display for Lateralus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.node, f)
    }
}

impl fmt::Debug for Lateralus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lateralus")
            .field("node", &self.node)
            .field("nodes", &self.node_count())
            .field("pending_deferred", &self.pending_deferred())
            .finish()
    }
}

static_assertions::assert_impl_all!(Lateralus: Send, Sync, Clone);
