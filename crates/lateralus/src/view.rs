//! Views.
//!
//! Rendering is outside Lateralus; a view here is the node that a renderer
//! hangs off. It carries the options it was built with, an optional model,
//! subviews, and a mount flag for the application's UI root.
//!
//! A view class may declare an `after_render` hook. It is queued on the
//! application's deferred queue when the view is built and runs on the next
//! [`crate::Lateralus::run_deferred`], once the rest of the synchronous
//! construction has finished.

use std::fmt;
use std::sync::Arc;

use lateralus_core::{ConfigurationError, Result};
use serde_json::{Map, Value};

use crate::class::{Declarations, Declare};
use crate::node::Node;
use crate::registry::{NodeData, NodeDetail, NodeId, ViewState};

/// `initialize(options)` hook of a view.
pub type ViewInitializeFn = Arc<dyn Fn(&Node, &Map<String, Value>) -> Result<()> + Send + Sync>;

/// Deferred post-render hook of a view.
pub type AfterRenderFn = Arc<dyn Fn(&Node) -> Result<()> + Send + Sync>;

/// A view type.
#[derive(Clone)]
pub struct ViewClass {
    name: Option<String>,
    decls: Arc<Declarations>,
    default_options: Map<String, Value>,
    initialize: Option<ViewInitializeFn>,
    after_render: Option<AfterRenderFn>,
}

impl ViewClass {
    /// The plain view class.
    pub fn base() -> Self {
        Self::builder().build()
    }

    /// Start building a view class.
    pub fn builder() -> ViewClassBuilder {
        ViewClassBuilder {
            name: None,
            decls: Declarations::new(),
            default_options: Map::new(),
            initialize: None,
            after_render: None,
        }
    }

    /// Start building a subclass.
    pub fn extend(&self) -> ViewClassBuilder {
        ViewClassBuilder {
            name: self.name.clone(),
            decls: Declarations::inherit(self.decls.clone()),
            default_options: self.default_options.clone(),
            initialize: self.initialize.clone(),
            after_render: self.after_render.clone(),
        }
    }

    /// Explicit display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Options applied under the ones passed at construction.
    pub fn default_options(&self) -> &Map<String, Value> {
        &self.default_options
    }
}

impl fmt::Debug for ViewClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewClass")
            .field("name", &self.name)
            .field("default_options", &self.default_options)
            .field("after_render", &self.after_render.is_some())
            .finish()
    }
}

/// Builder for [`ViewClass`].
pub struct ViewClassBuilder {
    name: Option<String>,
    decls: Declarations,
    default_options: Map<String, Value>,
    initialize: Option<ViewInitializeFn>,
    after_render: Option<AfterRenderFn>,
}

impl ViewClassBuilder {
    /// Set an explicit display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a default option (`attachDefaultOptions`).
    pub fn default_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_options.insert(key.into(), value);
        self
    }

    /// Set the `initialize(options)` hook.
    pub fn initialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&Node, &Map<String, Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.initialize = Some(Arc::new(f));
        self
    }

    /// Set the deferred post-render hook.
    pub fn after_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&Node) -> Result<()> + Send + Sync + 'static,
    {
        self.after_render = Some(Arc::new(f));
        self
    }

    /// Build the class.
    pub fn build(self) -> ViewClass {
        ViewClass {
            name: self.name,
            decls: Arc::new(self.decls),
            default_options: self.default_options,
            initialize: self.initialize,
            after_render: self.after_render,
        }
    }
}

impl Declare for ViewClassBuilder {
    fn declarations_mut(&mut self) -> &mut Declarations {
        &mut self.decls
    }
}

/// Construction options of a view.
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    /// Model the view is bound to. Takes precedence over the component's
    /// declared model class.
    pub model: Option<Node>,
    /// Properties merged onto the view, over the class defaults.
    pub properties: Map<String, Value>,
}

impl ViewOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the view to an existing model.
    pub fn with_model(mut self, model: Node) -> Self {
        self.model = Some(model);
        self
    }

    /// Add a property.
    pub fn property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

impl Node {
    /// Build a view for `component`, owned by `self` (the component, or the
    /// parent view of a subview).
    pub(crate) fn build_view(
        &self,
        class: &ViewClass,
        options: ViewOptions,
        component: NodeId,
        parent_view: Option<NodeId>,
    ) -> Result<Node> {
        if let Some(model) = &options.model {
            if !self.same_tree(model) || model.kind()? != crate::NodeKind::Model {
                return Err(ConfigurationError::unsupported(
                    model.to_string(),
                    model.kind().map(|k| k.as_str()).unwrap_or("node"),
                    "bind to view",
                )
                .into());
            }
        }

        let name = match class.name() {
            Some(name) => name.to_string(),
            None => format!("{}-view", self.handle(component).name()?),
        };
        let mut properties = class.default_options.clone();
        properties.extend(options.properties);

        let mut data = NodeData::new(
            name,
            NodeDetail::View(ViewState {
                model: options.model.as_ref().map(|m| m.id),
                parent_view,
                subviews: Vec::new(),
                mounted: false,
            }),
            class.decls.clone(),
        );
        data.owner = Some(self.id);
        data.component = Some(component);
        data.properties = properties.clone();
        let id = {
            let mut registry = self.shared.registry.write();
            let id = registry.insert(data);
            if let Some(model) = &options.model {
                registry.bind_model(id, model.id)?;
            }
            id
        };
        let view = self.handle(id);

        let built = (|| {
            if let Some(initialize) = &class.initialize {
                initialize(&view, &properties)?;
            }
            view.delegate_lateralus_events()
        })();
        if let Err(err) = built {
            tracing::warn!(target: "lateralus::view", view = %view, error = %err, "view construction failed");
            view.discard();
            return Err(err);
        }

        if let Some(after_render) = class.after_render.clone() {
            let weak = view.downgrade();
            self.shared.deferred.post(move || match weak.upgrade() {
                Some(view) => after_render(&view),
                None => Ok(()),
            });
        }
        tracing::trace!(target: "lateralus::view", view = %view, "view built");
        Ok(view)
    }

    /// Build a subview of this view.
    pub fn add_subview(&self, class: &ViewClass, options: ViewOptions) -> Result<Node> {
        let component = self.read(|d| d.view_state("addSubview").map(|_| d.component))??;
        let Some(component) = component else {
            return Err(ConfigurationError::Unwired {
                node: self.to_string(),
            }
            .into());
        };
        let subview = self.build_view(class, options, component, Some(self.id))?;
        self.write(|d| {
            if let Ok(state) = d.view_state_mut("addSubview") {
                state.subviews.push(subview.id);
            }
        })?;
        Ok(subview)
    }

    /// Subviews of this view, in creation order.
    pub fn subviews(&self) -> Result<Vec<Node>> {
        let ids = self.read(|d| d.view_state("subviews").map(|s| s.subviews.clone()))??;
        Ok(ids.into_iter().map(|id| self.handle(id)).collect())
    }

    /// The parent of a subview.
    pub fn parent_view(&self) -> Result<Option<Node>> {
        let id = self.read(|d| d.view_state("parentView").map(|s| s.parent_view))??;
        Ok(id.map(|id| self.handle(id)))
    }

    /// Whether the view is attached to the application's UI root.
    pub fn is_mounted(&self) -> Result<bool> {
        self.read(|d| d.view_state("isMounted").map(|s| s.mounted))?
    }

    /// Detach the view from the application's UI root.
    pub fn remove(&self) -> Result<()> {
        self.read(|d| d.view_state("remove").map(|_| ()))??;
        let root = self.root_id();
        let mut registry = self.shared.registry.write();
        if let Ok(state) = registry.get_mut(self.id).and_then(|d| d.view_state_mut("remove")) {
            state.mounted = false;
        }
        if let Ok(app) = registry.get_mut(root).and_then(|d| d.app_mut("remove")) {
            app.mounted.retain(|id| *id != self.id);
        }
        Ok(())
    }

    /// Append a view to the application's UI root.
    pub(crate) fn mount(&self, view: &Node) -> Result<()> {
        let mut registry = self.shared.registry.write();
        registry.get_mut(view.id)?.view_state_mut("mount")?.mounted = true;
        let app = registry.get_mut(self.id)?.app_mut("mount")?;
        if !app.mounted.contains(&view.id) {
            app.mounted.push(view.id);
        }
        tracing::trace!(target: "lateralus::view", view = ?view.id, "view mounted");
        Ok(())
    }
}
