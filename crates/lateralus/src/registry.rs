//! Arena storage for the nodes of one application tree.
//!
//! Every node (application, component, view, model, collection) lives in a
//! [`NodeRegistry`] slot keyed by [`NodeId`]. Handles ([`crate::Node`]) carry
//! only the ID, so a disposed node leaves nothing behind but stale IDs that
//! resolve to [`LateralusError::Disposed`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lateralus_core::{ConfigurationError, EventHub, LateralusError, Result, Subscriptions};
use serde_json::{Map, Value};
use slotmap::{new_key_type, SlotMap};

use crate::class::{Declarations, Method, ResolvedMaps};
use crate::collection::CollectionClass;
use crate::component::ComponentClass;

new_key_type! {
    /// A unique identifier for a node in an application tree.
    ///
    /// IDs stay valid while the node is alive and resolve to
    /// [`LateralusError::Disposed`] afterwards.
    pub struct NodeId;
}

/// Display name of the application node.
pub const ROOT_NAME: &str = "root";

/// The kind discriminant of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The root of the tree.
    Application,
    /// A component.
    Component,
    /// A component's view or a subview.
    View,
    /// A model.
    Model,
    /// A collection of models.
    Collection,
}

impl NodeKind {
    /// Lower-case name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Component => "component",
            Self::View => "view",
            Self::Model => "model",
            Self::Collection => "collection",
        }
    }

    /// Whether nodes of this kind own subcomponents.
    pub fn owns_components(self) -> bool {
        matches!(self, Self::Application | Self::Component)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subcomponents of an owner, keyed by instance name.
#[derive(Debug, Default)]
pub(crate) struct TreeState {
    /// Insertion-ordered `(instance name, id)` pairs.
    pub components: Vec<(String, NodeId)>,
    /// Last used suffix per component type; absent until the first insert.
    pub counters: Option<HashMap<String, usize>>,
}

impl TreeState {
    /// Register a component under the next instance name for `type_name`.
    pub fn register(&mut self, type_name: &str, id: NodeId) -> String {
        let counters = self.counters.get_or_insert_with(HashMap::new);
        let counter = match counters.get_mut(type_name) {
            Some(counter) => {
                *counter += 1;
                *counter
            }
            None => {
                counters.insert(type_name.to_string(), 0);
                0
            }
        };
        let instance_name = format!("{type_name}{counter}");
        self.components.push((instance_name.clone(), id));
        instance_name
    }

    pub fn unregister(&mut self, id: NodeId) -> bool {
        let before = self.components.len();
        self.components.retain(|(_, child)| *child != id);
        self.components.len() != before
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.components.iter().any(|(_, child)| *child == id)
    }

    pub fn get(&self, instance_name: &str) -> Option<NodeId> {
        self.components
            .iter()
            .find(|(name, _)| name == instance_name)
            .map(|(_, id)| *id)
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.components.iter().map(|(_, id)| *id).collect()
    }
}

#[derive(Default)]
pub(crate) struct AppState {
    pub tree: TreeState,
    pub model: Option<NodeId>,
    /// Views appended to the UI root, in mount order.
    pub mounted: Vec<NodeId>,
    /// Models and collections initialized directly on the application.
    pub owned: Vec<NodeId>,
}

pub(crate) struct ComponentState {
    pub class: ComponentClass,
    pub tree: TreeState,
    pub parent_component: Option<NodeId>,
    pub view: Option<NodeId>,
    pub model: Option<NodeId>,
    /// Models and collections this component created.
    pub owned: Vec<NodeId>,
}

pub(crate) struct ViewState {
    pub model: Option<NodeId>,
    pub parent_view: Option<NodeId>,
    pub subviews: Vec<NodeId>,
    pub mounted: bool,
}

#[derive(Default)]
pub(crate) struct ModelState {
    pub attributes: Map<String, Value>,
    /// Attributes as they were before the outermost running `set`.
    pub previous: Map<String, Value>,
    /// Attributes changed since the outermost running `set` began.
    pub changed: Map<String, Value>,
    pub changing: bool,
    pub pending: bool,
    pub collection: Option<NodeId>,
    /// Applications, components and views whose `model` slot holds this model.
    pub binders: Vec<NodeId>,
}

pub(crate) struct CollectionState {
    pub class: CollectionClass,
    pub models: Vec<NodeId>,
}

pub(crate) enum NodeDetail {
    Application(AppState),
    Component(ComponentState),
    View(ViewState),
    Model(ModelState),
    Collection(CollectionState),
}

impl NodeDetail {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Application(_) => NodeKind::Application,
            Self::Component(_) => NodeKind::Component,
            Self::View(_) => NodeKind::View,
            Self::Model(_) => NodeKind::Model,
            Self::Collection(_) => NodeKind::Collection,
        }
    }
}

/// Per-node storage.
pub(crate) struct NodeData {
    /// Display name (`toString`).
    pub name: String,
    /// Key under which the owner registered this component.
    pub instance_name: Option<String>,
    pub hub: EventHub,
    pub subscriptions: Arc<Subscriptions>,
    pub decls: Arc<Declarations>,
    /// Event maps awaiting binding; `None` once bound.
    pub maps: Option<ResolvedMaps>,
    /// Instance methods (capabilities, `add_method`).
    pub methods: HashMap<String, Method>,
    /// Options merged onto the instance.
    pub properties: Map<String, Value>,
    /// Owning component for views, models and collections.
    pub component: Option<NodeId>,
    /// Node whose bookkeeping holds this one.
    pub owner: Option<NodeId>,
    pub disposing: bool,
    pub detail: NodeDetail,
}

macro_rules! state_accessors {
    ($($variant:ident => $get:ident, $get_mut:ident, $state:ty;)*) => {
        $(
            pub fn $get(&self, operation: &'static str) -> Result<&$state> {
                match &self.detail {
                    NodeDetail::$variant(state) => Ok(state),
                    other => Err(unsupported(&self.name, other.kind(), operation)),
                }
            }

            pub fn $get_mut(&mut self, operation: &'static str) -> Result<&mut $state> {
                match &mut self.detail {
                    NodeDetail::$variant(state) => Ok(state),
                    other => Err(unsupported(&self.name, other.kind(), operation)),
                }
            }
        )*
    };
}

fn unsupported(name: &str, kind: NodeKind, operation: &'static str) -> LateralusError {
    ConfigurationError::unsupported(name, kind.as_str(), operation).into()
}

impl NodeData {
    pub fn new(name: impl Into<String>, detail: NodeDetail, decls: Arc<Declarations>) -> Self {
        let maps = Some(decls.resolve());
        Self {
            name: name.into(),
            instance_name: None,
            hub: EventHub::new(),
            subscriptions: Arc::new(Subscriptions::new()),
            decls,
            maps,
            methods: HashMap::new(),
            properties: Map::new(),
            component: None,
            owner: None,
            disposing: false,
            detail,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.detail.kind()
    }

    state_accessors! {
        Application => app, app_mut, AppState;
        Component => component_state, component_state_mut, ComponentState;
        View => view_state, view_state_mut, ViewState;
        Model => model_state, model_state_mut, ModelState;
        Collection => collection_state, collection_state_mut, CollectionState;
    }

    pub fn tree(&self) -> Option<&TreeState> {
        match &self.detail {
            NodeDetail::Application(app) => Some(&app.tree),
            NodeDetail::Component(component) => Some(&component.tree),
            _ => None,
        }
    }

    pub fn tree_mut(&mut self) -> Option<&mut TreeState> {
        match &mut self.detail {
            NodeDetail::Application(app) => Some(&mut app.tree),
            NodeDetail::Component(component) => Some(&mut component.tree),
            _ => None,
        }
    }

    pub fn owned_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.detail {
            NodeDetail::Application(app) => Some(&mut app.owned),
            NodeDetail::Component(component) => Some(&mut component.owned),
            _ => None,
        }
    }

    /// The model bound by `modelEvents`.
    pub fn bound_model(&self) -> Option<NodeId> {
        match &self.detail {
            NodeDetail::Application(app) => app.model,
            NodeDetail::Component(component) => component.model,
            NodeDetail::View(view) => view.model,
            _ => None,
        }
    }
}

/// The arena of one application tree.
pub(crate) struct NodeRegistry {
    nodes: SlotMap<NodeId, NodeData>,
    root: NodeId,
}

impl NodeRegistry {
    /// Create a registry holding the application node.
    pub fn new(root: NodeData) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(root);
        tracing::trace!(target: "lateralus::tree", ?root, "registry created");
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn insert(&mut self, data: NodeData) -> NodeId {
        let kind = data.kind();
        let id = self.nodes.insert(data);
        tracing::trace!(target: "lateralus::tree", ?id, %kind, "registered node");
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Option<NodeData> {
        self.nodes.remove(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Whether the node exists and is not being torn down.
    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|data| !data.disposing)
    }

    pub fn get(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes.get(id).ok_or(LateralusError::Disposed)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes.get_mut(id).ok_or(LateralusError::Disposed)
    }

    /// Display name of a node, for diagnostics.
    pub fn display_name(&self, id: NodeId) -> String {
        self.nodes
            .get(id)
            .map(|data| data.name.clone())
            .unwrap_or_else(|| "<disposed>".to_string())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Record that `binder` holds `model` in its `model` slot.
    pub fn bind_model(&mut self, binder: NodeId, model: NodeId) -> Result<()> {
        let state = self.get_mut(model)?.model_state_mut("bind")?;
        if !state.binders.contains(&binder) {
            state.binders.push(binder);
        }
        Ok(())
    }

    /// Clear every `model` slot that still holds `model`.
    pub fn release_model(&mut self, model: NodeId) {
        let binders = match self.get_mut(model).and_then(|d| d.model_state_mut("release")) {
            Ok(state) => std::mem::take(&mut state.binders),
            Err(_) => return,
        };
        for binder in binders {
            let Ok(data) = self.get_mut(binder) else {
                continue;
            };
            let slot = match &mut data.detail {
                NodeDetail::Application(app) => &mut app.model,
                NodeDetail::Component(component) => &mut component.model,
                NodeDetail::View(view) => &mut view.model,
                NodeDetail::Model(_) | NodeDetail::Collection(_) => continue,
            };
            if *slot == Some(model) {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_data() -> NodeData {
        NodeData::new(
            ROOT_NAME,
            NodeDetail::Application(AppState::default()),
            Arc::new(Declarations::new()),
        )
    }

    #[test]
    fn test_instance_names_count_per_type() {
        let mut registry = NodeRegistry::new(app_data());
        let a = registry.insert(app_data());
        let b = registry.insert(app_data());
        let c = registry.insert(app_data());

        let mut tree = TreeState::default();
        assert!(tree.counters.is_none());
        assert_eq!(tree.register("search", a), "search0");
        assert_eq!(tree.register("search", b), "search1");
        assert_eq!(tree.register("results", c), "results0");

        let counters = tree.counters.as_ref().unwrap();
        assert_eq!(counters["search"], 1);
        assert_eq!(counters["results"], 0);
        assert_eq!(tree.get("search1"), Some(b));
    }

    #[test]
    fn test_unregister_keeps_counters() {
        let mut registry = NodeRegistry::new(app_data());
        let a = registry.insert(app_data());
        let b = registry.insert(app_data());

        let mut tree = TreeState::default();
        tree.register("item", a);
        assert!(tree.unregister(a));
        assert!(!tree.contains(a));
        assert_eq!(tree.register("item", b), "item1");
    }

    #[test]
    fn test_wrong_kind_is_unsupported() {
        let data = app_data();
        let err = data.model_state("get").err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("get"));
    }

    #[test]
    fn test_removed_node_reports_disposed() {
        let mut registry = NodeRegistry::new(app_data());
        let id = registry.insert(app_data());
        assert!(registry.is_live(id));
        registry.remove(id);
        assert!(matches!(registry.get(id), Err(LateralusError::Disposed)));
        assert_eq!(registry.display_name(id), "<disposed>");
    }
}
