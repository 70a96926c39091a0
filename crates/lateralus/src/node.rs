//! Node handles.
//!
//! A [`Node`] is a cheap, cloneable handle to one member of an application
//! tree. All node kinds share the same handle type; kind-specific operations
//! (model attributes, collection membership, subviews) return
//! [`ConfigurationError::UnsupportedOperation`] when called on the wrong kind.
//!
//! Handles do not keep nodes alive. Once a node is disposed every operation on
//! its handles fails with [`LateralusError::Disposed`].
//!
//! # Locking
//!
//! Node storage sits behind one `RwLock` per application. The lock is only
//! held for the duration of a bookkeeping step and never while user code
//! (handlers, hooks, providers) runs.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use lateralus_core::{
    Callback, ConfigurationError, Emitter, Event, EventHub, LateralusError, ListenerId, Result,
    SharedDeferredQueue,
};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::class::{Handler, Method};
use crate::registry::{NodeData, NodeId, NodeKind, NodeRegistry};

/// State shared by every node of one application.
pub(crate) struct Shared {
    pub registry: RwLock<NodeRegistry>,
    pub deferred: SharedDeferredQueue,
}

impl Shared {
    pub fn new(root: NodeData, deferred: SharedDeferredQueue) -> Self {
        Self {
            registry: RwLock::new(NodeRegistry::new(root)),
            deferred,
        }
    }
}

/// A handle to a node of an application tree.
#[derive(Clone)]
pub struct Node {
    pub(crate) shared: Arc<Shared>,
    pub(crate) id: NodeId,
}

impl Node {
    pub(crate) fn new(shared: Arc<Shared>, id: NodeId) -> Self {
        Self { shared, id }
    }

    /// A handle to another node of the same tree.
    pub(crate) fn handle(&self, id: NodeId) -> Node {
        Node::new(self.shared.clone(), id)
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&NodeData) -> R) -> Result<R> {
        let registry = self.shared.registry.read();
        registry.get(self.id).map(f)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut NodeData) -> R) -> Result<R> {
        let mut registry = self.shared.registry.write();
        registry.get_mut(self.id).map(f)
    }

    pub(crate) fn root_id(&self) -> NodeId {
        self.shared.registry.read().root()
    }

    pub(crate) fn same_tree(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// The node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Create a weak handle that does not keep the application alive.
    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            shared: Arc::downgrade(&self.shared),
            id: self.id,
        }
    }

    /// The application node of this tree.
    pub fn lateralus(&self) -> Node {
        self.handle(self.root_id())
    }

    /// Whether this node is the application.
    pub fn is_application(&self) -> bool {
        self.id == self.root_id()
    }

    /// Whether the node has been disposed.
    pub fn is_disposed(&self) -> bool {
        !self.shared.registry.read().contains(self.id)
    }

    /// The kind discriminant.
    pub fn kind(&self) -> Result<NodeKind> {
        self.read(|d| d.kind())
    }

    /// The display name (`toString`).
    ///
    /// `"root"` for the application, the type name for components, and
    /// `"<owner>-view"`, `"<owner>-model"` or `"<owner>-collection"` for
    /// parts whose class has no name of its own.
    pub fn name(&self) -> Result<String> {
        self.read(|d| d.name.clone())
    }

    /// The key under which this component is registered with its owner.
    pub fn instance_name(&self) -> Result<Option<String>> {
        self.read(|d| d.instance_name.clone())
    }

    /// The owning component of a view, model or collection.
    pub fn component(&self) -> Result<Option<Node>> {
        let id = self.read(|d| d.component)?;
        Ok(id.map(|id| self.handle(id)))
    }

    /// The parent component of a component; `None` for top-level components.
    pub fn parent_component(&self) -> Result<Option<Node>> {
        let id = self.read(|d| match &d.detail {
            crate::registry::NodeDetail::Component(state) => state.parent_component,
            _ => None,
        })?;
        Ok(id.map(|id| self.handle(id)))
    }

    /// The view of a component.
    pub fn view(&self) -> Result<Option<Node>> {
        let id = self.read(|d| d.component_state("view").map(|c| c.view))??;
        Ok(id.map(|id| self.handle(id)))
    }

    /// The model of an application, component or view.
    pub fn model(&self) -> Result<Option<Node>> {
        let id = self.read(|d| d.bound_model())?;
        Ok(id.map(|id| self.handle(id)))
    }

    /// An instance property.
    pub fn property(&self, key: &str) -> Result<Option<Value>> {
        self.read(|d| d.properties.get(key).cloned())
    }

    /// Set an instance property.
    pub fn set_property(&self, key: impl Into<String>, value: Value) -> Result<()> {
        self.write(|d| {
            d.properties.insert(key.into(), value);
        })
    }

    /// All instance properties.
    pub fn properties(&self) -> Result<Map<String, Value>> {
        self.read(|d| d.properties.clone())
    }

    /// Add an instance method, shadowing class methods of the same name.
    pub fn add_method<F>(&self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(&Node, &[Value]) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        let method: Method = Arc::new(f);
        self.write(|d| {
            d.methods.insert(name.into(), method);
        })
    }

    /// Whether a method resolves on this node.
    pub fn has_method(&self, name: &str) -> Result<bool> {
        Ok(self.find_method(name)?.is_some())
    }

    /// Call a method by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Option<Value>> {
        let method = self.find_method(name)?.ok_or_else(|| {
            LateralusError::from(ConfigurationError::UnknownMethod {
                node: self.to_string(),
                key: name.to_string(),
                method: name.to_string(),
            })
        })?;
        method(self, args)
    }

    /// Resolve a method: instance methods first, then the class chain.
    pub(crate) fn find_method(&self, name: &str) -> Result<Option<Method>> {
        self.read(|d| {
            d.methods
                .get(name)
                .cloned()
                .or_else(|| d.decls.method(name))
        })
    }

    pub(crate) fn resolve_handler(&self, key: &str, handler: &Handler) -> Result<Method> {
        match handler {
            Handler::Inline(method) => Ok(method.clone()),
            Handler::Named(name) => self.find_method(name)?.ok_or_else(|| {
                ConfigurationError::UnknownMethod {
                    node: self.to_string(),
                    key: key.to_string(),
                    method: name.clone(),
                }
                .into()
            }),
        }
    }

    pub(crate) fn merge_capability(
        &self,
        properties: &Map<String, Value>,
        methods: &std::collections::HashMap<String, Method>,
    ) -> Result<()> {
        self.write(|d| {
            d.properties
                .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
            d.methods
                .extend(methods.iter().map(|(k, m)| (k.clone(), m.clone())));
        })
    }

    /// `toJSON()`.
    ///
    /// Models serialize their attributes and collections their models.
    /// Components use their class override or an empty object.
    pub fn to_json(&self) -> Result<Value> {
        let kind = self.kind()?;
        match kind {
            NodeKind::Model => Ok(Value::Object(self.attributes()?)),
            NodeKind::Collection => {
                let models = self.models()?;
                let values = models
                    .iter()
                    .map(|model| model.to_json())
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(values))
            }
            NodeKind::Component => {
                let hook = self.read(|d| {
                    d.component_state("toJSON")
                        .map(|c| c.class.to_json_hook().cloned())
                })??;
                match hook {
                    Some(hook) => hook(self),
                    None => Ok(Value::Object(Map::new())),
                }
            }
            NodeKind::Application | NodeKind::View => Ok(Value::Object(Map::new())),
        }
    }

    /// This node's event hub.
    pub fn hub(&self) -> Result<EventHub> {
        self.read(|d| d.hub.clone())
    }

    /// Listen on this node's own hub.
    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        Ok(self.hub()?.on(event, callback))
    }

    /// Remove a listener from this node's own hub.
    pub fn off(&self, id: ListenerId) -> Result<bool> {
        Ok(self.hub()?.off(id))
    }

    /// Trigger an event on this node only.
    pub fn trigger(&self, event: impl Into<String>, args: Vec<Value>) -> Result<()> {
        self.hub()?.trigger(&Event::new(event, args))
    }

    /// Listen to another emitter; removed by [`Node::stop_listening`] and on dispose.
    pub fn listen_to<E, F>(&self, emitter: &E, event: impl Into<String>, callback: F) -> Result<ListenerId>
    where
        E: Emitter + ?Sized,
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.listen_to_callback(emitter, event, Arc::new(callback))
    }

    pub(crate) fn listen_to_callback<E>(
        &self,
        emitter: &E,
        event: impl Into<String>,
        callback: Callback,
    ) -> Result<ListenerId>
    where
        E: Emitter + ?Sized,
    {
        let target = emitter.event_hub()?;
        let subscriptions = self.read(|d| d.subscriptions.clone())?;
        Ok(subscriptions.listen_to_callback(&target, event, callback))
    }

    /// Remove every listener this node registered on other emitters.
    pub fn stop_listening(&self) -> Result<usize> {
        let subscriptions = self.read(|d| d.subscriptions.clone())?;
        Ok(subscriptions.stop_listening())
    }

    /// Remove the listeners this node registered on one emitter.
    pub fn stop_listening_to<E>(&self, emitter: &E) -> Result<usize>
    where
        E: Emitter + ?Sized,
    {
        let target = emitter.event_hub()?;
        let subscriptions = self.read(|d| d.subscriptions.clone())?;
        Ok(subscriptions.stop_listening_to(&target))
    }
}

impl Emitter for Node {
    fn event_hub(&self) -> Result<EventHub> {
        self.hub()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.same_tree(other) && self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.shared.registry.read();
        f.write_str(&registry.display_name(self.id))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.shared.registry.read();
        let mut s = f.debug_struct("Node");
        s.field("id", &self.id);
        match registry.get(self.id) {
            Ok(data) => s
                .field("name", &data.name)
                .field("kind", &data.kind())
                .field("instance_name", &data.instance_name),
            Err(_) => s.field("disposed", &true),
        };
        s.finish()
    }
}

/// A weak handle to a node.
#[derive(Clone)]
pub struct WeakNode {
    shared: Weak<Shared>,
    id: NodeId,
}

impl WeakNode {
    /// Upgrade to a strong handle if the application and the node are alive.
    pub fn upgrade(&self) -> Option<Node> {
        let shared = self.shared.upgrade()?;
        let node = Node::new(shared, self.id);
        (!node.is_disposed()).then_some(node)
    }

    /// The node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakNode").field("id", &self.id).finish()
    }
}

static_assertions::assert_impl_all!(Node: Send, Sync);
static_assertions::assert_impl_all!(WeakNode: Send, Sync);
