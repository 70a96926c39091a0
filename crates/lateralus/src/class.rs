//! Declarative event maps, methods and capabilities shared by every class.
//!
//! A class declares three maps:
//!
//! - `lateralusEvents`: handlers bound to the application's event stream
//! - `modelEvents`: handlers bound to the node's model
//! - `provide`: providers answering [`crate::Node::collect`] requests
//!
//! Keys are event names, optionally followed by whitespace and an ignored
//! suffix (so one event can have several entries). Values are [`Handler`]s:
//! an inline closure or the name of a method resolved on the instance.
//!
//! Declarations form an `Arc` chain from the most-derived class to the base.
//! [`Declarations::resolve`] merges the chain root-first, so derived entries
//! replace inherited ones on key collision. Resolution copies; shared
//! declarations are never mutated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lateralus_core::Result;
use serde_json::{Map, Value};

use crate::node::Node;

/// A method callable on a node.
///
/// Receives the node it was resolved on and the event arguments. Returning
/// `Some` from a provider contributes a value to the collected results.
pub type Method = Arc<dyn Fn(&Node, &[Value]) -> Result<Option<Value>> + Send + Sync>;

/// Hook run once after a capability has been applied to an instance.
pub type ApplyHook = Arc<dyn Fn(&Node) -> Result<()> + Send + Sync>;

/// The value side of an event-map entry.
#[derive(Clone)]
pub enum Handler {
    /// A closure.
    Inline(Method),
    /// The name of a method looked up on the instance when maps are bound.
    Named(String),
}

impl Handler {
    /// An inline event handler.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Node, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        Self::Inline(Arc::new(move |node, args| {
            f(node, args)?;
            Ok(None)
        }))
    }

    /// An inline provider. `None` is left out of collected results.
    pub fn provider<F>(f: F) -> Self
    where
        F: Fn(&Node, &[Value]) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        Self::Inline(Arc::new(f))
    }

    /// A reference to a method by name.
    pub fn method(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl From<&str> for Handler {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for Handler {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Method> for Handler {
    fn from(method: Method) -> Self {
        Self::Inline(method)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Handler::Inline(..)"),
            Self::Named(name) => write!(f, "Handler::Named({name:?})"),
        }
    }
}

/// The event name addressed by a map key: its first whitespace-separated token.
pub fn event_name(key: &str) -> &str {
    key.split_whitespace().next().unwrap_or("")
}

/// An insertion-ordered map from keys to handlers.
#[derive(Clone, Default, Debug)]
pub struct EventMap {
    entries: Vec<(String, Handler)>,
}

impl EventMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. An existing entry with the same key is replaced in place.
    pub fn insert(&mut self, key: impl Into<String>, handler: Handler) -> Option<Handler> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, handler)),
            None => {
                self.entries.push((key, handler));
                None
            }
        }
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &str) -> Option<Handler> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&Handler> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, h)| h)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// The entries, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Handler)> {
        self.entries.iter().map(|(k, h)| (k.as_str(), h))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply `other` on top of this map.
    pub fn overlay(&mut self, other: &EventMap) {
        for (key, handler) in &other.entries {
            self.insert(key.clone(), handler.clone());
        }
    }
}

/// The event maps of one node, merged over its class chain.
#[derive(Clone, Default, Debug)]
pub struct ResolvedMaps {
    /// Handlers for the application's event stream.
    pub lateralus_events: EventMap,
    /// Handlers for the node's model.
    pub model_events: EventMap,
    /// Providers.
    pub provide: EventMap,
}

/// Which of the three maps an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    /// `lateralusEvents`.
    LateralusEvents,
    /// `modelEvents`.
    ModelEvents,
    /// `provide`.
    Provide,
}

impl ResolvedMaps {
    /// The map of the given kind.
    pub fn map_mut(&mut self, kind: MapKind) -> &mut EventMap {
        match kind {
            MapKind::LateralusEvents => &mut self.lateralus_events,
            MapKind::ModelEvents => &mut self.model_events,
            MapKind::Provide => &mut self.provide,
        }
    }
}

/// Event maps and methods declared by one class, linked to its parent's.
#[derive(Clone, Default)]
pub struct Declarations {
    parent: Option<Arc<Declarations>>,
    lateralus_events: EventMap,
    model_events: EventMap,
    provide: EventMap,
    methods: HashMap<String, Method>,
}

impl Declarations {
    /// Declarations with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty declarations inheriting from `parent`.
    pub fn inherit(parent: Arc<Declarations>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// The parent class's declarations.
    pub fn parent(&self) -> Option<&Arc<Declarations>> {
        self.parent.as_ref()
    }

    /// This class's own `lateralusEvents` entries.
    pub fn lateralus_events(&self) -> &EventMap {
        &self.lateralus_events
    }

    /// This class's own `modelEvents` entries.
    pub fn model_events(&self) -> &EventMap {
        &self.model_events
    }

    /// This class's own providers.
    pub fn provide(&self) -> &EventMap {
        &self.provide
    }

    pub(crate) fn map_mut(&mut self, kind: MapKind) -> &mut EventMap {
        match kind {
            MapKind::LateralusEvents => &mut self.lateralus_events,
            MapKind::ModelEvents => &mut self.model_events,
            MapKind::Provide => &mut self.provide,
        }
    }

    pub(crate) fn insert_method(&mut self, name: impl Into<String>, method: Method) {
        self.methods.insert(name.into(), method);
    }

    /// Merge the chain into one set of maps, most-derived entries winning.
    pub fn resolve(&self) -> ResolvedMaps {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(decls) = current {
            chain.push(decls);
            current = decls.parent.as_deref();
        }

        let mut maps = ResolvedMaps::default();
        for decls in chain.into_iter().rev() {
            maps.lateralus_events.overlay(&decls.lateralus_events);
            maps.model_events.overlay(&decls.model_events);
            maps.provide.overlay(&decls.provide);
        }
        maps
    }

    /// Look up a method, most-derived class first.
    pub fn method(&self, name: &str) -> Option<Method> {
        let mut current = Some(self);
        while let Some(decls) = current {
            if let Some(method) = decls.methods.get(name) {
                return Some(method.clone());
            }
            current = decls.parent.as_deref();
        }
        None
    }
}

impl fmt::Debug for Declarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declarations")
            .field("lateralus_events", &self.lateralus_events)
            .field("model_events", &self.model_events)
            .field("provide", &self.provide)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// Builder methods shared by every class builder.
pub trait Declare: Sized {
    /// The declarations being built.
    fn declarations_mut(&mut self) -> &mut Declarations;

    /// Add a `lateralusEvents` entry.
    fn lateralus_event(mut self, key: impl Into<String>, handler: impl Into<Handler>) -> Self {
        self.declarations_mut()
            .map_mut(MapKind::LateralusEvents)
            .insert(key, handler.into());
        self
    }

    /// Add a `modelEvents` entry.
    fn model_event(mut self, key: impl Into<String>, handler: impl Into<Handler>) -> Self {
        self.declarations_mut()
            .map_mut(MapKind::ModelEvents)
            .insert(key, handler.into());
        self
    }

    /// Add a provider.
    fn provide(mut self, key: impl Into<String>, handler: impl Into<Handler>) -> Self {
        self.declarations_mut()
            .map_mut(MapKind::Provide)
            .insert(key, handler.into());
        self
    }

    /// Declare a method, reachable from named handlers and [`Node::call`].
    fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Node, &[Value]) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.declarations_mut().insert_method(name, Arc::new(f));
        self
    }
}

/// A runtime mixin: properties and methods merged into an instance.
#[derive(Clone)]
pub struct Capability {
    name: String,
    properties: Map<String, Value>,
    methods: HashMap<String, Method>,
    on_apply: Option<ApplyHook>,
}

impl Capability {
    /// Create an empty capability.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Map::new(),
            methods: HashMap::new(),
            on_apply: None,
        }
    }

    /// Add a property to the patch.
    pub fn property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Add a method.
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Node, &[Value]) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }

    /// Run `hook` after the patch has been applied.
    pub fn on_apply<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Node) -> Result<()> + Send + Sync + 'static,
    {
        self.on_apply = Some(Arc::new(hook));
        self
    }

    /// The capability name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn apply(&self, node: &Node) -> Result<()> {
        tracing::trace!(target: "lateralus::tree", capability = %self.name, node = %node, "applying capability");
        node.merge_capability(&self.properties, &self.methods)?;
        if let Some(hook) = &self.on_apply {
            hook(node)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
