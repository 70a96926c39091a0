//! Models: attribute maps with change notification.
//!
//! `set` follows the classic observable-model contract:
//!
//! 1. Every attribute whose value changes triggers `change:<attr>` (with the
//!    new value) on the model.
//! 2. When the outermost `set` finishes, `change` is triggered, repeatedly,
//!    until handlers stop making further changes.
//!
//! A `set` made from inside a change handler joins the running one: its
//! `change:<attr>` events fire immediately and its `change` is folded into the
//! outer loop.
//!
//! The application's own model additionally relays every changed attribute
//! through [`Node::emit`] and drops it from its pending change set, so a
//! handler that writes another attribute does not see the first change again.

use std::fmt;
use std::sync::Arc;

use lateralus_core::{Event, Result};
use serde_json::{Map, Value};

use crate::class::{Declarations, Declare};
use crate::node::Node;
use crate::registry::{ModelState, NodeData, NodeDetail, NodeId};

/// `initialize(options)` hook of a model.
pub type ModelInitializeFn = Arc<dyn Fn(&Node, &Map<String, Value>) -> Result<()> + Send + Sync>;

/// A model type.
#[derive(Clone)]
pub struct ModelClass {
    name: Option<String>,
    decls: Arc<Declarations>,
    defaults: Map<String, Value>,
    initialize: Option<ModelInitializeFn>,
}

impl ModelClass {
    /// The plain model class.
    pub fn base() -> Self {
        Self::builder().build()
    }

    /// Start building a model class.
    pub fn builder() -> ModelClassBuilder {
        ModelClassBuilder {
            name: None,
            decls: Declarations::new(),
            defaults: Map::new(),
            initialize: None,
        }
    }

    /// Start building a subclass that inherits defaults, hooks and maps.
    pub fn extend(&self) -> ModelClassBuilder {
        ModelClassBuilder {
            name: self.name.clone(),
            decls: Declarations::inherit(self.decls.clone()),
            defaults: self.defaults.clone(),
            initialize: self.initialize.clone(),
        }
    }

    /// Explicit display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Default attributes.
    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }
}

impl Default for ModelClass {
    fn default() -> Self {
        Self::base()
    }
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Builder for [`ModelClass`].
pub struct ModelClassBuilder {
    name: Option<String>,
    decls: Declarations,
    defaults: Map<String, Value>,
    initialize: Option<ModelInitializeFn>,
}

impl ModelClassBuilder {
    /// Set an explicit display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a default attribute.
    pub fn default_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(key.into(), value);
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

    /// Build the class.
    pub fn build(self) -> ModelClass {
        ModelClass {
            name: self.name,
            decls: Arc::new(self.decls),
            defaults: self.defaults,
            initialize: self.initialize,
        }
    }
}

impl Declare for ModelClassBuilder {
    fn declarations_mut(&mut self) -> &mut Declarations {
        &mut self.decls
    }
}

/// Options for [`Node::set_attributes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Suppress all change events.
    pub silent: bool,
    /// Remove the given attributes instead of setting them.
    pub unset: bool,
}

impl SetOptions {
    /// Options that suppress change events.
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }
}

/// Options for [`Node::destroy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Dispose the model after destroying it.
    pub dispose: bool,
}

/// Where a new model is registered and what it belongs to.
pub(crate) struct ModelPlacement {
    pub owner: NodeId,
    pub component: Option<NodeId>,
    pub relay_changes: bool,
}

impl Node {
    /// Build a model owned by `self`. The caller records it in the owner's
    /// bookkeeping.
    pub(crate) fn build_model(
        &self,
        class: &ModelClass,
        attributes: Map<String, Value>,
        options: &Map<String, Value>,
        placement: ModelPlacement,
    ) -> Result<Node> {
        let name = match class.name() {
            Some(name) => name.to_string(),
            None => format!("{}-model", self.name()?),
        };
        let mut data = NodeData::new(
            name,
            NodeDetail::Model(ModelState::default()),
            class.decls.clone(),
        );
        data.owner = Some(placement.owner);
        data.component = placement.component;
        let id = self.shared.registry.write().insert(data);
        let model = self.handle(id);

        let built = (|| {
            model.delegate_lateralus_events()?;
            if placement.relay_changes {
                model.install_change_relay()?;
            }
            let mut initial = class.defaults.clone();
            initial.extend(attributes);
            model.set_attributes(initial, SetOptions::silent())?;
            model.write(|d| {
                if let Ok(state) = d.model_state_mut("initialize") {
                    state.changed.clear();
                }
            })?;
            if let Some(initialize) = &class.initialize {
                initialize(&model, options)?;
            }
            Ok(())
        })();

        if let Err(err) = built {
            tracing::warn!(target: "lateralus::model", model = %model, error = %err, "model construction failed");
            model.discard();
            return Err(err);
        }
        tracing::trace!(target: "lateralus::model", model = %model, "model built");
        Ok(model)
    }

    fn install_change_relay(&self) -> Result<()> {
        let weak = self.downgrade();
        self.on("change", move |_event| {
            let Some(model) = weak.upgrade() else {
                return Ok(());
            };
            let changed = model.read(|d| d.model_state("change").map(|s| s.changed.clone()))??;
            for (key, value) in changed {
                model.emit(format!("change:{key}"), vec![value])?;
                model.write(|d| {
                    if let Ok(state) = d.model_state_mut("change") {
                        state.changed.remove(&key);
                    }
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// An attribute of a model.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.read(|d| d.model_state("get").map(|s| s.attributes.get(key).cloned()))?
    }

    /// All attributes of a model.
    pub fn attributes(&self) -> Result<Map<String, Value>> {
        self.read(|d| d.model_state("attributes").map(|s| s.attributes.clone()))?
    }

    /// Whether a model has a non-null attribute.
    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some_and(|value| !value.is_null()))
    }

    /// Set one attribute.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<()> {
        let mut attributes = Map::new();
        attributes.insert(key.into(), value);
        self.set_attributes(attributes, SetOptions::default())
    }

    /// Remove one attribute.
    pub fn unset(&self, key: impl Into<String>) -> Result<()> {
        let mut attributes = Map::new();
        attributes.insert(key.into(), Value::Null);
        self.set_attributes(
            attributes,
            SetOptions {
                unset: true,
                ..SetOptions::default()
            },
        )
    }

    /// Set (or unset) several attributes.
    pub fn set_attributes(&self, attributes: Map<String, Value>, options: SetOptions) -> Result<()> {
        let (hub, changes, nested) = {
            let mut registry = self.shared.registry.write();
            let data = registry.get_mut(self.id)?;
            let hub = data.hub.clone();
            let state = data.model_state_mut("set")?;

            let nested = state.changing;
            state.changing = true;
            if !nested {
                state.previous = state.attributes.clone();
                state.changed.clear();
            }

            let mut changes = Vec::new();
            for (key, value) in attributes {
                let next = (!options.unset).then_some(value);
                if state.attributes.get(&key) != next.as_ref() {
                    changes.push((key.clone(), next.clone().unwrap_or(Value::Null)));
                }
                if state.previous.get(&key) != next.as_ref() {
                    state
                        .changed
                        .insert(key.clone(), next.clone().unwrap_or(Value::Null));
                } else {
                    state.changed.remove(&key);
                }
                match next {
                    Some(value) => {
                        state.attributes.insert(key, value);
                    }
                    None => {
                        state.attributes.remove(&key);
                    }
                }
            }
            if !options.silent && !changes.is_empty() {
                state.pending = true;
            }
            (hub, changes, nested)
        };

        let notified = (|| {
            if options.silent {
                return Ok(());
            }
            for (key, value) in &changes {
                hub.trigger(&Event::new(format!("change:{key}"), vec![value.clone()]))?;
            }
            if nested {
                return Ok(());
            }
            while self.take_pending() {
                hub.trigger(&Event::new("change", vec![]))?;
            }
            Ok(())
        })();

        if !nested {
            // The model may have been disposed by a handler.
            let _ = self.write(|d| {
                if let Ok(state) = d.model_state_mut("set") {
                    state.pending = false;
                    state.changing = false;
                }
            });
        }
        notified
    }

    fn take_pending(&self) -> bool {
        self.write(|d| match d.model_state_mut("set") {
            Ok(state) => std::mem::take(&mut state.pending),
            Err(_) => false,
        })
        .unwrap_or(false)
    }

    /// Attributes changed by the running (or last) `set`, or `None`.
    pub fn changed_attributes(&self) -> Result<Option<Map<String, Value>>> {
        self.read(|d| {
            d.model_state("changedAttributes")
                .map(|s| (!s.changed.is_empty()).then(|| s.changed.clone()))
        })?
    }

    /// Whether an attribute changed in the running (or last) `set`.
    pub fn has_changed(&self, key: &str) -> Result<bool> {
        self.read(|d| d.model_state("hasChanged").map(|s| s.changed.contains_key(key)))?
    }

    /// The value of an attribute before the running (or last) `set`.
    pub fn previous(&self, key: &str) -> Result<Option<Value>> {
        self.read(|d| d.model_state("previous").map(|s| s.previous.get(key).cloned()))?
    }

    /// The collection a model belongs to.
    pub fn collection(&self) -> Result<Option<Node>> {
        let id = self.read(|d| d.model_state("collection").map(|s| s.collection))??;
        Ok(id.map(|id| self.handle(id)))
    }

    /// Trigger `destroy`, leave the collection and optionally dispose.
    pub fn destroy(&self, options: DestroyOptions) -> Result<()> {
        self.read(|d| d.model_state("destroy").map(|_| ()))??;
        let model_json = self.to_json()?;
        self.trigger("destroy", vec![model_json])?;
        if let Some(collection) = self.collection()? {
            collection.remove_model(self, crate::collection::RemoveOptions::default())?;
        }
        if options.dispose {
            self.dispose()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Lateralus;
    use parking_lot::Mutex;
    use serde_json::json;

    fn model() -> (Lateralus, Node) {
        let app = Lateralus::new().unwrap();
        let model = app.init_model(&ModelClass::base(), Map::new(), Map::new()).unwrap();
        (app, model)
    }

    #[test]
    fn test_set_triggers_attribute_then_change() {
        let (_app, model) = model();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        model
            .on("change:name", move |e| {
                l.lock().push(format!("change:name={}", e.args()[0]));
                Ok(())
            })
            .unwrap();
        let l = log.clone();
        model
            .on("change", move |_| {
                l.lock().push("change".to_string());
                Ok(())
            })
            .unwrap();

        model.set("name", json!("a")).unwrap();
        assert_eq!(*log.lock(), vec!["change:name=\"a\"", "change"]);

        // Same value: nothing fires.
        model.set("name", json!("a")).unwrap();
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_silent_set_and_unset() {
        let (_app, model) = model();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        model
            .on("change", move |_| {
                *c.lock() += 1;
                Ok(())
            })
            .unwrap();

        let mut attrs = Map::new();
        attrs.insert("a".into(), json!(1));
        model.set_attributes(attrs, SetOptions::silent()).unwrap();
        assert_eq!(*count.lock(), 0);
        assert_eq!(model.get("a").unwrap(), Some(json!(1)));

        model.unset("a").unwrap();
        assert_eq!(*count.lock(), 1);
        assert_eq!(model.get("a").unwrap(), None);
        assert!(!model.has("a").unwrap());
    }

    #[test]
    fn test_nested_set_folds_into_outer_change_loop() {
        let (_app, model) = model();
        let changes = Arc::new(Mutex::new(0));

        let weak = model.downgrade();
        model
            .on("change:first", move |_| {
                weak.upgrade().unwrap().set("second", json!(2))
            })
            .unwrap();
        let c = changes.clone();
        model
            .on("change", move |_| {
                *c.lock() += 1;
                Ok(())
            })
            .unwrap();

        model.set("first", json!(1)).unwrap();
        assert_eq!(model.get("second").unwrap(), Some(json!(2)));
        assert_eq!(*changes.lock(), 1);
        assert!(model.has_changed("first").unwrap());
        assert!(model.has_changed("second").unwrap());
    }

    #[test]
    fn test_previous_and_changed_attributes() {
        let (_app, model) = model();
        model.set("n", json!(1)).unwrap();
        model.set("n", json!(2)).unwrap();

        assert_eq!(model.previous("n").unwrap(), Some(json!(1)));
        let changed = model.changed_attributes().unwrap().unwrap();
        assert_eq!(changed.get("n"), Some(&json!(2)));
    }

    #[test]
    fn test_defaults_are_overlaid_by_attributes() {
        let app = Lateralus::new().unwrap();
        let class = ModelClass::builder()
            .default_attribute("color", json!("red"))
            .default_attribute("size", json!(1))
            .build();
        let mut attrs = Map::new();
        attrs.insert("size".into(), json!(3));

        let model = app.init_model(&class, attrs, Map::new()).unwrap();
        assert_eq!(model.to_json().unwrap(), json!({"color": "red", "size": 3}));
        assert_eq!(model.changed_attributes().unwrap(), None);
    }

    #[test]
    fn test_model_operations_rejected_on_other_kinds() {
        let app = Lateralus::new().unwrap();
        let err = app.get("x").unwrap_err();
        assert!(err.is_configuration());
    }
}
