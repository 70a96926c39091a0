//! The component tree.
//!
//! Components, and the models and collections initialized on them, are
//! created through their owner. Calls made on a view, model or collection are
//! forwarded to the component that owns it; calls made on a node that belongs
//! to neither a component nor the application fail with
//! [`ConfigurationError::Unwired`].

use lateralus_core::{logging::span_names, ConfigurationError, PerfSpan, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::collection::{CollectionClass, ModelInput};
use crate::component::ComponentClass;
use crate::model::{ModelClass, ModelPlacement};
use crate::node::Node;
use crate::registry::{ComponentState, NodeData, NodeDetail, NodeKind, TreeState};
use crate::view::ViewOptions;

/// Option key holding the attributes of a component's model.
pub const MODEL_ATTRIBUTES: &str = "modelAttributes";

/// Option key holding the options of a component's model.
pub const MODEL_OPTIONS: &str = "modelOptions";

impl Node {
    /// The application or component that acts for this node.
    pub(crate) fn effective_owner(&self) -> Result<Node> {
        let (kind, component) = self.read(|d| (d.kind(), d.component))?;
        if kind.owns_components() {
            return Ok(self.clone());
        }
        match component {
            Some(id) => Ok(self.handle(id)),
            None => Err(ConfigurationError::Unwired {
                node: self.to_string(),
            }
            .into()),
        }
    }

    /// Add a component with default options.
    pub fn add_component(&self, class: &ComponentClass) -> Result<Node> {
        self.add_component_with(class, ViewOptions::default(), Map::new())
    }

    /// Add a component.
    ///
    /// The component becomes a child of this node (or of the component that
    /// owns this node) and is registered as `<type name><n>`, where `n`
    /// counts from zero per owner and type. When the application adds a
    /// component with a view, the view is mounted on the UI root.
    ///
    /// `options` are merged onto the component. Its `modelAttributes` and
    /// `modelOptions` entries configure the component's model.
    #[tracing::instrument(skip_all, target = "lateralus::tree", level = "trace", fields(class = class.name()))]
    pub fn add_component_with(
        &self,
        class: &ComponentClass,
        view_options: ViewOptions,
        options: Map<String, Value>,
    ) -> Result<Node> {
        let _perf = PerfSpan::new(span_names::ADD_COMPONENT);
        let owner = self.effective_owner()?;
        let owner_is_app = owner.kind()? == NodeKind::Application;

        let mut data = NodeData::new(
            class.name(),
            NodeDetail::Component(ComponentState {
                class: class.clone(),
                tree: TreeState::default(),
                parent_component: (!owner_is_app).then_some(owner.id),
                view: None,
                model: None,
                owned: Vec::new(),
            }),
            class.declarations().clone(),
        );
        data.owner = Some(owner.id);
        let id = self.shared.registry.write().insert(data);
        let component = self.handle(id);

        if let Err(err) = component.construct(class, view_options, options) {
            tracing::warn!(target: "lateralus::tree", component = class.name(), error = %err, "component construction failed");
            component.discard();
            return Err(err);
        }

        let instance_name = {
            let mut registry = self.shared.registry.write();
            let tree = registry
                .get_mut(owner.id)?
                .tree_mut()
                .ok_or(lateralus_core::LateralusError::Disposed)?;
            let instance_name = tree.register(class.name(), id);
            registry.get_mut(id)?.instance_name = Some(instance_name.clone());
            instance_name
        };

        if owner_is_app {
            if let Some(view) = component.view()? {
                owner.mount(&view)?;
            }
        }

        tracing::trace!(target: "lateralus::tree", owner = %owner, instance = %instance_name, "component added");
        Ok(component)
    }

    fn construct(
        &self,
        class: &ComponentClass,
        view_options: ViewOptions,
        options: Map<String, Value>,
    ) -> Result<()> {
        for capability in class.mixins() {
            capability.apply(self)?;
        }

        if let Some(view_class) = class.view() {
            let mut view_options = view_options;
            if view_options.model.is_none() {
                if let Some(model_class) = class.model() {
                    let attributes = object_option(&options, MODEL_ATTRIBUTES);
                    let model_options = object_option(&options, MODEL_OPTIONS);
                    let model = self.build_model(
                        model_class,
                        attributes,
                        &model_options,
                        ModelPlacement {
                            owner: self.id,
                            component: Some(self.id),
                            relay_changes: false,
                        },
                    )?;
                    self.write(|d| {
                        if let Ok(state) = d.component_state_mut("addComponent") {
                            state.owned.push(model.id);
                        }
                    })?;
                    view_options.model = Some(model);
                }
            }

            let model = view_options.model.as_ref().map(|m| m.id);
            let view = self.build_view(view_class, view_options, self.id, None)?;
            let mut registry = self.shared.registry.write();
            let state = registry.get_mut(self.id)?.component_state_mut("addComponent")?;
            state.view = Some(view.id);
            state.model = model;
            if let Some(model) = model {
                registry.bind_model(self.id, model)?;
            }
        }

        self.write(|d| d.properties.extend(options.clone()))?;

        if let Some(initialize) = class.initialize_hook() {
            initialize(self, &options)?;
        }

        self.delegate_lateralus_events()
    }

    /// Initialize a model owned by this node's application or component.
    pub fn init_model(
        &self,
        class: &ModelClass,
        attributes: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Node> {
        let owner = self.effective_owner()?;
        let component = (owner.kind()? == NodeKind::Component).then_some(owner.id);
        let model = owner.build_model(
            class,
            attributes,
            &options,
            ModelPlacement {
                owner: owner.id,
                component,
                relay_changes: false,
            },
        )?;
        owner.adopt(&model)?;
        Ok(model)
    }

    /// Initialize a collection owned by this node's application or component.
    pub fn init_collection(
        &self,
        class: &CollectionClass,
        models: Vec<ModelInput>,
        options: Map<String, Value>,
    ) -> Result<Node> {
        let owner = self.effective_owner()?;
        let component = (owner.kind()? == NodeKind::Component).then_some(owner.id);
        let collection = owner.build_collection(class, models, &options, component)?;
        owner.adopt(&collection)?;
        Ok(collection)
    }

    fn adopt(&self, node: &Node) -> Result<()> {
        self.write(|d| {
            if let Some(owned) = d.owned_mut() {
                owned.push(node.id);
            }
        })
    }

    /// Subcomponents, keyed by instance name, in insertion order.
    pub fn components(&self) -> Result<Vec<(String, Node)>> {
        let entries = self.read(|d| d.tree().map(|t| t.components.clone()).unwrap_or_default())?;
        Ok(entries
            .into_iter()
            .map(|(name, id)| (name, self.handle(id)))
            .collect())
    }

    /// The subcomponent registered under `instance_name`.
    pub fn component_named(&self, instance_name: &str) -> Result<Option<Node>> {
        let id = self.read(|d| d.tree().and_then(|t| t.get(instance_name)))?;
        Ok(id.map(|id| self.handle(id)))
    }

    /// Last used instance suffix per component type; `None` until the first
    /// component is added.
    pub fn component_counters(&self) -> Result<Option<HashMap<String, usize>>> {
        self.read(|d| d.tree().and_then(|t| t.counters.clone()))
    }
}

fn object_option(options: &Map<String, Value>, key: &str) -> Map<String, Value> {
    match options.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Lateralus;
    use crate::view::ViewClass;
    use serde_json::json;

    #[test]
    fn test_counters_absent_until_first_component() {
        let app = Lateralus::new().unwrap();
        assert!(app.component_counters().unwrap().is_none());

        let component = app.add_component(&ComponentClass::base()).unwrap();
        let counters = app.component_counters().unwrap().unwrap();
        assert_eq!(counters["component"], 0);
        assert_eq!(app.component_named("component0").unwrap(), Some(component));
    }

    #[test]
    fn test_child_component_belongs_to_parent() {
        let app = Lateralus::new().unwrap();
        let parent = app.add_component(&ComponentClass::base()).unwrap();
        let child = parent.add_component(&ComponentClass::base()).unwrap();

        assert_eq!(child.parent_component().unwrap(), Some(parent.clone()));
        assert_eq!(parent.components().unwrap().len(), 1);
        assert_eq!(app.components().unwrap().len(), 1);
        assert_eq!(child.instance_name().unwrap().as_deref(), Some("component0"));
    }

    #[test]
    fn test_model_options_reach_component_model() {
        let app = Lateralus::new().unwrap();
        let class = ComponentClass::builder()
            .name("profile")
            .view(ViewClass::base())
            .model(ModelClass::base())
            .build()
            .unwrap();

        let mut options = Map::new();
        options.insert(MODEL_ATTRIBUTES.into(), json!({"user": "ada"}));
        options.insert("title".into(), json!("Profile"));
        let component = app
            .add_component_with(&class, ViewOptions::default(), options)
            .unwrap();

        let model = component.model().unwrap().unwrap();
        assert_eq!(model.get("user").unwrap(), Some(json!("ada")));
        assert_eq!(model.name().unwrap(), "profile-model");
        assert_eq!(component.property("title").unwrap(), Some(json!("Profile")));
        let view = component.view().unwrap().unwrap();
        assert_eq!(view.model().unwrap(), Some(model));
        assert_eq!(view.name().unwrap(), "profile-view");
    }

    #[test]
    fn test_supplied_model_takes_precedence() {
        let app = Lateralus::new().unwrap();
        let shared_model = app.init_model(&ModelClass::base(), Map::new(), Map::new()).unwrap();
        let class = ComponentClass::builder()
            .name("viewer")
            .view(ViewClass::base())
            .model(ModelClass::base())
            .build()
            .unwrap();

        let component = app
            .add_component_with(
                &class,
                ViewOptions::new().with_model(shared_model.clone()),
                Map::new(),
            )
            .unwrap();
        assert_eq!(component.model().unwrap(), Some(shared_model));
    }

    #[test]
    fn test_init_model_forwards_from_view() {
        let app = Lateralus::new().unwrap();
        let class = ComponentClass::builder()
            .name("widget")
            .view(ViewClass::base())
            .build()
            .unwrap();
        let component = app.add_component(&class).unwrap();
        let view = component.view().unwrap().unwrap();

        let model = view.init_model(&ModelClass::base(), Map::new(), Map::new()).unwrap();
        assert_eq!(model.component().unwrap(), Some(component));
        assert_eq!(model.name().unwrap(), "widget-model");
    }
}
