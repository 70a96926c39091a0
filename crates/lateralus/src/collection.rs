//! Ordered collections of models.

use std::fmt;
use std::sync::Arc;

use lateralus_core::{ConfigurationError, Result};
use serde_json::{Map, Value};

use crate::class::{Declarations, Declare};
use crate::model::ModelClass;
use crate::node::Node;
use crate::registry::{CollectionState, NodeData, NodeDetail, NodeId, NodeKind};

/// `initialize(options)` hook of a collection.
pub type CollectionInitializeFn =
    Arc<dyn Fn(&Node, &Map<String, Value>) -> Result<()> + Send + Sync>;

/// Attribute used to match incoming data against existing models.
pub const ID_ATTRIBUTE: &str = "id";

/// A collection type.
#[derive(Clone)]
pub struct CollectionClass {
    name: Option<String>,
    decls: Arc<Declarations>,
    model: ModelClass,
    initialize: Option<CollectionInitializeFn>,
}

impl CollectionClass {
    /// A collection of plain models.
    pub fn base() -> Self {
        Self::builder().build()
    }

    /// Start building a collection class.
    pub fn builder() -> CollectionClassBuilder {
        CollectionClassBuilder {
            name: None,
            decls: Declarations::new(),
            model: ModelClass::base(),
            initialize: None,
        }
    }

    /// Start building a subclass.
    pub fn extend(&self) -> CollectionClassBuilder {
        CollectionClassBuilder {
            name: self.name.clone(),
            decls: Declarations::inherit(self.decls.clone()),
            model: self.model.clone(),
            initialize: self.initialize.clone(),
        }
    }

    /// Explicit display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Class of the models built from attribute data.
    pub fn model(&self) -> &ModelClass {
        &self.model
    }
}

impl fmt::Debug for CollectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionClass")
            .field("name", &self.name)
            .field("model", &self.model)
            .finish()
    }
}

/// Builder for [`CollectionClass`].
pub struct CollectionClassBuilder {
    name: Option<String>,
    decls: Declarations,
    model: ModelClass,
    initialize: Option<CollectionInitializeFn>,
}

impl CollectionClassBuilder {
    /// Set an explicit display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the class of models built from attribute data.
    pub fn model(mut self, model: ModelClass) -> Self {
        self.model = model;
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
    pub fn build(self) -> CollectionClass {
        CollectionClass {
            name: self.name,
            decls: Arc::new(self.decls),
            model: self.model,
            initialize: self.initialize,
        }
    }
}

impl Declare for CollectionClassBuilder {
    fn declarations_mut(&mut self) -> &mut Declarations {
        &mut self.decls
    }
}

/// Options for [`Node::remove_model`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Dispose the removed model.
    pub dispose: bool,
}

/// Input to [`Node::set_models`].
#[derive(Debug, Clone)]
pub enum ModelInput {
    /// An existing model.
    Node(Node),
    /// Attributes to merge into the model with the same `id`, or to build a
    /// new model from.
    Attributes(Map<String, Value>),
}

impl From<Node> for ModelInput {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Map<String, Value>> for ModelInput {
    fn from(attributes: Map<String, Value>) -> Self {
        Self::Attributes(attributes)
    }
}

impl Node {
    /// Build a collection owned by `self`. The caller records it in the
    /// owner's bookkeeping.
    pub(crate) fn build_collection(
        &self,
        class: &CollectionClass,
        models: Vec<ModelInput>,
        options: &Map<String, Value>,
        component: Option<NodeId>,
    ) -> Result<Node> {
        let name = match class.name() {
            Some(name) => name.to_string(),
            None => format!("{}-collection", self.name()?),
        };
        let mut data = NodeData::new(
            name,
            NodeDetail::Collection(CollectionState {
                class: class.clone(),
                models: Vec::new(),
            }),
            class.decls.clone(),
        );
        data.owner = Some(self.id);
        data.component = component;
        let id = self.shared.registry.write().insert(data);
        let collection = self.handle(id);

        let built = (|| {
            collection.delegate_lateralus_events()?;
            if let Some(initialize) = &class.initialize {
                initialize(&collection, options)?;
            }
            collection.set_models(models)?;
            Ok(())
        })();

        if let Err(err) = built {
            tracing::warn!(target: "lateralus::model", collection = %collection, error = %err, "collection construction failed");
            collection.discard();
            return Err(err);
        }
        Ok(collection)
    }

    /// Models of a collection, in order.
    pub fn models(&self) -> Result<Vec<Node>> {
        let ids = self.read(|d| d.collection_state("models").map(|s| s.models.clone()))??;
        Ok(ids.into_iter().map(|id| self.handle(id)).collect())
    }

    /// Number of models in a collection.
    pub fn len(&self) -> Result<usize> {
        self.read(|d| d.collection_state("len").map(|s| s.models.len()))?
    }

    /// Whether a collection is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The model whose `id` attribute equals `id`.
    pub fn get_by_id(&self, id: &Value) -> Result<Option<Node>> {
        for model in self.models()? {
            if model.get(ID_ATTRIBUTE)?.as_ref() == Some(id) {
                return Ok(Some(model));
            }
        }
        Ok(None)
    }

    /// Append a model. Adding a member again is a no-op.
    ///
    /// Fails with [`ConfigurationError::ForeignMember`] if the model belongs
    /// to another collection.
    pub fn add_model(&self, model: &Node) -> Result<()> {
        self.check_member(model, "add")?;
        let added = {
            let mut registry = self.shared.registry.write();
            let current = registry.get(model.id)?.model_state("add")?.collection;
            if let Some(other) = current.filter(|other| *other != self.id) {
                return Err(ConfigurationError::ForeignMember {
                    model: registry.display_name(model.id),
                    collection: registry.display_name(other),
                }
                .into());
            }
            let state = registry.get_mut(self.id)?.collection_state_mut("add")?;
            if state.models.contains(&model.id) {
                false
            } else {
                state.models.push(model.id);
                registry
                    .get_mut(model.id)?
                    .model_state_mut("add")?
                    .collection = Some(self.id);
                true
            }
        };
        if added {
            tracing::trace!(target: "lateralus::model", collection = %self, model = %model, "model added");
            let args = vec![model.to_json()?];
            model.trigger("add", args.clone())?;
            self.trigger("add", args)?;
        }
        Ok(())
    }

    /// Remove a model, disposing it when asked. Returns whether it was a member.
    pub fn remove_model(&self, model: &Node, options: RemoveOptions) -> Result<bool> {
        self.check_member(model, "remove")?;
        let removed = {
            let mut registry = self.shared.registry.write();
            let state = registry.get_mut(self.id)?.collection_state_mut("remove")?;
            let before = state.models.len();
            state.models.retain(|id| *id != model.id);
            let removed = state.models.len() != before;
            if removed {
                if let Ok(model_data) = registry.get_mut(model.id) {
                    if let Ok(model_state) = model_data.model_state_mut("remove") {
                        if model_state.collection == Some(self.id) {
                            model_state.collection = None;
                        }
                    }
                }
            }
            removed
        };

        if removed {
            tracing::trace!(target: "lateralus::model", collection = %self, model = %model, dispose = options.dispose, "model removed");
            let args = vec![model.to_json()?];
            model.trigger("remove", args.clone())?;
            self.trigger("remove", args)?;
        }
        if options.dispose && !model.is_disposed() {
            model.dispose()?;
        }
        Ok(removed)
    }

    /// Reconcile a collection with `inputs`.
    ///
    /// Existing models are kept (attribute inputs with a matching `id` are
    /// merged into them), new models are built from the collection's model
    /// class and owned by the collection's owner, and members missing from
    /// `inputs` are removed without being disposed. Returns the members in
    /// input order.
    pub fn set_models(&self, inputs: Vec<ModelInput>) -> Result<Vec<Node>> {
        let class = self.read(|d| d.collection_state("set").map(|s| s.class.model.clone()))??;
        let mut targets: Vec<Node> = Vec::with_capacity(inputs.len());

        for input in inputs {
            let model = match input {
                ModelInput::Node(model) => {
                    self.check_member(&model, "set")?;
                    model
                }
                ModelInput::Attributes(attributes) => {
                    let existing = match attributes.get(ID_ATTRIBUTE) {
                        Some(id) => self.get_by_id(id)?,
                        None => None,
                    };
                    match existing {
                        Some(model) => {
                            model.set_attributes(attributes, Default::default())?;
                            model
                        }
                        None => self.create_model(&class, attributes)?,
                    }
                }
            };
            if !targets.contains(&model) {
                targets.push(model);
            }
        }

        for stale in self.models()? {
            if !targets.contains(&stale) {
                self.remove_model(&stale, RemoveOptions::default())?;
            }
        }
        for model in &targets {
            self.add_model(model)?;
        }
        self.write(|d| {
            if let Ok(state) = d.collection_state_mut("set") {
                state.models = targets.iter().map(|m| m.id).collect();
            }
        })?;
        Ok(targets)
    }

    fn create_model(&self, class: &ModelClass, attributes: Map<String, Value>) -> Result<Node> {
        let owner = self.read(|d| d.owner)?.map(|id| self.handle(id));
        match owner {
            Some(owner) => owner.init_model(class, attributes, Map::new()),
            None => Err(ConfigurationError::Unwired {
                node: self.to_string(),
            }
            .into()),
        }
    }

    fn check_member(&self, model: &Node, operation: &'static str) -> Result<()> {
        if !self.same_tree(model) || model.kind()? != NodeKind::Model {
            return Err(ConfigurationError::unsupported(
                model.to_string(),
                model.kind().map(|k| k.as_str()).unwrap_or("node"),
                operation,
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Lateralus;
    use serde_json::json;

    fn attrs(value: Value) -> ModelInput {
        match value {
            Value::Object(map) => ModelInput::Attributes(map),
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_add_sets_back_reference() {
        let app = Lateralus::new().unwrap();
        let collection = app
            .init_collection(&CollectionClass::base(), Vec::new(), Map::new())
            .unwrap();
        let model = app.init_model(&ModelClass::base(), Map::new(), Map::new()).unwrap();

        collection.add_model(&model).unwrap();
        collection.add_model(&model).unwrap();
        assert_eq!(collection.len().unwrap(), 1);
        assert_eq!(model.collection().unwrap(), Some(collection.clone()));

        assert!(collection.remove_model(&model, RemoveOptions::default()).unwrap());
        assert!(collection.is_empty().unwrap());
        assert_eq!(model.collection().unwrap(), None);
        assert!(!model.is_disposed());
    }

    #[test]
    fn test_set_merges_by_id_and_removes_missing() {
        let app = Lateralus::new().unwrap();
        let collection = app
            .init_collection(
                &CollectionClass::base(),
                vec![attrs(json!({"id": 1, "v": "a"})), attrs(json!({"id": 2, "v": "b"}))],
                Map::new(),
            )
            .unwrap();
        let first = collection.get_by_id(&json!(1)).unwrap().unwrap();

        let result = collection
            .set_models(vec![attrs(json!({"id": 3})), attrs(json!({"id": 1, "v": "z"}))])
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[1], first);
        assert_eq!(first.get("v").unwrap(), Some(json!("z")));
        assert!(collection.get_by_id(&json!(2)).unwrap().is_none());
        assert_eq!(
            collection.to_json().unwrap(),
            json!([{"id": 3}, {"id": 1, "v": "z"}])
        );
    }

    #[test]
    fn test_collection_rejects_non_models() {
        let app = Lateralus::new().unwrap();
        let collection = app
            .init_collection(&CollectionClass::base(), Vec::new(), Map::new())
            .unwrap();
        let err = collection.add_model(&app).unwrap_err();
        assert!(err.is_configuration());
    }
}
