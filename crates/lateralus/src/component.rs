//! Component classes.
//!
//! A [`ComponentClass`] describes what [`Node::add_component`] builds: the
//! type name used for instance naming, an optional view and model class,
//! mixins, an `initialize` hook and the declarative event maps.
//!
//! ```
//! use lateralus::prelude::*;
//! use serde_json::json;
//!
//! let search = ComponentClass::builder()
//!     .name("search")
//!     .view(ViewClass::base())
//!     .model(ModelClass::base())
//!     .provide("query", Handler::provider(|node, _| {
//!         let model = node.model()?.expect("search has a model");
//!         model.get("query")
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let app = Lateralus::new().unwrap();
//! let component = app.add_component(&search).unwrap();
//! component.model().unwrap().unwrap().set("query", json!("rust")).unwrap();
//! assert_eq!(app.collect_one("query", vec![]).unwrap(), Some(json!("rust")));
//! ```

use std::fmt;
use std::sync::Arc;

use lateralus_core::{ConfigurationError, Result};
use serde_json::{Map, Value};

use crate::class::{Capability, Declarations, Declare};
use crate::model::ModelClass;
use crate::node::Node;
use crate::view::ViewClass;

/// `initialize(options)` hook of a component.
pub type InitializeFn = Arc<dyn Fn(&Node, &Map<String, Value>) -> Result<()> + Send + Sync>;

/// `toJSON()` override of a component.
pub type ToJsonFn = Arc<dyn Fn(&Node) -> Result<Value> + Send + Sync>;

/// Type name of [`ComponentClass::base`].
pub const BASE_COMPONENT_NAME: &str = "component";

/// A component type.
#[derive(Clone)]
pub struct ComponentClass {
    name: String,
    decls: Arc<Declarations>,
    view: Option<ViewClass>,
    model: Option<ModelClass>,
    mixins: Vec<Capability>,
    initialize: Option<InitializeFn>,
    to_json: Option<ToJsonFn>,
}

impl ComponentClass {
    /// Start building a component class.
    pub fn builder() -> ComponentClassBuilder {
        ComponentClassBuilder {
            name: None,
            decls: Declarations::new(),
            view: None,
            model: None,
            mixins: Vec::new(),
            initialize: None,
            to_json: None,
        }
    }

    /// The bare component class, named `"component"`.
    pub fn base() -> Self {
        Self {
            name: BASE_COMPONENT_NAME.to_string(),
            decls: Arc::new(Declarations::new()),
            view: None,
            model: None,
            mixins: Vec::new(),
            initialize: None,
            to_json: None,
        }
    }

    /// Start building a subclass.
    ///
    /// The subclass inherits the view and model classes, mixins, hooks and
    /// event maps. A name is still required.
    pub fn extend(&self) -> ComponentClassBuilder {
        ComponentClassBuilder {
            name: None,
            decls: Declarations::inherit(self.decls.clone()),
            view: self.view.clone(),
            model: self.model.clone(),
            mixins: self.mixins.clone(),
            initialize: self.initialize.clone(),
            to_json: self.to_json.clone(),
        }
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared view class.
    pub fn view(&self) -> Option<&ViewClass> {
        self.view.as_ref()
    }

    /// The declared model class.
    pub fn model(&self) -> Option<&ModelClass> {
        self.model.as_ref()
    }

    /// The mixins, in application order.
    pub fn mixins(&self) -> &[Capability] {
        &self.mixins
    }

    /// The declared event maps and methods.
    pub fn declarations(&self) -> &Arc<Declarations> {
        &self.decls
    }

    pub(crate) fn initialize_hook(&self) -> Option<&InitializeFn> {
        self.initialize.as_ref()
    }

    pub(crate) fn to_json_hook(&self) -> Option<&ToJsonFn> {
        self.to_json.as_ref()
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("view", &self.view.is_some())
            .field("model", &self.model.is_some())
            .field("mixins", &self.mixins.len())
            .finish()
    }
}

/// Builder for [`ComponentClass`].
pub struct ComponentClassBuilder {
    name: Option<String>,
    decls: Declarations,
    view: Option<ViewClass>,
    model: Option<ModelClass>,
    mixins: Vec<Capability>,
    initialize: Option<InitializeFn>,
    to_json: Option<ToJsonFn>,
}

impl ComponentClassBuilder {
    /// Set the type name (required).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare the view class.
    pub fn view(mut self, view: ViewClass) -> Self {
        self.view = Some(view);
        self
    }

    /// Declare the model class. Only used when a view class is declared.
    pub fn model(mut self, model: ModelClass) -> Self {
        self.model = Some(model);
        self
    }

    /// Append a mixin.
    pub fn mixin(mut self, capability: Capability) -> Self {
        self.mixins.push(capability);
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

    /// Override `toJSON()`.
    pub fn to_json<F>(mut self, f: F) -> Self
    where
        F: Fn(&Node) -> Result<Value> + Send + Sync + 'static,
    {
        self.to_json = Some(Arc::new(f));
        self
    }

    /// Validate and build the class.
    pub fn build(self) -> Result<ComponentClass> {
        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ConfigurationError::MissingName { kind: "component" }.into()),
        };
        if name.chars().any(char::is_whitespace) {
            return Err(ConfigurationError::InvalidName {
                kind: "component",
                name,
            }
            .into());
        }

        Ok(ComponentClass {
            name,
            decls: Arc::new(self.decls),
            view: self.view,
            model: self.model,
            mixins: self.mixins,
            initialize: self.initialize,
            to_json: self.to_json,
        })
    }
}

impl Declare for ComponentClassBuilder {
    fn declarations_mut(&mut self) -> &mut Declarations {
        &mut self.decls
    }
}
