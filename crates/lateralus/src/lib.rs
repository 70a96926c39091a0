//! Lateralus: a component-composition framework.
//!
//! An application ([`Lateralus`]) is the root of a tree of components. Each
//! component may own a view, a model, collections and child components. The
//! tree provides:
//!
//! - **Bubbling**: [`Node::emit`] fires an event on the node, its owning
//!   component and the application, in that order
//! - **Declarative event maps**: `lateralusEvents`, `modelEvents` and
//!   `provide` entries declared on classes and merged down the class chain
//! - **Providers**: [`Node::collect`] gathers values from every bound provider
//! - **Cascading disposal**: [`Node::dispose`] tears down a subtree and every
//!   listener it registered
//!
//! # Example
//!
//! ```
//! use lateralus::prelude::*;
//! use parking_lot::Mutex;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let heard = Arc::new(Mutex::new(Vec::new()));
//! let h = heard.clone();
//! let app = Lateralus::builder()
//!     .lateralus_event("search", Handler::new(move |_, args| {
//!         h.lock().push(args[0].clone());
//!         Ok(())
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let search = ComponentClass::builder()
//!     .name("search")
//!     .view(ViewClass::base())
//!     .build()
//!     .unwrap();
//! let component = app.add_component(&search).unwrap();
//! assert_eq!(component.instance_name().unwrap().as_deref(), Some("search0"));
//!
//! let view = component.view().unwrap().unwrap();
//! view.emit("search", vec![json!("rust")]).unwrap();
//! assert_eq!(*heard.lock(), vec![json!("rust")]);
//!
//! app.spiral_out().unwrap();
//! assert!(component.is_disposed());
//! ```

mod application;
mod class;
mod collection;
mod component;
mod debug;
mod delegation;
mod dispose;
mod model;
mod node;
pub mod prelude;
mod registry;
mod tree;
mod view;

pub use application::{AppInitializeFn, Lateralus, LateralusBuilder, LateralusConfig};
pub use class::{
    event_name, ApplyHook, Capability, Declarations, Declare, EventMap, Handler, MapKind, Method,
    ResolvedMaps,
};
pub use collection::{
    CollectionClass, CollectionClassBuilder, CollectionInitializeFn, ModelInput, RemoveOptions,
    ID_ATTRIBUTE,
};
pub use component::{
    ComponentClass, ComponentClassBuilder, InitializeFn, ToJsonFn, BASE_COMPONENT_NAME,
};
pub use debug::{ComponentTreeDebug, TreeSnapshot};
pub use model::{DestroyOptions, ModelClass, ModelClassBuilder, ModelInitializeFn, SetOptions};
pub use node::{Node, WeakNode};
pub use registry::{NodeId, NodeKind, ROOT_NAME};
pub use tree::{MODEL_ATTRIBUTES, MODEL_OPTIONS};
pub use view::{AfterRenderFn, ViewClass, ViewClassBuilder, ViewInitializeFn, ViewOptions};

pub use lateralus_core::{
    logging, BEFORE_DISPOSE, Collector, ConfigurationError, DisposalError, Emitter, Event,
    EventHub, HubError, LateralusError, ListenerGuard, ListenerId, PROVIDE_PREFIX, Result,
    Subscriptions, TaskId, TreeFormatOptions, TreeStyle,
};
