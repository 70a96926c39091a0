//! Commonly used types.
//!
//! ```
//! use lateralus::prelude::*;
//! ```

pub use crate::{
    Capability, CollectionClass, ComponentClass, Declare, DestroyOptions, Emitter, Event,
    Handler, Lateralus, LateralusError, ModelClass, ModelInput, Node, NodeKind, RemoveOptions,
    Result, SetOptions, ViewClass, ViewOptions,
};
