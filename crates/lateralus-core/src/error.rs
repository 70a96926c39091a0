//! Error types for Lateralus.
//!
//! Every error in this crate family is a programmer error raised synchronously
//! at the point of misuse. Nothing here is transient or retryable.

/// A specialized Result type for Lateralus operations.
pub type Result<T> = std::result::Result<T, LateralusError>;

/// The main error type for Lateralus operations.
#[derive(Debug, thiserror::Error)]
pub enum LateralusError {
    /// A class, event map, or call site is misconfigured.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A disposal invariant was violated.
    #[error("Disposal error: {0}")]
    Disposal(#[from] DisposalError),

    /// An event hub operation failed.
    #[error("Event hub error: {0}")]
    Hub(#[from] HubError),

    /// The node behind a handle has been disposed (or never existed).
    #[error("Node has been disposed")]
    Disposed,

    /// An error raised by application code inside a handler.
    #[error("Handler `{handler}` failed: {message}")]
    Handler {
        /// The event or provider key whose handler failed.
        handler: String,
        /// A description of the failure.
        message: String,
    },
}

impl LateralusError {
    /// Create an error for a failing application handler.
    pub fn handler(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a [`ConfigurationError`].
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether this error is a [`DisposalError`].
    pub fn is_disposal(&self) -> bool {
        matches!(self, Self::Disposal(_))
    }
}

/// Misuse of the component API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A component class was built without a name.
    #[error("`name` was not provided for this {kind} class")]
    MissingName {
        /// The kind of class being built.
        kind: &'static str,
    },

    /// A component class name is unusable as an instance-name prefix.
    #[error("Invalid {kind} class name `{name}`: names must not contain whitespace")]
    InvalidName {
        /// The kind of class being built.
        kind: &'static str,
        /// The offending name.
        name: String,
    },

    /// An event-map entry names a method that does not exist on the node.
    #[error("`{node}` has no method `{method}` (referenced by event map key `{key}`)")]
    UnknownMethod {
        /// Display name of the node whose map failed to bind.
        node: String,
        /// The event map key.
        key: String,
        /// The method name that failed to resolve.
        method: String,
    },

    /// `addComponent` (or a sibling call) was invoked on a node that belongs
    /// to neither the application nor a component.
    #[error("`{node}` is not wired to a component or to the application")]
    Unwired {
        /// Display name of the node.
        node: String,
    },

    /// The operation is not defined for this kind of node.
    #[error("`{operation}` is not supported by `{node}` ({kind})")]
    UnsupportedOperation {
        /// Display name of the node.
        node: String,
        /// The node kind.
        kind: &'static str,
        /// The rejected operation.
        operation: &'static str,
    },

    /// A model can belong to one collection at a time.
    #[error("`{model}` already belongs to `{collection}`")]
    ForeignMember {
        /// Display name of the model.
        model: String,
        /// Display name of the collection holding it.
        collection: String,
    },

    /// The node's declarative event maps were already bound.
    #[error("Event maps of `{node}` are already bound")]
    MapsAlreadyBound {
        /// Display name of the node.
        node: String,
    },
}

impl ConfigurationError {
    /// Create an unsupported-operation error.
    pub fn unsupported(
        node: impl Into<String>,
        kind: &'static str,
        operation: &'static str,
    ) -> Self {
        Self::UnsupportedOperation {
            node: node.into(),
            kind,
            operation,
        }
    }
}

/// Violations of the disposal invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisposalError {
    /// `dispose()` was called on a node that is disposed or being disposed.
    #[error("Node has already been disposed")]
    AlreadyDisposed,

    /// The node is missing from the owner map that should contain it.
    #[error("`{node}` is not registered with its owner `{owner}`")]
    NotRegistered {
        /// Display name of the node.
        node: String,
        /// Display name of the owner.
        owner: String,
    },
}

/// Event hub errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The hub behind a weak reference has been dropped.
    #[error("Event hub has been dropped")]
    Dropped,
}
