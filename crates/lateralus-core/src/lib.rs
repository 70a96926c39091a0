//! Core primitives for Lateralus.
//!
//! This crate holds the pieces of the Lateralus component framework that do
//! not know about the component tree:
//!
//! - **Event hubs**: named-event listeners with synchronous dispatch
//! - **Subscriptions**: `listenTo`/`stopListening` bookkeeping
//! - **Collectors**: result accumulators for provider requests
//! - **Deferred tasks**: a FIFO queue drained by the application
//! - **Errors** and **logging** targets shared by the framework
//!
//! # Example
//!
//! ```
//! use lateralus_core::{Event, EventHub, Subscriptions};
//!
//! let source = EventHub::new();
//! let subscriber = Subscriptions::new();
//!
//! subscriber.listen_to(&source, "ping", |event| {
//!     println!("{} received", event.name());
//!     Ok(())
//! });
//!
//! source.trigger(&Event::new("ping", vec![])).unwrap();
//! assert_eq!(subscriber.stop_listening(), 1);
//! assert_eq!(source.listener_count(), 0);
//! ```

mod error;
pub mod hub;
pub mod logging;
pub mod task;

pub use error::{ConfigurationError, DisposalError, HubError, LateralusError, Result};
pub use hub::{
    Callback, Collector, Emitter, Event, EventHub, ListenerGuard, ListenerId, Subscriptions,
    WeakHub,
};
pub use logging::{PerfSpan, TreeFormatOptions, TreeStyle};
pub use task::{DeferredQueue, DeferredTask, SharedDeferredQueue, TaskId};

/// Prefix of the namespaced events that carry provider requests.
pub const PROVIDE_PREFIX: &str = "provide:";

/// The event triggered locally on a node before it is torn down.
pub const BEFORE_DISPOSE: &str = "beforeDispose";
