//! Event routing through the tree.
//!
//! - [`Node::emit`] bubbles an event from a node to its owning component and
//!   then to the application.
//! - [`Node::listen_for`] subscribes to the application's event stream.
//! - [`Node::amplify`] folds another emitter's event into the tree.
//! - [`Node::collect`] asks every bound provider for a value.
//!
//! Declarative maps are bound once, at the end of construction, by
//! `delegate_lateralus_events`. Until then [`Node::set_lateralus_event`] and
//! its siblings may adjust the node's own copy of the maps.

use std::sync::Arc;

use lateralus_core::{
    logging::span_names, Callback, Collector, ConfigurationError, Emitter, Event, ListenerId,
    PerfSpan, Result, PROVIDE_PREFIX,
};
use serde_json::Value;

use crate::class::{event_name, Handler, MapKind, Method, ResolvedMaps};
use crate::node::{Node, WeakNode};
use crate::registry::NodeKind;

impl Node {
    /// Trigger `event` here, on the owning component, then on the application.
    ///
    /// The application only triggers locally. The first handler error aborts
    /// the dispatch and is returned.
    pub fn emit(&self, event: impl Into<String>, args: Vec<Value>) -> Result<()> {
        self.dispatch(&Event::new(event, args))
    }

    /// [`Node::emit`] for a prebuilt event, preserving its collector.
    pub fn dispatch(&self, event: &Event) -> Result<()> {
        let (local, component, root) = {
            let registry = self.shared.registry.read();
            let data = registry.get(self.id)?;
            let local = data.hub.clone();
            if data.kind() == NodeKind::Application {
                (local, None, None)
            } else {
                let component = data
                    .component
                    .and_then(|id| registry.get(id).ok())
                    .map(|c| c.hub.clone());
                let root = registry.get(registry.root()).ok().map(|r| r.hub.clone());
                (local, component, root)
            }
        };

        tracing::trace!(target: "lateralus::events", node = %self, event = event.name(), "emit");
        local.trigger(event)?;
        if let Some(component) = component {
            component.trigger(event)?;
        }
        if let Some(root) = root {
            root.trigger(event)?;
        }
        Ok(())
    }

    /// Listen to the application's event stream.
    ///
    /// The application binds directly on itself; other nodes subscribe and
    /// are unsubscribed when disposed.
    pub fn listen_for<F>(&self, event: impl Into<String>, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.listen_for_callback(event, Arc::new(callback))
    }

    pub(crate) fn listen_for_callback(
        &self,
        event: impl Into<String>,
        callback: Callback,
    ) -> Result<ListenerId> {
        if self.is_application() {
            Ok(self.hub()?.on_callback(event, callback))
        } else {
            let root = self.lateralus();
            self.listen_to_callback(&root, event, callback)
        }
    }

    /// Re-emit `event` from `emitter` through this node's [`Node::emit`].
    pub fn amplify<E>(&self, emitter: &E, event: &str) -> Result<ListenerId>
    where
        E: Emitter + ?Sized,
    {
        let weak = self.downgrade();
        tracing::trace!(target: "lateralus::events", node = %self, event, "amplify");
        self.listen_to(emitter, event, move |event| match weak.upgrade() {
            Some(node) => node.dispatch(event),
            None => Ok(()),
        })
    }

    /// Ask every provider bound for `key`.
    ///
    /// Returns the provided values in binding order. Providers that return
    /// `None` are left out; falsy JSON values are kept.
    pub fn collect(&self, key: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let _perf = PerfSpan::new(span_names::COLLECT);
        tracing::trace!(target: "lateralus::events", node = %self, key, "collect");
        let collector = Collector::new();
        self.dispatch(&Event::with_collector(
            format!("{PROVIDE_PREFIX}{key}"),
            args,
            collector.clone(),
        ))?;
        Ok(collector.into_values())
    }

    /// The first value [`Node::collect`] would return.
    pub fn collect_one(&self, key: &str, args: Vec<Value>) -> Result<Option<Value>> {
        Ok(self.collect(key, args)?.into_iter().next())
    }

    /// Add or replace a `lateralusEvents` entry before the maps are bound.
    pub fn set_lateralus_event(&self, key: impl Into<String>, handler: impl Into<Handler>) -> Result<()> {
        self.edit_map(MapKind::LateralusEvents, key.into(), Some(handler.into()))
    }

    /// Add or replace a `modelEvents` entry before the maps are bound.
    pub fn set_model_event(&self, key: impl Into<String>, handler: impl Into<Handler>) -> Result<()> {
        self.edit_map(MapKind::ModelEvents, key.into(), Some(handler.into()))
    }

    /// Add or replace a provider before the maps are bound.
    pub fn set_provider(&self, key: impl Into<String>, handler: impl Into<Handler>) -> Result<()> {
        self.edit_map(MapKind::Provide, key.into(), Some(handler.into()))
    }

    /// Remove an entry before the maps are bound.
    pub fn remove_map_entry(&self, map: MapKind, key: impl Into<String>) -> Result<()> {
        self.edit_map(map, key.into(), None)
    }

    /// Whether the declarative maps have been bound.
    pub fn maps_bound(&self) -> Result<bool> {
        self.read(|d| d.maps.is_none())
    }

    fn edit_map(&self, map: MapKind, key: String, handler: Option<Handler>) -> Result<()> {
        let bound = self.write(|d| match d.maps.as_mut() {
            Some(maps) => {
                let target = maps.map_mut(map);
                match handler {
                    Some(handler) => {
                        target.insert(key, handler);
                    }
                    None => {
                        target.remove(&key);
                    }
                }
                false
            }
            None => true,
        })?;
        if bound {
            return Err(ConfigurationError::MapsAlreadyBound {
                node: self.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Bind the node's resolved event maps. Runs once per node.
    #[tracing::instrument(skip(self), target = "lateralus::delegate", level = "trace", fields(node = %self))]
    pub(crate) fn delegate_lateralus_events(&self) -> Result<()> {
        let maps = self.write(|d| d.maps.take())?;
        let Some(maps) = maps else {
            return Err(ConfigurationError::MapsAlreadyBound {
                node: self.to_string(),
            }
            .into());
        };

        // Resolve every named handler before binding anything.
        let bindings = self.resolve_bindings(&maps)?;

        for (event, method) in bindings.lateralus_events {
            self.listen_for_callback(event, self.event_callback(method))?;
        }
        for (event, method) in bindings.provide {
            self.listen_for_callback(format!("{PROVIDE_PREFIX}{event}"), self.provider_callback(method))?;
        }
        if !bindings.model_events.is_empty() {
            if let Some(model) = self.model()? {
                for (event, method) in bindings.model_events {
                    self.listen_to_callback(&model, event, self.event_callback(method))?;
                }
            }
        }

        tracing::trace!(
            target: "lateralus::delegate",
            node = %self,
            lateralus_events = maps.lateralus_events.len(),
            model_events = maps.model_events.len(),
            provide = maps.provide.len(),
            "event maps bound"
        );
        Ok(())
    }

    fn resolve_bindings(&self, maps: &ResolvedMaps) -> Result<Bindings> {
        let resolve = |map: &crate::class::EventMap| -> Result<Vec<(String, Method)>> {
            map.iter()
                .map(|(key, handler)| {
                    let method = self.resolve_handler(key, handler)?;
                    Ok((event_name(key).to_string(), method))
                })
                .collect()
        };
        Ok(Bindings {
            lateralus_events: resolve(&maps.lateralus_events)?,
            model_events: resolve(&maps.model_events)?,
            provide: resolve(&maps.provide)?,
        })
    }

    fn event_callback(&self, method: Method) -> Callback {
        let weak = self.downgrade();
        Arc::new(move |event: &Event| {
            let Some(node) = weak.upgrade() else {
                return Ok(());
            };
            method(&node, event.args()).map(|_| ())
        })
    }

    fn provider_callback(&self, method: Method) -> Callback {
        let weak: WeakNode = self.downgrade();
        Arc::new(move |event: &Event| {
            let Some(node) = weak.upgrade() else {
                return Ok(());
            };
            let value = method(&node, event.args())?;
            if let Some(collector) = event.collector() {
                collector.push(value);
            }
            Ok(())
        })
    }
}

struct Bindings {
    lateralus_events: Vec<(String, Method)>,
    model_events: Vec<(String, Method)>,
    provide: Vec<(String, Method)>,
}
