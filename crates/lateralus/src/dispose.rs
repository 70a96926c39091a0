//! Cascading disposal.
//!
//! `dispose()` announces `beforeDispose` on the node, tears down the node's
//! parts (children first), removes the node from its owner, drops every
//! listener it registered elsewhere and finally frees its storage. Children go
//! through the same sequence, so announcements run top-down while structural
//! removal runs bottom-up.
//!
//! Disposing a node twice is an error ([`DisposalError::AlreadyDisposed`]).
//! Cascades skip children that are already gone or already being torn down.

use lateralus_core::{
    logging::span_names, DisposalError, Event, EventHub, PerfSpan, Result, BEFORE_DISPOSE,
};

use crate::collection::RemoveOptions;
use crate::node::Node;
use crate::registry::{NodeDetail, NodeId, NodeKind, NodeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// Full disposal, announced with `beforeDispose`.
    Dispose,
    /// Silent removal of a node whose construction failed.
    Discard,
}

impl Node {
    /// Dispose this node and everything it owns.
    ///
    /// Fails with [`DisposalError::AlreadyDisposed`] if the node is gone or
    /// already being torn down, and with [`DisposalError::NotRegistered`] if
    /// its owner no longer lists it.
    #[tracing::instrument(skip(self), target = "lateralus::dispose", level = "trace", fields(node = %self))]
    pub fn dispose(&self) -> Result<()> {
        let _perf = PerfSpan::new(span_names::DISPOSE);
        check_registration(&self.shared.registry.read(), self.id)?;
        self.teardown(Teardown::Dispose);
        Ok(())
    }

    /// Remove a node whose construction failed.
    pub(crate) fn discard(&self) {
        self.teardown(Teardown::Discard);
    }

    fn teardown(&self, mode: Teardown) {
        let Some((kind, hub)) = self.begin_teardown() else {
            return;
        };

        if mode == Teardown::Dispose {
            if let Err(err) = hub.trigger(&Event::new(BEFORE_DISPOSE, Vec::new())) {
                tracing::warn!(target: "lateralus::dispose", node = %self, error = %err, "beforeDispose listener failed");
            }
        }

        self.teardown_parts(kind);
        self.detach_from_owner();

        let removed = self.shared.registry.write().remove(self.id);
        if let Some(data) = removed {
            let dropped = data.subscriptions.stop_listening();
            data.hub.off_all();
            tracing::trace!(
                target: "lateralus::dispose",
                node = %data.name,
                %kind,
                subscriptions = dropped,
                discarded = mode == Teardown::Discard,
                "node disposed"
            );
        }
    }

    /// Mark the node as disposing. `None` if it is gone or already marked.
    fn begin_teardown(&self) -> Option<(NodeKind, EventHub)> {
        let mut registry = self.shared.registry.write();
        let data = registry.get_mut(self.id).ok()?;
        if data.disposing {
            return None;
        }
        data.disposing = true;
        Some((data.kind(), data.hub.clone()))
    }

    fn teardown_parts(&self, kind: NodeKind) {
        match kind {
            NodeKind::Application => {
                let (components, model, owned) = self.parts(|d| match &d.detail {
                    NodeDetail::Application(app) => {
                        (app.tree.ids(), app.model.into_iter().collect::<Vec<_>>(), app.owned.clone())
                    }
                    _ => Default::default(),
                });
                self.cascade(&components);
                self.cascade(&model);
                self.cascade(&owned);
                let cancelled = self.shared.deferred.clear();
                if cancelled > 0 {
                    tracing::trace!(target: "lateralus::dispose", cancelled, "deferred tasks dropped");
                }
            }
            NodeKind::Component => {
                let (view, components, owned) = self.parts(|d| match &d.detail {
                    NodeDetail::Component(c) => {
                        (c.view.into_iter().collect::<Vec<_>>(), c.tree.ids(), c.owned.clone())
                    }
                    _ => Default::default(),
                });
                self.cascade(&view);
                self.cascade(&components);
                self.cascade(&owned);
            }
            NodeKind::View => {
                let subviews = self.parts(|d| match &d.detail {
                    NodeDetail::View(v) => v.subviews.clone(),
                    _ => Vec::new(),
                });
                self.cascade(&subviews);
                self.unlink_view();
            }
            NodeKind::Model => {
                if let Ok(Some(collection)) = self.collection() {
                    if let Err(err) = collection.remove_model(self, RemoveOptions::default()) {
                        tracing::warn!(target: "lateralus::dispose", model = %self, error = %err, "failed to leave collection");
                    }
                }
                self.shared.registry.write().release_model(self.id);
            }
            NodeKind::Collection => {
                let mut registry = self.shared.registry.write();
                let models = registry
                    .get(self.id)
                    .and_then(|d| d.collection_state("dispose").map(|s| s.models.clone()))
                    .unwrap_or_default();
                for model in models {
                    if let Ok(state) = registry.get_mut(model).and_then(|d| d.model_state_mut("dispose")) {
                        if state.collection == Some(self.id) {
                            state.collection = None;
                        }
                    }
                }
            }
        }
    }

    fn parts<R: Default>(&self, f: impl FnOnce(&crate::registry::NodeData) -> R) -> R {
        self.read(f).unwrap_or_default()
    }

    fn cascade(&self, ids: &[NodeId]) {
        for &id in ids {
            if self.shared.registry.read().is_live(id) {
                self.handle(id).teardown(Teardown::Dispose);
            }
        }
    }

    /// Unmount the view and unlink it from its parent view.
    fn unlink_view(&self) {
        let mut registry = self.shared.registry.write();
        let root = registry.root();
        let parent = registry
            .get(self.id)
            .ok()
            .and_then(|d| d.view_state("dispose").ok().and_then(|v| v.parent_view));
        if let Ok(app) = registry.get_mut(root).and_then(|d| d.app_mut("dispose")) {
            app.mounted.retain(|id| *id != self.id);
        }
        if let Some(parent) = parent {
            if let Ok(view) = registry.get_mut(parent).and_then(|d| d.view_state_mut("dispose")) {
                view.subviews.retain(|id| *id != self.id);
            }
        }
    }

    /// Remove the node from its owner's bookkeeping.
    fn detach_from_owner(&self) {
        let mut registry = self.shared.registry.write();
        let Ok(data) = registry.get(self.id) else {
            return;
        };
        let (owner, component) = (data.owner, data.component);
        let id = self.id;

        if let Some(owner) = owner.and_then(|owner| registry.get_mut(owner).ok()) {
            match &mut owner.detail {
                NodeDetail::Application(app) => {
                    app.tree.unregister(id);
                    app.owned.retain(|child| *child != id);
                    if app.model == Some(id) {
                        app.model = None;
                    }
                }
                NodeDetail::Component(c) => {
                    c.tree.unregister(id);
                    c.owned.retain(|child| *child != id);
                    if c.view == Some(id) {
                        c.view = None;
                    }
                }
                NodeDetail::View(v) => v.subviews.retain(|child| *child != id),
                NodeDetail::Model(_) | NodeDetail::Collection(_) => {}
            }
        }
        if let Some(Ok(c)) =
            component.map(|c| registry.get_mut(c).and_then(|d| d.component_state_mut("dispose")))
        {
            if c.model == Some(id) {
                c.model = None;
            }
        }
    }
}

/// Check that `id` can be disposed: it exists, is not being torn down, and is
/// still listed by a live owner.
fn check_registration(registry: &NodeRegistry, id: NodeId) -> Result<()> {
    let data = registry
        .get(id)
        .map_err(|_| DisposalError::AlreadyDisposed)?;
    if data.disposing {
        return Err(DisposalError::AlreadyDisposed.into());
    }
    let Some(owner) = data.owner.and_then(|owner| registry.get(owner).ok()) else {
        return Ok(());
    };
    if owner.disposing {
        return Ok(());
    }

    let registered = match (&data.detail, &owner.detail) {
        (NodeDetail::Component(_), _) => owner.tree().is_some_and(|t| t.contains(id)),
        (NodeDetail::View(_), NodeDetail::Component(c)) => c.view == Some(id),
        (NodeDetail::View(_), NodeDetail::View(v)) => v.subviews.contains(&id),
        (NodeDetail::Model(_) | NodeDetail::Collection(_), NodeDetail::Application(app)) => {
            app.owned.contains(&id) || app.model == Some(id)
        }
        (NodeDetail::Model(_) | NodeDetail::Collection(_), NodeDetail::Component(c)) => {
            c.owned.contains(&id)
        }
        _ => false,
    };
    if registered {
        Ok(())
    } else {
        Err(DisposalError::NotRegistered {
            node: data.name.clone(),
            owner: owner.name.clone(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Lateralus;
    use crate::component::ComponentClass;
    use crate::model::ModelClass;
    use crate::view::{ViewClass, ViewOptions};
    use lateralus_core::LateralusError;
    use parking_lot::Mutex;
    use serde_json::Map;
    use std::sync::Arc;

    fn widget() -> ComponentClass {
        ComponentClass::builder()
            .name("widget")
            .view(ViewClass::base())
            .model(ModelClass::base())
            .build()
            .unwrap()
    }

    #[test]
    fn test_announcements_top_down() {
        let app = Lateralus::new().unwrap();
        let parent = app.add_component(&widget()).unwrap();
        let child = parent.add_component(&widget()).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (label, node) in [
            ("parent", parent.clone()),
            ("parent-view", parent.view().unwrap().unwrap()),
            ("child", child.clone()),
            ("child-model", child.model().unwrap().unwrap()),
        ] {
            let l = log.clone();
            node.on(BEFORE_DISPOSE, move |_| {
                l.lock().push(label);
                Ok(())
            })
            .unwrap();
        }

        parent.dispose().unwrap();
        assert_eq!(*log.lock(), vec!["parent", "parent-view", "child", "child-model"]);
        assert!(parent.is_disposed());
        assert!(child.is_disposed());
        assert!(app.components().unwrap().is_empty());
        assert!(app.mounted_views().unwrap().is_empty());
    }

    #[test]
    fn test_double_dispose_is_an_error() {
        let app = Lateralus::new().unwrap();
        let component = app.add_component(&ComponentClass::base()).unwrap();
        component.dispose().unwrap();

        let err = component.dispose().unwrap_err();
        assert!(matches!(
            err,
            LateralusError::Disposal(DisposalError::AlreadyDisposed)
        ));
        assert!(matches!(component.name(), Err(LateralusError::Disposed)));
    }

    #[test]
    fn test_dispose_inside_before_dispose_is_rejected() {
        let app = Lateralus::new().unwrap();
        let component = app.add_component(&ComponentClass::base()).unwrap();
        let seen = Arc::new(Mutex::new(None));

        let s = seen.clone();
        let weak = component.downgrade();
        component
            .on(BEFORE_DISPOSE, move |_| {
                if let Some(node) = weak.upgrade() {
                    *s.lock() = Some(node.dispose().is_err());
                }
                Ok(())
            })
            .unwrap();

        component.dispose().unwrap();
        assert_eq!(*seen.lock(), Some(true));
    }

    #[test]
    fn test_disposing_view_unlinks_it() {
        let app = Lateralus::new().unwrap();
        let component = app.add_component(&widget()).unwrap();
        let view = component.view().unwrap().unwrap();
        let subview = view.add_subview(&ViewClass::base(), ViewOptions::new()).unwrap();

        subview.dispose().unwrap();
        assert!(view.subviews().unwrap().is_empty());

        view.dispose().unwrap();
        assert!(component.view().unwrap().is_none());
        assert!(app.mounted_views().unwrap().is_empty());
    }

    #[test]
    fn test_disposed_model_leaves_component() {
        let app = Lateralus::new().unwrap();
        let component = app.add_component(&widget()).unwrap();
        let model = component.model().unwrap().unwrap();

        model.dispose().unwrap();
        assert!(component.model().unwrap().is_none());
        assert!(!component.is_disposed());
    }

    #[test]
    fn test_failing_before_dispose_listener_does_not_abort() {
        let app = Lateralus::new().unwrap();
        let model = app
            .init_model(&ModelClass::base(), Map::new(), Map::new())
            .unwrap();
        model
            .on(BEFORE_DISPOSE, |_| {
                Err(LateralusError::handler(BEFORE_DISPOSE, "boom"))
            })
            .unwrap();

        model.dispose().unwrap();
        assert!(model.is_disposed());
    }
}
