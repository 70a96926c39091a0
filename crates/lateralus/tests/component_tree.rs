//! Integration tests for component construction, naming and event bubbling.

use lateralus::prelude::*;
use lateralus::{ConfigurationError, MapKind};
use parking_lot::Mutex;
use serde_json::{json, Map};
use std::sync::Arc;

fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("lateralus=trace")
        .with_test_writer()
        .try_init();
}

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &Log, entry: &str) -> Handler {
    let log = log.clone();
    let entry = entry.to_string();
    Handler::new(move |_, _| {
        log.lock().push(entry.clone());
        Ok(())
    })
}

fn widget(name: &str) -> ComponentClass {
    ComponentClass::builder()
        .name(name)
        .view(ViewClass::base())
        .model(ModelClass::base())
        .build()
        .unwrap()
}

#[test]
fn test_instance_names_are_per_owner_and_type() {
    setup();
    let app = Lateralus::new().unwrap();
    assert!(app.component_counters().unwrap().is_none());

    let search = ComponentClass::builder().name("search").build().unwrap();
    let results = ComponentClass::builder().name("results").build().unwrap();

    let first = app.add_component(&search).unwrap();
    app.add_component(&search).unwrap();
    app.add_component(&search).unwrap();
    app.add_component(&results).unwrap();

    let names: Vec<_> = app.components().unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(names, vec!["search0", "search1", "search2", "results0"]);
    let counters = app.component_counters().unwrap().unwrap();
    assert_eq!(counters["search"], 2);
    assert_eq!(counters["results"], 0);

    // Each component counts its own children.
    first.add_component(&search).unwrap();
    assert!(first.component_named("search0").unwrap().is_some());
    assert_eq!(first.component_counters().unwrap().unwrap()["search"], 0);
}

#[test]
fn test_hyphenated_names_are_accepted() {
    let class = ComponentClass::builder().name("extended-1").build().unwrap();
    let app = Lateralus::new().unwrap();
    let component = app.add_component(&class).unwrap();
    assert_eq!(component.instance_name().unwrap().as_deref(), Some("extended-10"));
    assert_eq!(component.to_string(), "extended-1");
}

#[test]
fn test_emit_bubbles_local_component_root() {
    setup();
    let app = Lateralus::new().unwrap();
    let component = app.add_component(&widget("widget")).unwrap();
    let view = component.view().unwrap().unwrap();
    let model = component.model().unwrap().unwrap();
    let log = log();

    for (label, node) in [
        ("view", view.clone()),
        ("model", model.clone()),
        ("component", component.clone()),
        ("root", app.node().clone()),
    ] {
        let l = log.clone();
        node.on("x", move |_| {
            l.lock().push(label.to_string());
            Ok(())
        })
        .unwrap();
    }

    view.emit("x", vec![]).unwrap();
    assert_eq!(*log.lock(), vec!["view", "component", "root"]);

    log.lock().clear();
    model.emit("x", vec![]).unwrap();
    assert_eq!(*log.lock(), vec!["model", "component", "root"]);

    log.lock().clear();
    app.emit("x", vec![]).unwrap();
    assert_eq!(*log.lock(), vec!["root"]);
}

#[test]
fn test_emit_passes_arguments() {
    let app = Lateralus::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    app.listen_for("search", move |event| {
        s.lock().extend(event.args().iter().cloned());
        Ok(())
    })
    .unwrap();

    let component = app.add_component(&widget("widget")).unwrap();
    component.emit("search", vec![json!("rust"), json!(2)]).unwrap();
    assert_eq!(*seen.lock(), vec![json!("rust"), json!(2)]);
}

#[test]
fn test_event_maps_merge_down_the_class_chain() {
    setup();
    let log = log();
    let base = ComponentClass::builder()
        .name("base")
        .lateralus_event("test", record(&log, "fnA"))
        .lateralus_event("shared", record(&log, "base-shared"))
        .build()
        .unwrap();
    let child = base
        .extend()
        .name("child")
        .lateralus_event("foo", record(&log, "fnB"))
        .build()
        .unwrap();
    let grandchild = child
        .extend()
        .name("grandchild")
        .lateralus_event("shared", record(&log, "grandchild-shared"))
        .build()
        .unwrap();

    let app = Lateralus::new().unwrap();
    app.add_component(&child).unwrap();
    app.emit("test", vec![]).unwrap();
    app.emit("foo", vec![]).unwrap();
    assert_eq!(*log.lock(), vec!["fnA", "fnB"]);

    log.lock().clear();
    dispose_components(&app);
    app.add_component(&grandchild).unwrap();
    app.emit("shared", vec![]).unwrap();
    app.emit("test", vec![]).unwrap();
    assert_eq!(*log.lock(), vec!["grandchild-shared", "fnA"]);

    // The base class still binds its own entry.
    log.lock().clear();
    dispose_components(&app);
    app.add_component(&base).unwrap();
    app.emit("shared", vec![]).unwrap();
    assert_eq!(*log.lock(), vec!["base-shared"]);
}

fn dispose_components(app: &Lateralus) {
    for (_, component) in app.components().unwrap() {
        component.dispose().unwrap();
    }
}

#[test]
fn test_named_handlers_resolve_to_methods() {
    let hits = Arc::new(Mutex::new(0));
    let h = hits.clone();
    let class = ComponentClass::builder()
        .name("counter")
        .method("onTick", move |_, _| {
            *h.lock() += 1;
            Ok(None)
        })
        .lateralus_event("tick ignored-suffix", "onTick")
        .build()
        .unwrap();

    let app = Lateralus::new().unwrap();
    let component = app.add_component(&class).unwrap();
    app.emit("tick", vec![]).unwrap();
    assert_eq!(*hits.lock(), 1);
    assert!(component.has_method("onTick").unwrap());
}

#[test]
fn test_unknown_method_is_a_configuration_error() {
    setup();
    let class = ComponentClass::builder()
        .name("broken")
        .view(ViewClass::base())
        .lateralus_event("ready", "missingHandler")
        .build()
        .unwrap();

    let app = Lateralus::new().unwrap();
    let before = app.node_count();
    let err = app.add_component(&class).unwrap_err();
    match err {
        LateralusError::Configuration(ConfigurationError::UnknownMethod { node, key, method }) => {
            assert_eq!(node, "broken");
            assert_eq!(key, "ready");
            assert_eq!(method, "missingHandler");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The half-built component and its view are gone.
    assert_eq!(app.node_count(), before);
    assert!(app.components().unwrap().is_empty());
    assert!(app.component_counters().unwrap().is_none());
    assert!(app.mounted_views().unwrap().is_empty());
}

#[test]
fn test_add_component_on_unwired_node_fails() {
    let app = Lateralus::new().unwrap();
    let model = app
        .init_model(&ModelClass::base(), Map::new(), Map::new())
        .unwrap();

    let err = model.add_component(&ComponentClass::base()).unwrap_err();
    assert!(matches!(
        err,
        LateralusError::Configuration(ConfigurationError::Unwired { .. })
    ));
}

#[test]
fn test_views_and_models_forward_add_component() {
    let app = Lateralus::new().unwrap();
    let parent = app.add_component(&widget("parent")).unwrap();
    let view = parent.view().unwrap().unwrap();

    let child = view.add_component(&ComponentClass::base()).unwrap();
    assert_eq!(child.parent_component().unwrap(), Some(parent.clone()));
    assert_eq!(parent.components().unwrap().len(), 1);
    assert!(app.component_named("component0").unwrap().is_none());
}

#[test]
fn test_initialize_may_adjust_event_maps() {
    let log = log();
    let l = log.clone();
    let class = ComponentClass::builder()
        .name("adjusting")
        .lateralus_event("dropped", record(&log, "dropped"))
        .initialize(move |node, options| {
            let label = options
                .get("label")
                .and_then(|v| v.as_str())
                .unwrap_or("late")
                .to_string();
            node.set_lateralus_event("late", record(&l, &label))?;
            node.remove_map_entry(MapKind::LateralusEvents, "dropped")?;
            Ok(())
        })
        .build()
        .unwrap();

    let app = Lateralus::new().unwrap();
    let mut options = Map::new();
    options.insert("label".into(), json!("from-options"));
    let component = app
        .add_component_with(&class, ViewOptions::new(), options)
        .unwrap();

    app.emit("late", vec![]).unwrap();
    app.emit("dropped", vec![]).unwrap();
    assert_eq!(*log.lock(), vec!["from-options"]);
    assert_eq!(component.property("label").unwrap(), Some(json!("from-options")));

    let err = component
        .set_lateralus_event("again", Handler::new(|_, _| Ok(())))
        .unwrap_err();
    assert!(matches!(
        err,
        LateralusError::Configuration(ConfigurationError::MapsAlreadyBound { .. })
    ));
}

#[test]
fn test_capabilities_are_applied_before_initialize() {
    let clickable = Capability::new("clickable")
        .property("clicks", json!(0))
        .method("click", |node, _| {
            let clicks = node.property("clicks")?.and_then(|v| v.as_i64()).unwrap_or(0);
            node.set_property("clicks", json!(clicks + 1))?;
            Ok(None)
        })
        .on_apply(|node| node.set_property("clickable", json!(true)));

    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    let class = ComponentClass::builder()
        .name("button")
        .mixin(clickable)
        .lateralus_event("press", "click")
        .initialize(move |node, _| {
            *s.lock() = node.property("clickable")?;
            Ok(())
        })
        .build()
        .unwrap();

    let app = Lateralus::new().unwrap();
    let button = app.add_component(&class).unwrap();
    app.emit("press", vec![]).unwrap();
    app.emit("press", vec![]).unwrap();

    assert_eq!(*seen.lock(), Some(json!(true)));
    assert_eq!(button.property("clicks").unwrap(), Some(json!(2)));
}

#[test]
fn test_model_events_bind_to_the_components_model() {
    let log = log();
    let class = ComponentClass::builder()
        .name("editor")
        .view(ViewClass::base())
        .model(ModelClass::base())
        .model_event("change:title", record(&log, "title"))
        .build()
        .unwrap();

    let app = Lateralus::new().unwrap();
    let component = app.add_component(&class).unwrap();
    component
        .model()
        .unwrap()
        .unwrap()
        .set("title", json!("Draft"))
        .unwrap();
    assert_eq!(*log.lock(), vec!["title"]);
}

#[test]
fn test_component_to_json_defaults_to_empty_object() {
    let app = Lateralus::new().unwrap();
    let plain = app.add_component(&ComponentClass::base()).unwrap();
    assert_eq!(plain.to_json().unwrap(), json!({}));

    let custom = ComponentClass::builder()
        .name("custom")
        .to_json(|node| Ok(json!({ "name": node.name()? })))
        .build()
        .unwrap();
    let custom = app.add_component(&custom).unwrap();
    assert_eq!(custom.to_json().unwrap(), json!({ "name": "custom" }));
}

#[test]
fn test_after_render_runs_on_deferred_queue() {
    let log = log();
    let l = log.clone();
    let class = ComponentClass::builder()
        .name("chart")
        .view(
            ViewClass::builder()
                .default_option("height", json!(100))
                .after_render(move |view| {
                    l.lock().push(view.to_string());
                    Ok(())
                })
                .build(),
        )
        .build()
        .unwrap();

    let app = Lateralus::new().unwrap();
    let first = app.add_component(&class).unwrap();
    let second = app.add_component(&class).unwrap();
    assert!(log.lock().is_empty());
    assert_eq!(app.pending_deferred(), 2);

    let view = first.view().unwrap().unwrap();
    assert_eq!(view.property("height").unwrap(), Some(json!(100)));

    // A view disposed before its hook runs is skipped.
    second.dispose().unwrap();
    assert_eq!(app.run_deferred().unwrap(), 2);
    assert_eq!(*log.lock(), vec!["chart-view"]);
}
