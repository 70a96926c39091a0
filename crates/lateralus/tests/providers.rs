//! Integration tests for the provide/collect protocol.

use lateralus::prelude::*;
use serde_json::{json, Value};

fn providing(name: &str, key: &str, value: Option<Value>) -> ComponentClass {
    ComponentClass::builder()
        .name(name)
        .provide(key, Handler::provider(move |_, _| Ok(value.clone())))
        .build()
        .unwrap()
}

#[test]
fn test_collect_returns_values_in_binding_order() {
    let app = Lateralus::builder()
        .provide("test", Handler::provider(|_, _| Ok(Some(json!(1)))))
        .build()
        .unwrap();
    app.add_component(&providing("child", "test", Some(json!(2))))
        .unwrap();

    assert_eq!(app.collect("test", vec![]).unwrap(), vec![json!(1), json!(2)]);
    assert_eq!(app.collect_one("test", vec![]).unwrap(), Some(json!(1)));
}

#[test]
fn test_collect_keeps_falsy_values_and_drops_missing_ones() {
    let app = Lateralus::new().unwrap();
    app.add_component(&providing("no", "flag", Some(json!(false))))
        .unwrap();
    app.add_component(&providing("zero", "flag", Some(json!(0))))
        .unwrap();
    app.add_component(&providing("absent", "flag", None)).unwrap();

    assert_eq!(app.collect("flag", vec![]).unwrap(), vec![json!(false), json!(0)]);
}

#[test]
fn test_collect_with_no_providers_is_empty() {
    let app = Lateralus::new().unwrap();
    assert!(app.collect("nothing", vec![]).unwrap().is_empty());
    assert_eq!(app.collect_one("nothing", vec![]).unwrap(), None);
}

#[test]
fn test_providers_receive_arguments() {
    let doubler = ComponentClass::builder()
        .name("doubler")
        .provide(
            "double",
            Handler::provider(|_, args| {
                let n = args.first().and_then(Value::as_i64).unwrap_or(0);
                Ok(Some(json!(n * 2)))
            }),
        )
        .build()
        .unwrap();

    let app = Lateralus::new().unwrap();
    let component = app.add_component(&doubler).unwrap();
    assert_eq!(app.collect("double", vec![json!(21)]).unwrap(), vec![json!(42)]);

    // A component asking bubbles to the root, so each provider answers once.
    assert_eq!(component.collect("double", vec![json!(2)]).unwrap(), vec![json!(4)]);
}

#[test]
fn test_named_provider_resolves_to_method() {
    let class = ComponentClass::builder()
        .name("settings")
        .method("getTheme", |node, _| node.property("theme"))
        .provide("theme", "getTheme")
        .build()
        .unwrap();

    let app = Lateralus::new().unwrap();
    let component = app.add_component(&class).unwrap();
    component.set_property("theme", json!("dark")).unwrap();
    assert_eq!(app.collect_one("theme", vec![]).unwrap(), Some(json!("dark")));
}

#[test]
fn test_disposed_provider_stops_answering() {
    let app = Lateralus::new().unwrap();
    let component = app
        .add_component(&providing("temporary", "value", Some(json!("here"))))
        .unwrap();
    assert_eq!(app.collect("value", vec![]).unwrap().len(), 1);

    component.dispose().unwrap();
    assert!(app.collect("value", vec![]).unwrap().is_empty());
}

#[test]
fn test_share_with_forwards_requests_between_applications() {
    let provider = Lateralus::builder()
        .provide("user", Handler::provider(|_, _| Ok(Some(json!("ada")))))
        .build()
        .unwrap();
    provider
        .add_component(&providing("extra", "user", Some(json!("grace"))))
        .unwrap();

    let receiver = Lateralus::builder()
        .provide("user", Handler::provider(|_, _| Ok(Some(json!("local")))))
        .build()
        .unwrap();
    provider.share_with(&receiver, "user").unwrap();

    assert_eq!(
        receiver.collect("user", vec![]).unwrap(),
        vec![json!("local"), json!("ada"), json!("grace")]
    );
    // Sharing is one-way.
    assert_eq!(
        provider.collect("user", vec![]).unwrap(),
        vec![json!("ada"), json!("grace")]
    );
}

#[test]
fn test_failing_provider_aborts_collect() {
    let app = Lateralus::new().unwrap();
    let failing = ComponentClass::builder()
        .name("failing")
        .provide(
            "value",
            Handler::provider(|_, _| Err(LateralusError::handler("value", "unavailable"))),
        )
        .build()
        .unwrap();
    app.add_component(&failing).unwrap();

    let err = app.collect("value", vec![]).unwrap_err();
    assert!(matches!(err, LateralusError::Handler { .. }));
}
