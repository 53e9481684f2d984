use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use typeforge_core::{
    factory, mapping, Config, ConstructorFn, Extension, ExtensionOptions, FactoryError, Value,
};

type Calls = Arc<Mutex<Vec<(String, Value)>>>;

fn recorder() -> Calls {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn looped_extension_sees_each_entry() {
    let calls = recorder();
    let seen = Arc::clone(&calls);
    factory(
        Config::new()
            .extension(
                "customBlock",
                Extension::shared_surface(move |_, name, value| {
                    seen.lock().expect("lock").push((name.to_string(), value.clone()));
                    Ok(())
                }),
            )
            .block("customBlock", mapping([("test", "testValue")])),
    )
    .expect("class");

    assert_eq!(
        *calls.lock().expect("lock"),
        vec![("test".to_string(), Value::from("testValue"))]
    );
}

#[test]
fn whole_block_extension_sees_block_once() {
    let calls = recorder();
    let seen = Arc::clone(&calls);
    let block = Value::from(mapping([("test", "testValue")]));
    factory(
        Config::new()
            .extension(
                "customBlock",
                Extension::shared_surface_with(ExtensionOptions::whole_block(), move |_, name, value| {
                    seen.lock().expect("lock").push((name.to_string(), value.clone()));
                    Ok(())
                }),
            )
            .block("customBlock", block.clone()),
    )
    .expect("class");

    assert_eq!(
        *calls.lock().expect("lock"),
        vec![("customBlock".to_string(), block)]
    );
}

#[test]
fn whole_block_extension_accepts_scalar_blocks() {
    let calls = recorder();
    let seen = Arc::clone(&calls);
    factory(
        Config::new()
            .extension(
                "flag",
                Extension::shared_surface_with(ExtensionOptions::whole_block(), move |_, name, value| {
                    seen.lock().expect("lock").push((name.to_string(), value.clone()));
                    Ok(())
                }),
            )
            .block("flag", "X"),
    )
    .expect("class");

    assert_eq!(
        *calls.lock().expect("lock"),
        vec![("flag".to_string(), Value::from("X"))]
    );
}

#[test]
fn looped_extension_rejects_scalar_block() {
    let err = factory(
        Config::new()
            .extension("customBlock", Extension::shared_surface(|_, _, _| Ok(())))
            .block("customBlock", 5),
    )
    .expect_err("looping over a scalar");
    assert!(matches!(err, FactoryError::ConfigShape { .. }));
}

#[test]
fn shared_surface_skipped_without_block() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    factory(Config::new().extension(
        "customBlock",
        Extension::shared_surface(move |_, _, _| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }),
    ))
    .expect("class");
    assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn shared_surface_writes_reach_instances() {
    let class = factory(
        Config::new()
            .extension(
                "customBlock",
                Extension::shared_surface(|surface, name, value| {
                    surface.set(name, value.clone());
                    Ok(())
                }),
            )
            .block("customBlock", mapping([("test", "testValue")])),
    )
    .expect("class");

    assert_eq!(class.prototype().data("test"), Some(Value::from("testValue")));
    let instance = class.construct(&[]).expect("instance");
    assert_eq!(instance.get("test").expect("read"), Some(Value::from("testValue")));
}

#[test]
fn per_instance_skipped_without_block() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let class = factory(Config::new().extension(
        "test",
        Extension::per_instance(move |_, _, _| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }),
    ))
    .expect("class");
    class.construct(&[]).expect("instance");
    assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn per_instance_waits_for_construction_and_auto_fires() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let class = factory(
        Config::new()
            .extension(
                "customBlock",
                Extension::per_instance(move |_, _, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .block("customBlock", mapping([("test", "testValue")])),
    )
    .expect("class");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    class.construct(&[]).expect("first instance");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    class.construct(&[]).expect("second instance");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn custom_constructor_controls_per_instance_trigger() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let class = factory(
        Config::new()
            .constructor(ConstructorFn::new(|_| Ok(())))
            .extension(
                "customBlock",
                Extension::per_instance(move |_, _, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .block("customBlock", mapping([("test", "testValue")])),
    )
    .expect("class");

    let instance = class.construct(&[]).expect("instance");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    class.initialize(&instance).expect("manual trigger");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    class.initialize(&instance).expect("trigger again");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn custom_constructor_can_prepare_state_before_trigger() {
    let class = factory(
        Config::new()
            .constructor(ConstructorFn::new(|ctx| {
                ctx.this().set_field("testArgs", mapping::<&str, Value, _>([]));
                ctx.initialize()?;
                let args = ctx.this().field("testArgs").expect("testArgs set");
                assert_eq!(args, Value::from(mapping([("test", "testValue")])));
                Ok(())
            }))
            .extension(
                "customBlock",
                Extension::per_instance(|instance, name, value| {
                    instance.update("testArgs", |args| {
                        args.map_entry().insert(name.to_string(), value.clone());
                    });
                    Ok(())
                }),
            )
            .block("customBlock", mapping([("test", "testValue")])),
    )
    .expect("class");

    let instance = class.construct(&[]).expect("instance");
    assert!(instance.is_instance_of(&class));
    assert_eq!(
        instance.get("testArgs").expect("read"),
        Some(Value::from(mapping([("test", "testValue")])))
    );
}

#[test]
fn class_cache_skipped_without_block() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let class = factory(Config::new().extension(
        "customBlock",
        Extension::class_cache(move |_, _, value| {
            flag.store(true, Ordering::SeqCst);
            Ok(value.clone())
        }),
    ))
    .expect("class");
    assert!(!called.load(Ordering::SeqCst));
    assert!(!class.prototype().has_own("customBlock"));
}

#[test]
fn class_cache_memoizes_initializer_results() {
    let class = factory(
        Config::new()
            .extension(
                "customBlock",
                Extension::class_cache(|surface, name, value| {
                    assert!(surface.has_own("customBlock"), "cache exists before entries");
                    assert_eq!(name, "test");
                    Ok(value.clone())
                }),
            )
            .block("customBlock", mapping([("test", "testValue")])),
    )
    .expect("class");

    let expected = Value::from(mapping([("test", "testValue")]));
    assert_eq!(class.prototype().data("customBlock"), Some(expected.clone()));
    let instance = class.construct(&[]).expect("instance");
    assert_eq!(instance.get("customBlock").expect("read"), Some(expected));
}

#[test]
fn class_cache_without_initializer_stores_raw_values() {
    let class = factory(
        Config::new()
            .extension("rule", Extension::class_cache_raw(ExtensionOptions::default()))
            .block("rule", mapping([("a", "x")])),
    )
    .expect("class");
    let instance = class.construct(&[]).expect("instance");
    assert_eq!(
        instance.get("rule").expect("read"),
        Some(Value::from(mapping([("a", "x")])))
    );
}

#[test]
fn whole_block_cache_is_keyed_by_extension_name() {
    let class = factory(
        Config::new()
            .extension(
                "limits",
                Extension::class_cache_with(ExtensionOptions::whole_block(), |_, _, value| {
                    Ok(Value::Int(value.as_map().map_or(0, |m| m.len() as i64)))
                }),
            )
            .block("limits", mapping([("a", 1), ("b", 2)])),
    )
    .expect("class");
    assert_eq!(
        class.prototype().data("limits"),
        Some(Value::from(mapping([("limits", 2)])))
    );
}

#[test]
fn raw_descriptor_entries_are_wrapped() {
    let class = factory(
        Config::new()
            .extension("memo", mapping([("kind", "class_cache")]))
            .block("memo", mapping([("k", "v")])),
    )
    .expect("class");
    let blueprint = class.blueprint().expect("blueprint attached");
    let memo = blueprint.local_extensions().get("memo").expect("memo");
    assert!(!memo.is_inheritable(), "raw descriptors default to non-inheritable");
    assert_eq!(
        class.prototype().data("memo"),
        Some(Value::from(mapping([("k", "v")])))
    );
}

#[test]
fn initializer_errors_abort_assembly() {
    let err = factory(
        Config::new()
            .extension(
                "strict",
                Extension::shared_surface(|_, name, _| {
                    Err(FactoryError::callback(format!("rejected {name}")))
                }),
            )
            .block("strict", mapping([("bad", 1)])),
    )
    .expect_err("initializer failure propagates");
    assert_eq!(err, FactoryError::Callback("rejected bad".to_string()));
}
