use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use typeforge_core::{
    factory, find_class, mapping, Config, ConstructorFn, Extension, ExtensionOptions, FactoryResult, Instance,
    Method, Surface, Value,
};

fn record(field: &'static str) -> impl Fn(&Instance, &str, &Value) -> FactoryResult<()> + Send + Sync {
    move |instance, name, value| {
        instance.update(field, |slot| {
            slot.map_entry().insert(name.to_string(), value.clone());
        });
        Ok(())
    }
}

#[test]
fn extend_records_super_class() {
    let parent = factory(Config::new()).expect("parent");
    let child = parent.extend(Config::new()).expect("child");
    assert!(child.super_class().expect("super").ptr_eq(&parent));
    assert_eq!(child.lineage().len(), 2);
}

#[test]
fn default_constructors_give_transitive_ancestry() {
    let a = factory(Config::new()).expect("a");
    let b = a.extend(Config::new()).expect("b");
    let c = b.extend(Config::new()).expect("c");

    let from_b = b.construct(&[]).expect("b instance");
    assert!(from_b.is_instance_of(&b));
    assert!(from_b.is_instance_of(&a));
    assert!(!from_b.is_instance_of(&c));

    let from_c = c.construct(&[]).expect("c instance");
    assert!(from_c.is_instance_of(&a));
    assert!(from_c.is_instance_of(&b));
    assert!(from_c.class().ptr_eq(&c));
}

#[test]
fn custom_child_constructor_is_returned() {
    let parent = factory(Config::new()).expect("parent");
    let body = ConstructorFn::new(|_| Ok(()));
    let child = parent
        .extend(Config::new().constructor(body.clone()))
        .expect("child");
    assert!(child.constructor().ptr_eq(&body));
    let instance = child.construct(&[]).expect("instance");
    assert!(instance.is_instance_of(&parent));
}

#[test]
fn default_constructor_forwards_to_super() {
    let super_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&super_called);
    let parent = factory(Config::new().constructor(ConstructorFn::new(move |ctx| {
        flag.store(true, Ordering::SeqCst);
        ctx.this().set_field("arg", ctx.args().first().cloned().unwrap_or_default());
        Ok(())
    })))
    .expect("parent");
    let child = parent.extend(Config::new()).expect("child");

    let instance = child.construct(&[Value::Int(9)]).expect("instance");
    assert!(super_called.load(Ordering::SeqCst));
    assert_eq!(instance.field("arg"), Some(Value::Int(9)));
}

#[test]
fn custom_constructor_calls_super_explicitly() {
    let super_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&super_called);
    let parent = factory(Config::new().constructor(ConstructorFn::new(move |_| {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    })))
    .expect("parent");
    let child = parent
        .extend(Config::new().constructor(ConstructorFn::new(|ctx| ctx.call_super(&[]))))
        .expect("child");

    child.construct(&[]).expect("instance");
    assert!(super_called.load(Ordering::SeqCst));
}

#[test]
fn reserved_blocks_reach_subclasses() {
    let method = Method::new(|_, _| Ok(Value::from("mixed")));
    let mixin = factory(Config::new().member("mixed", method.clone())).expect("mixin");
    let parent = factory(
        Config::new()
            .include(mixin)
            .member("proto", "value")
            .getter("computed", Method::new(|_, _| Ok(Value::Int(1))))
            .static_member("test", "static"),
    )
    .expect("parent");
    let child = parent.extend(Config::new()).expect("child");
    let instance = child.construct(&[]).expect("instance");

    assert_eq!(child.prototype().data("mixed"), Some(Value::Method(method)));
    assert_eq!(instance.get("proto").expect("read"), Some(Value::from("value")));
    assert_eq!(instance.get("computed").expect("read"), Some(Value::Int(1)));
    assert_eq!(child.get_static("test"), Some(Value::from("static")));
}

#[test]
fn statics_are_copied_by_value_at_build_time() {
    let parent = factory(
        Config::new()
            .static_member("shared", "parent")
            .static_member("kept", 1),
    )
    .expect("parent");
    let child = parent
        .extend(Config::new().static_member("shared", "child").static_member("own", 2))
        .expect("child");

    assert_eq!(child.get_static("shared"), Some(Value::from("child")));
    assert_eq!(child.get_static("kept"), Some(Value::Int(1)));
    assert_eq!(child.get_static("own"), Some(Value::Int(2)));
    assert_eq!(parent.get_static("own"), None);

    parent.set_static("kept", 100);
    assert_eq!(child.get_static("kept"), Some(Value::Int(1)));
}

#[test]
fn statics_accumulate_across_three_levels() {
    let a = factory(Config::new().static_member("from_a", "a")).expect("a");
    let b = a.extend(Config::new().static_member("from_b", "b")).expect("b");
    let c = b.extend(Config::new()).expect("c");

    assert_eq!(c.get_static("from_a"), Some(Value::from("a")));
    assert_eq!(c.get_static("from_b"), Some(Value::from("b")));
}

#[test]
fn shared_surface_extensions_apply_per_level() {
    let write_member = |surface: &Surface, name: &str, value: &Value| -> FactoryResult<()> {
        surface.set(name, value.clone());
        Ok(())
    };
    let second_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&second_called);

    let base = factory(
        Config::new()
            .extension("customBlock", Extension::shared_surface(write_member))
            .block(
                "customBlock",
                mapping([("test", "testValue"), ("test4", "")]),
            ),
    )
    .expect("base");
    let sub = base
        .extend(
            Config::new()
                .extension(
                    "customBlock2",
                    Extension::shared_surface(move |surface, name, value| {
                        flag.store(true, Ordering::SeqCst);
                        assert_eq!(name, "test2");
                        surface.set(name, value.clone());
                        Ok(())
                    }),
                )
                .block(
                    "customBlock",
                    mapping([("test3", "testValue3"), ("test4", "testValue4")]),
                )
                .block("customBlock2", mapping([("test2", "testValue2")])),
        )
        .expect("sub");

    assert!(second_called.load(Ordering::SeqCst));
    let instance = sub.construct(&[]).expect("instance");
    assert_eq!(instance.get("test").expect("read"), Some(Value::from("testValue")));
    assert_eq!(instance.get("test2").expect("read"), Some(Value::from("testValue2")));
    assert_eq!(instance.get("test3").expect("read"), Some(Value::from("testValue3")));
    assert_eq!(instance.get("test4").expect("read"), Some(Value::from("testValue4")));
    assert_eq!(base.prototype().data("test4"), Some(Value::from("")));
}

#[test]
fn per_instance_extensions_fire_per_level_with_descendant_data() {
    let base = factory(
        Config::new()
            .constructor(ConstructorFn::new(|ctx| {
                ctx.this().set_field("testArgs", mapping::<&str, Value, _>([]));
                ctx.initialize()
            }))
            .extension("customBlock", Extension::per_instance(record("testArgs")))
            .block("customBlock", mapping([("test", "testValue")])),
    )
    .expect("base");
    let sub = base
        .extend(
            Config::new()
                .constructor(ConstructorFn::new(|ctx| {
                    ctx.call_super(ctx.args())?;
                    let args = ctx.this().field("testArgs").expect("base ran");
                    assert_eq!(
                        args,
                        Value::from(mapping([("test", "testValue"), ("test2", "testValue2")]))
                    );
                    ctx.this().set_field("testArgs2", mapping::<&str, Value, _>([]));
                    ctx.initialize()
                }))
                .extension("customBlock2", Extension::per_instance(record("testArgs2")))
                .block("customBlock", mapping([("test2", "testValue2")]))
                .block("customBlock2", mapping([("test3", "testValue3")])),
        )
        .expect("sub");

    let instance = sub.construct(&[]).expect("instance");
    assert!(instance.is_instance_of(&base));
    assert_eq!(
        instance.field("testArgs2"),
        Some(Value::from(mapping([("test3", "testValue3")])))
    );

    let plain = base.construct(&[]).expect("base instance");
    assert_eq!(
        plain.field("testArgs"),
        Some(Value::from(mapping([("test", "testValue")])))
    );
    assert_eq!(plain.field("testArgs2"), None);
}

#[test]
fn per_instance_block_skipped_when_descendant_never_triggers_it() {
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    let base = factory(
        Config::new()
            .extension(
                "customBlock",
                Extension::per_instance(move |_, _, _| {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .block("customBlock", mapping([("k", 1)])),
    )
    .expect("base");
    let sub = base
        .extend(Config::new().constructor(ConstructorFn::new(|_| Ok(()))))
        .expect("sub");

    sub.construct(&[]).expect("instance");
    assert!(!fired.load(Ordering::SeqCst));
}

#[test]
fn class_cache_accumulates_down_the_hierarchy() {
    let upper = |_: &Surface, _: &str, value: &Value| -> FactoryResult<Value> {
        Ok(Value::from(value.as_str().unwrap_or_default().to_uppercase()))
    };
    let parent = factory(
        Config::new()
            .extension("rule", Extension::class_cache(upper))
            .block("rule", mapping([("a", "x")])),
    )
    .expect("parent");
    let child = parent
        .extend(Config::new().block("rule", mapping([("b", "y")])))
        .expect("child");

    assert_eq!(
        parent.prototype().data("rule"),
        Some(Value::from(mapping([("a", "X")])))
    );
    assert_eq!(
        child.prototype().data("rule"),
        Some(Value::from(mapping([("a", "X"), ("b", "Y")])))
    );

    child
        .prototype()
        .with_own_map("rule", |cache| {
            cache.insert("c".to_string(), Value::from("Z"));
        })
        .expect("child cache is a mapping");
    assert_eq!(
        parent.prototype().data("rule"),
        Some(Value::from(mapping([("a", "X")])))
    );
}

#[test]
fn class_cache_extensions_from_two_levels() {
    let base = factory(
        Config::new()
            .extension(
                "customBlock",
                Extension::class_cache(|surface, _, value| {
                    assert!(surface.has("customBlock"));
                    Ok(value.clone())
                }),
            )
            .block("customBlock", mapping([("test", "testValue"), ("test4", "")])),
    )
    .expect("base");
    let sub = base
        .extend(
            Config::new()
                .extension(
                    "customBlock2",
                    Extension::class_cache_raw(ExtensionOptions::default()),
                )
                .block(
                    "customBlock",
                    mapping([("test3", "testValue3"), ("test4", "testValue4")]),
                )
                .block("customBlock2", mapping([("test2", "testValue2")])),
        )
        .expect("sub");

    let instance = sub.construct(&[]).expect("instance");
    let cache = instance
        .get("customBlock")
        .expect("read")
        .expect("cache present");
    let cache = cache.as_map().expect("mapping");
    assert_eq!(cache.get("test"), Some(&Value::from("testValue")));
    assert_eq!(cache.get("test3"), Some(&Value::from("testValue3")));
    assert_eq!(cache.get("test4"), Some(&Value::from("testValue4")));
    assert_eq!(
        instance.get("customBlock2").expect("read"),
        Some(Value::from(mapping([("test2", "testValue2")])))
    );
}

#[test]
fn child_descriptor_overrides_parent_descriptor() {
    let parent = factory(
        Config::new()
            .extension("rule", Extension::class_cache(|_, _, _| Ok(Value::from("parent"))))
            .block("rule", mapping([("a", 1)])),
    )
    .expect("parent");
    let child = parent
        .extend(
            Config::new()
                .extension("rule", Extension::class_cache(|_, _, _| Ok(Value::from("child")))),
        )
        .expect("child");

    assert_eq!(
        child.prototype().data("rule"),
        Some(Value::from(mapping([("a", "child")])))
    );
}

#[test]
fn lineage_and_summary_reflect_depth() {
    let a = factory(Config::new()).expect("a");
    let b = a.extend(Config::new()).expect("b");
    let c = b.extend(Config::new()).expect("c");

    let summary = c.summary();
    assert_eq!(summary.depth, 2);
    assert_eq!(summary.super_id, Some(b.id()));
    assert!(find_class(c.id()).is_some());
}

#[test]
fn default_constructor_chain_fires_ancestor_extension_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let a = factory(
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
    .expect("a");
    let b = a.extend(Config::new()).expect("b");
    let c = b.extend(Config::new()).expect("c");

    c.construct(&[]).expect("c instance");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    b.construct(&[]).expect("b instance");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn child_of_cache_level_gets_its_own_empty_cache() {
    let parent = factory(
        Config::new().extension("rule", Extension::class_cache_raw(ExtensionOptions::default())),
    )
    .expect("parent");
    assert!(!parent.prototype().has_own("rule"));

    let child = parent.extend(Config::new()).expect("child");
    let blueprint = child.blueprint().expect("blueprint attached");
    assert_eq!(
        blueprint.get("rule"),
        Some(&Value::from(mapping::<&str, Value, _>([])))
    );
    assert!(child.prototype().has_own("rule"));
    assert_eq!(
        child.prototype().data("rule"),
        Some(Value::from(mapping::<&str, Value, _>([])))
    );
}

#[test]
fn whole_block_instance_extension_sees_empty_block_at_child_level() {
    let calls: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);
    let parent = factory(Config::new().extension(
        "ext",
        Extension::per_instance_with(ExtensionOptions::whole_block(), move |_, name, value| {
            seen.lock().expect("lock").push((name.to_string(), value.clone()));
            Ok(())
        }),
    ))
    .expect("parent");
    parent.construct(&[]).expect("parent instance");
    assert!(calls.lock().expect("lock").is_empty());

    let child = parent.extend(Config::new()).expect("child");
    child.construct(&[]).expect("child instance");
    assert_eq!(
        *calls.lock().expect("lock"),
        vec![("ext".to_string(), Value::from(mapping::<&str, Value, _>([])))]
    );
}

#[test]
fn per_instance_initializer_can_read_the_instance_it_updates() {
    let class = factory(
        Config::new()
            .member("base", 10)
            .extension(
                "counter",
                Extension::per_instance(|instance, name, value| {
                    instance.update(name, |slot| {
                        let base = instance
                            .get("base")
                            .expect("read")
                            .and_then(|v| v.as_int())
                            .unwrap_or(0);
                        *slot = Value::Int(base + value.as_int().unwrap_or(0));
                    });
                    Ok(())
                }),
            )
            .block("counter", mapping([("total", 5)])),
    )
    .expect("class");

    let instance = class.construct(&[]).expect("instance");
    assert_eq!(instance.field("total"), Some(Value::Int(15)));
}
