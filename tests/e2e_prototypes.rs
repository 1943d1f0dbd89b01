//! End-to-end prototype tests: definition, registration, instantiation with
//! overrides, and instance lifecycle.

use metaprop::{MetaContext, Object, Property, PropertyMap, Prototype};
use pretty_assertions::assert_eq;

fn sensor_prototype() -> Prototype {
    Prototype::new("SimpleSensor")
        .with_property(
            Property::define("IntegralTest", 1337i32)
                .with_capacity(10)
                .with_default(100)
                .with_range(0, 100),
        )
        .with_property(Property::define("StringTest", String::from("I'm default")))
        .with_property(Property::define("Gain", 1.0f32).with_writable(false))
}

// ============================================================================
// 1. Definition and instantiation
// ============================================================================

#[test]
fn test_define_register_instantiate() {
    let ctx = MetaContext::new();
    let prototype = ctx.register_prototype(sensor_prototype());
    assert_eq!(ctx.prototype_count(), 1);

    let instance = ctx
        .create_instance("SimpleSensor", "sensorOne", PropertyMap::new())
        .unwrap();

    assert_eq!(instance.name(), "sensorOne");
    assert_eq!(instance.property_count(), 3);
    assert_eq!(instance.at::<String>("StringTest").value(), "I'm default");
    assert!(!instance.at::<f32>("Gain").is_writable());
    assert_eq!(prototype.instance_count(), 1);
    assert!(prototype.has_instance(instance.uid()));

    // Canonical range [0, 100] clamped the 1337 seed down at definition time.
    let integral = instance.at::<i32>("IntegralTest");
    assert_eq!(*integral.value(), 100);
    assert_eq!(integral.capacity(), 10);
}

#[test]
fn test_overrides_win_extraneous_keys_dropped() {
    let ctx = MetaContext::new();
    ctx.register_prototype(sensor_prototype());

    let mut overrides = PropertyMap::new();
    overrides.insert(
        "StringTest".into(),
        Property::define("StringTest", String::from("overridden")).into(),
    );
    overrides.insert(
        "NotInPrototype".into(),
        Property::define("NotInPrototype", 1u8).into(),
    );

    let instance = ctx.create_instance("SimpleSensor", "probe", overrides).unwrap();
    assert_eq!(instance.at::<String>("StringTest").value(), "overridden");
    assert_eq!(instance.property_count(), 3);
    assert!(!instance.has_property("NotInPrototype"));
}

#[test]
fn test_each_instance_gets_fresh_identity() {
    let ctx = MetaContext::new();
    ctx.register_prototype(sensor_prototype());

    let a = ctx.create_instance("SimpleSensor", "a", PropertyMap::new()).unwrap();
    let b = ctx.create_instance("SimpleSensor", "b", PropertyMap::new()).unwrap();

    assert_ne!(a.uid(), b.uid());
    assert_ne!(
        a.at::<i32>("IntegralTest").id(),
        b.at::<i32>("IntegralTest").id()
    );
    // Shared canonical definition, independent storage.
    assert_eq!(a.at::<i32>("IntegralTest").value(), b.at::<i32>("IntegralTest").value());
}

// ============================================================================
// 2. Range narrowing on a live instance
// ============================================================================

#[test]
fn test_range_narrowing_reclamps_live_values() {
    let ctx = MetaContext::new();
    ctx.register_prototype(sensor_prototype());

    let mut overrides = PropertyMap::new();
    overrides.insert(
        "IntegralTest".into(),
        Property::define("IntegralTest", 1000i32).with_capacity(10).into(),
    );
    let mut instance = ctx.create_instance("SimpleSensor", "wide", overrides).unwrap();

    let integral = instance.at_mut::<i32>("IntegralTest");
    integral.set_range(250, 1000);

    // Slot 0 carried the override and stays; the default-seeded slots sat at
    // 0 and get pulled up to the new minimum.
    assert_eq!(*integral.value_at(0), 1000);
    assert_eq!(*integral.value_at(1), 250);
    assert_eq!(*integral.value_at(9), 250);

    // Writes outside the narrowed range are silently discarded.
    assert!(!integral.set_value(1001, 0));
    assert_eq!(*integral.value_at(0), 1000);
}

// ============================================================================
// 3. Removal makes later typed access a programming error
// ============================================================================

#[test]
#[should_panic(expected = "property access")]
fn test_access_after_removal_panics() {
    let ctx = MetaContext::new();
    ctx.register_prototype(sensor_prototype());
    let mut instance = ctx.create_instance("SimpleSensor", "s", PropertyMap::new()).unwrap();

    instance.remove_property("StringTest").unwrap();
    let _ = instance.at::<String>("StringTest");
}

// ============================================================================
// 4. Registration is idempotent; instance table is append-only
// ============================================================================

#[test]
fn test_duplicate_registration_keeps_original() {
    let ctx = MetaContext::new();
    ctx.register_prototype(sensor_prototype());
    ctx.register_prototype(Prototype::new("SimpleSensor"));

    let instance = ctx.create_instance("SimpleSensor", "s", PropertyMap::new()).unwrap();
    assert_eq!(instance.property_count(), 3, "original definition survived");
}

#[test]
fn test_instance_table_is_never_purged() {
    let ctx = MetaContext::new();
    let prototype = ctx.register_prototype(sensor_prototype());

    let uid = {
        let instance = ctx.create_instance("SimpleSensor", "s", PropertyMap::new()).unwrap();
        instance.uid()
    };
    // The instance itself is gone; its registration is not.
    assert!(prototype.has_instance(uid));
    assert_eq!(prototype.instance_count(), 1);
}

// ============================================================================
// 5. Deep clone through a prototype
// ============================================================================

#[test]
fn test_deep_clone_reinstantiates() {
    let ctx = MetaContext::new();
    let prototype = ctx.register_prototype(sensor_prototype());
    let mut original = ctx.create_instance("SimpleSensor", "s", PropertyMap::new()).unwrap();
    original.at_mut::<String>("StringTest").set(String::from("mutated"));

    let copy = original.deep_clone(&ctx).unwrap();

    assert_ne!(copy.uid(), original.uid());
    assert_eq!(copy.at::<String>("StringTest").value(), "mutated");
    assert_ne!(
        copy.at::<String>("StringTest").id(),
        original.at::<String>("StringTest").id()
    );
    assert_eq!(prototype.instance_count(), 2);
}

#[test]
fn test_custom_creator_shapes_instances() {
    let ctx = MetaContext::new();
    ctx.register_prototype(
        Prototype::new("Tagged")
            .with_property(Property::define("tag", 0u16))
            .with_creator(|prototype, uid, name, properties| {
                let mut object = Object::assemble(prototype, uid, name, properties);
                object.at_mut::<u16>("tag").set(7);
                object
            }),
    );

    let instance = ctx.create_instance("Tagged", "t", PropertyMap::new()).unwrap();
    assert_eq!(*instance.at::<u16>("tag").value(), 7);
}
