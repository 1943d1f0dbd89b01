//! End-to-end serialization tests over the full kind set.
//!
//! Each test exercises: build tree -> serialize -> deserialize -> compare,
//! through both the text and the binary encoding.

use metaprop::serialize::{deserialize_dynamic, deserialize_object, serialize_object};
use metaprop::{
    Error, MetaContext, Object, ObjectId, ObjectRef, Property, PropertyMap, Prototype,
    WideString,
};
use pretty_assertions::assert_eq;

/// One object carrying every leaf kind plus a nested object, with the
/// values the external format has to preserve exactly.
fn build_full_object(ctx: &MetaContext) -> Object {
    let mut inner = Object::new(ctx, "innerTestObject").unwrap();
    inner.add_property(ctx, "int8Property", 23i8).unwrap();

    let mut object = Object::new(ctx, "SerializationTest").unwrap();
    object.add_property(ctx, "int8Property", 23i8).unwrap();
    object.add_property(ctx, "int16Property", -4232i16).unwrap();
    object.add_property(ctx, "int32Property", 2_323_333i32).unwrap();
    object.add_property(ctx, "int64Property", -23_554_545_342i64).unwrap();
    object
        .add_property(ctx, "uint8Property", 45u8)
        .unwrap()
        .set_capacity(2);
    object.at_mut::<u8>("uint8Property").set_value(123, 1);
    object.add_property(ctx, "uint16Property", 0u16).unwrap();
    object.add_property(ctx, "uint32Property", 12_351_611u32).unwrap();
    object.add_property(ctx, "uint64Property", 6_646_777_643_353u64).unwrap();
    object.add_property(ctx, "floatProperty", 9.999_999_9f32).unwrap();
    object
        .add_property(ctx, "doubleProperty", std::f64::consts::FRAC_PI_2)
        .unwrap();
    object
        .add_property(ctx, "stringProperty", String::from("Tralala"))
        .unwrap();
    object
        .add_property(ctx, "wstringProperty", WideString::from("This is ridiculous"))
        .unwrap();
    object
        .add_property(ctx, "objectProperty", Some(Box::new(inner)))
        .unwrap();
    object
}

// ============================================================================
// 1. Text round trip preserves every kind
// ============================================================================

#[test]
fn test_text_round_trip_preserves_every_kind() {
    let ctx = MetaContext::new();
    let object = build_full_object(&ctx);

    let text = serialize_object(&object).unwrap().to_text().unwrap();
    let document = metaprop::SerializedDocument::from_text(&text).unwrap();
    let tree = deserialize_dynamic(&ctx, &document).unwrap();
    let loaded = &tree.root;

    assert_eq!(loaded.name(), "SerializationTest");
    assert_eq!(*loaded.at::<i8>("int8Property").value(), 23);
    assert_eq!(*loaded.at::<i16>("int16Property").value(), -4232);
    assert_eq!(*loaded.at::<i32>("int32Property").value(), 2_323_333);
    assert_eq!(*loaded.at::<i64>("int64Property").value(), -23_554_545_342);
    assert_eq!(loaded.at::<u8>("uint8Property").values(), &[45, 123]);
    assert_eq!(*loaded.at::<u16>("uint16Property").value(), 0);
    assert_eq!(*loaded.at::<u32>("uint32Property").value(), 12_351_611);
    assert_eq!(*loaded.at::<u64>("uint64Property").value(), 6_646_777_643_353);
    assert_eq!(*loaded.at::<f32>("floatProperty").value(), 9.999_999_9f32);
    assert_eq!(
        *loaded.at::<f64>("doubleProperty").value(),
        std::f64::consts::FRAC_PI_2
    );
    assert_eq!(loaded.at::<String>("stringProperty").value(), "Tralala");
    assert_eq!(
        loaded.at::<WideString>("wstringProperty").value().to_narrow(),
        "This is ridiculous"
    );

    let nested = loaded.at::<ObjectRef>("objectProperty").value().as_ref().unwrap();
    assert_eq!(nested.name(), "innerTestObject");
    assert_eq!(*nested.at::<i8>("int8Property").value(), 23);
}

// ============================================================================
// 2. Binary round trip matches the text round trip
// ============================================================================

#[test]
fn test_binary_round_trip_matches_text() {
    let ctx = MetaContext::new();
    let object = build_full_object(&ctx);
    let document = serialize_object(&object).unwrap();

    let bytes = document.to_binary();
    let from_binary = metaprop::SerializedDocument::from_binary(&bytes).unwrap();

    assert_eq!(document, from_binary);
    assert_eq!(bytes, from_binary.to_binary());

    let tree = deserialize_dynamic(&ctx, &from_binary).unwrap();
    assert_eq!(*tree.root.at::<f32>("floatProperty").value(), 9.999_999_9f32);
    assert_eq!(tree.root.at::<u8>("uint8Property").values(), &[45, 123]);
}

// ============================================================================
// 3. Serialize -> deserialize -> serialize is byte-identical
// ============================================================================

#[test]
fn test_repeated_serialization_is_byte_identical() {
    let ctx = MetaContext::new();
    let object = build_full_object(&ctx);

    let first = serialize_object(&object).unwrap();
    let tree = deserialize_dynamic(&ctx, &first).unwrap();
    let second = serialize_object(&tree.root).unwrap();

    assert_eq!(first.to_text().unwrap(), second.to_text().unwrap());
    assert_eq!(first.to_binary(), second.to_binary());
}

// ============================================================================
// 4. Prototype-bound loading
// ============================================================================

fn sensor_prototype() -> Prototype {
    Prototype::new("Sensor")
        .with_property(Property::define("width", 640u32))
        .with_property(Property::define("label", String::from("unset")))
}

#[test]
fn test_prototype_bound_round_trip() {
    let ctx = MetaContext::new();
    let prototype = ctx.register_prototype(sensor_prototype());
    let mut object = ctx.create_instance("Sensor", "left-eye", PropertyMap::new()).unwrap();
    object.at_mut::<u32>("width").set(1920);
    object.at_mut::<String>("label").set(String::from("left"));

    let document = serialize_object(&object).unwrap();
    let tree = deserialize_object(&ctx, &document).unwrap();

    assert_eq!(*tree.root.at::<u32>("width").value(), 1920);
    assert_eq!(tree.root.at::<String>("label").value(), "left");
    assert_eq!(tree.root.prototype().unwrap().name(), "Sensor");
    assert!(prototype.has_instance(tree.root.uid()));

    // Reloading does not disturb the document.
    let reserialized = serialize_object(&tree.root).unwrap();
    assert_eq!(document.to_text().unwrap(), reserialized.to_text().unwrap());
}

#[test]
fn test_unknown_prototype_fails_strict_mode() {
    let ctx = MetaContext::new();
    let document = metaprop::SerializedDocument::from_text(
        r#"{ "uid": 1, "name": "ghost", "prototypeId": "Ghost", "properties": {} }"#,
    )
    .unwrap();
    assert!(matches!(
        deserialize_object(&ctx, &document),
        Err(Error::Deserialization(_))
    ));
}

#[test]
fn test_empty_prototype_id_fails_strict_mode() {
    let ctx = MetaContext::new();
    let object = Object::new(&ctx, "unbound").unwrap();
    let document = serialize_object(&object).unwrap();

    assert!(deserialize_object(&ctx, &document).is_err());
    // The same document loads fine dynamically.
    assert!(deserialize_dynamic(&ctx, &document).is_ok());
}

// ============================================================================
// 5. Identity backfill and malformed documents
// ============================================================================

#[test]
fn test_unassigned_uid_backfilled_on_load() {
    let ctx = MetaContext::new();
    let mut object = Object::with_uid(ObjectId::UNASSIGNED, "orphan");
    object
        .properties_mut()
        .insert("flag".into(), Property::define("flag", 1u8).into());

    let tree = deserialize_dynamic(&ctx, &serialize_object(&object).unwrap()).unwrap();
    assert!(!tree.root.uid().is_unassigned());
    assert!(!tree.root.at::<u8>("flag").id().is_unassigned());
}

#[test]
fn test_unknown_valuetype_tag_is_rejected() {
    let ctx = MetaContext::new();
    let document = metaprop::SerializedDocument::from_text(
        r#"{
            "uid": 1, "name": "bad", "prototypeId": "",
            "properties": {
                "x": {
                    "uid": 2, "name": "x", "structuretype": 1, "capacity": 1,
                    "valuetype": 99, "default": 0, "values": [0],
                    "writable": 1, "replicationmode": 0
                }
            }
        }"#,
    )
    .unwrap();
    assert!(deserialize_dynamic(&ctx, &document).is_err());
}

#[test]
fn test_values_length_mismatch_is_rejected() {
    let ctx = MetaContext::new();
    let document = metaprop::SerializedDocument::from_text(
        r#"{
            "uid": 1, "name": "bad", "prototypeId": "",
            "properties": {
                "x": {
                    "uid": 2, "name": "x", "structuretype": 2, "capacity": 3,
                    "valuetype": 3, "default": 0, "values": [1, 2],
                    "writable": 1, "replicationmode": 0
                }
            }
        }"#,
    )
    .unwrap();
    assert!(deserialize_dynamic(&ctx, &document).is_err());
}

#[test]
fn test_garbage_input_is_rejected() {
    assert!(metaprop::SerializedDocument::from_text("not a document").is_err());
    assert!(metaprop::SerializedDocument::from_binary(&[0xc1, 0xff, 0x00]).is_err());
}
