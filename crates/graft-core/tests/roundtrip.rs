mod common;

use std::sync::Arc;

use common::{fixture, init_tracing, sample_floor, Floor, Notes};
use graft_core::node::AsAny;
use graft_core::{
    slot, Address, BuildScope, CodecError, DecodeError, EncodeError, FieldSpec, Graph,
    IndexedScope, Node, NodeId, RefState, TypeBuilder, TypeDescriptor, WeakRef,
};
use proptest::prelude::*;

#[derive(Debug, Default)]
struct Plan {
    x0: f64,
    tags: Option<Vec<String>>,
}

impl Node for Plan {}

fn plan_type() -> Arc<TypeDescriptor> {
    TypeBuilder::with_default::<Plan>("Plan")
        .field(FieldSpec::double("x0", slot!(Plan, x0)))
        .field(FieldSpec::string_array("tags", slot!(Plan, tags)))
        .build()
        .expect("Plan type must build")
}

#[derive(Debug, Default)]
struct Counter {
    n: i32,
}

impl Node for Counter {}

fn counter_type(flow: &str) -> Arc<TypeDescriptor> {
    TypeBuilder::with_default::<Counter>("Counter")
        .field(FieldSpec::integer("n", slot!(Counter, n)).flow(flow))
        .build()
        .expect("Counter type must build")
}

#[derive(Debug, Default)]
struct Samples {
    values: Option<Vec<f64>>,
    shorts: Option<Vec<i16>>,
    single: f64,
}

impl Node for Samples {}

fn samples_type(value_flow: &str, short_flow: &str, single_flow: &str) -> Arc<TypeDescriptor> {
    TypeBuilder::with_default::<Samples>("Samples")
        .field(FieldSpec::double_array("values", slot!(Samples, values)).flow(value_flow))
        .field(FieldSpec::short_array("shorts", slot!(Samples, shorts)).flow(short_flow))
        .field(FieldSpec::double("single", slot!(Samples, single)).flow(single_flow))
        .build()
        .expect("Samples type must build")
}

fn decode_one(desc: &Arc<TypeDescriptor>, bytes: &[u8]) -> Result<(Graph, NodeId), CodecError> {
    let mut graph = Graph::new();
    let mut build = BuildScope::new();
    let id = desc.decode(bytes, &mut graph, &mut build)?;
    build.resolve(&mut graph)?;
    Ok((graph, id))
}

#[test]
fn plan_encoding_is_byte_exact() {
    let desc = plan_type();
    let scope = IndexedScope::new();

    let bytes = desc
        .encode(
            &Plan {
                x0: 3.5,
                tags: Some(vec!["a".into(), "b".into()]),
            },
            &scope,
        )
        .expect("encode must succeed");
    assert_eq!(
        bytes,
        vec![
            0x33, 0x40, 0x0c, 0, 0, 0, 0, 0, 0, // x0: FLOAT64 3.5
            0x80, 0x42, 0x02, 0x01, b'a', 0x01, b'b', // tags: ARRAY STRING_UTF8 len=2
        ]
    );
    let (graph, id) = decode_one(&desc, &bytes).expect("decode must succeed");
    let plan = graph.get::<Plan>(id).expect("decoded node is a Plan");
    assert_eq!(plan.x0, 3.5);
    assert_eq!(plan.tags, Some(vec!["a".to_string(), "b".to_string()]));

    let bytes = desc
        .encode(&Plan { x0: 0.0, tags: None }, &scope)
        .expect("encode must succeed");
    assert_eq!(
        bytes,
        vec![0x33, 0, 0, 0, 0, 0, 0, 0, 0, 0x80, 0x42, 0xff, 0xff, 0xff, 0xff, 0x0f]
    );
    let (graph, id) = decode_one(&desc, &bytes).expect("decode must succeed");
    let plan = graph.get::<Plan>(id).expect("decoded node is a Plan");
    assert_eq!(plan.x0, 0.0);
    assert_eq!(plan.tags, None);
}

#[test]
fn null_and_empty_arrays_stay_distinct() {
    let desc = plan_type();
    let scope = IndexedScope::new();
    for tags in [None, Some(vec![]), Some(vec![String::new()])] {
        let bytes = desc
            .encode(&Plan { x0: 1.0, tags: tags.clone() }, &scope)
            .expect("encode must succeed");
        let (graph, id) = decode_one(&desc, &bytes).expect("decode must succeed");
        assert_eq!(graph.get::<Plan>(id).unwrap().tags, tags);
    }
}

#[test]
fn full_floor_roundtrips() {
    init_tracing();
    let f = fixture();
    let mut elsewhere = Graph::new();
    let target = elsewhere.insert_new(&f.floor).expect("blank Floor");
    let mut floor = sample_floor();
    floor.neighbor = Some(WeakRef::local(Address::new("east", "f9"), target));
    let bytes = f
        .floor
        .encode(&floor, &IndexedScope::new())
        .expect("encode must succeed");
    let (graph, id) = decode_one(&f.floor, &bytes).expect("decode must succeed");
    let back = graph.get::<Floor>(id).expect("decoded node is a Floor");

    assert_eq!(back.x0, floor.x0);
    assert_eq!(back.tags, floor.tags);
    assert_eq!(back.level, floor.level);
    assert_eq!(back.lit, floor.lit);
    assert_eq!(back.heights, floor.heights);
    assert_eq!(back.codes, floor.codes);
    assert_eq!(back.switches, floor.switches);
    assert_eq!(back.building, None);

    let neighbor = back.neighbor.as_ref().expect("weak reference survives");
    assert_eq!(neighbor.address, Address::new("east", "f9"));
    assert_eq!(neighbor.state, RefState::Unresolved);

    let notes = back.notes.as_ref().expect("blob survives");
    let notes = (**notes)
        .as_any()
        .downcast_ref::<Notes>()
        .expect("blob decodes as Notes");
    assert_eq!(notes, &Notes(vec!["north wing".into()]));
}

#[test]
fn unknown_wire_tag_is_rejected() {
    let desc = plan_type();
    let err = decode_one(&desc, &[0x99, 0, 0]).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Decode(DecodeError::UnknownWireType { code: 0x99, .. })
    ));

    // A known tag the field cannot take.
    let counter = counter_type("(default)");
    let err = decode_one(&counter, &[0x33, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Decode(DecodeError::UnknownWireType { code: 0x33, .. })
    ));

    // Arrays must start with ARRAY.
    let mut bytes = vec![0x33, 0, 0, 0, 0, 0, 0, 0, 0];
    bytes.extend_from_slice(&[0x42, 0x00]);
    let err = decode_one(&desc, &bytes).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Decode(DecodeError::UnexpectedWireType { expected: 0x80, found: 0x42, .. })
    ));

    // Wrong element type.
    let mut bytes = vec![0x33, 0, 0, 0, 0, 0, 0, 0, 0];
    bytes.extend_from_slice(&[0x80, 0x10, 0x00]);
    let err = decode_one(&desc, &bytes).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Decode(DecodeError::UnknownWireType { code: 0x10, .. })
    ));
}

#[test]
fn truncated_input_fails_and_leaves_no_node() {
    let desc = plan_type();
    let bytes = desc
        .encode(&Plan { x0: 1.0, tags: None }, &IndexedScope::new())
        .unwrap();
    let mut graph = Graph::new();
    let err = desc
        .decode(&bytes[..bytes.len() - 2], &mut graph, &mut BuildScope::new())
        .unwrap_err();
    assert!(matches!(err, CodecError::Decode(DecodeError::Stream(_))));
    assert!(graph.is_empty());
}

#[test]
fn unknown_flow_fails_at_composer_creation() {
    let desc = TypeBuilder::with_default::<Plan>("Plan")
        .field(FieldSpec::double("x0", slot!(Plan, x0)).flow("int8"))
        .build()
        .unwrap();
    let err = desc.encode(&Plan::default(), &IndexedScope::new()).unwrap_err();
    assert!(matches!(
        err,
        CodecError::Encode(EncodeError::UnknownFlow { ref flow, .. }) if flow == "int8"
    ));
}

#[test]
fn field_bound_to_another_host_is_a_type_mismatch() {
    let desc = plan_type();
    let err = desc
        .encode(&Counter { n: 1 }, &IndexedScope::new())
        .unwrap_err();
    assert!(matches!(err, CodecError::TypeMismatch { .. }));
}

#[test]
fn narrow_flows_write_narrow_values() {
    let scope = IndexedScope::new();
    let cases: [(&str, i32, &[u8]); 6] = [
        ("uint8", 200, &[0x20, 200]),
        ("uint16", 0xbeef, &[0x21, 0xbe, 0xef]),
        ("uint32", 7, &[0x22, 0, 0, 0, 7]),
        ("int8", -1, &[0x24, 0xff]),
        ("int16", -2, &[0x25, 0xff, 0xfe]),
        ("(default)", -1, &[0x26, 0xff, 0xff, 0xff, 0xff]),
    ];
    for (flow, n, expected) in cases {
        let bytes = counter_type(flow).encode(&Counter { n }, &scope).unwrap();
        assert_eq!(bytes, expected, "flow {flow}");
    }
}

fn fits(flow: &str, v: i32) -> bool {
    match flow {
        "uint8" => u8::try_from(v).is_ok(),
        "uint16" => u16::try_from(v).is_ok(),
        "uint32" => u32::try_from(v).is_ok(),
        "int8" => i8::try_from(v).is_ok(),
        "int16" => i16::try_from(v).is_ok(),
        _ => true,
    }
}

proptest! {
    #[test]
    fn integer_flows_roundtrip_or_refuse(
        v in prop_oneof![
            any::<i32>(),
            Just(i32::MIN),
            Just(i32::MAX),
            Just(-1),
            Just(0),
            Just(255),
            Just(256),
            -200i32..200,
        ]
    ) {
        let scope = IndexedScope::new();
        for flow in ["uint8", "uint16", "uint32", "int8", "int16", "int32", "(default)"] {
            let desc = counter_type(flow);
            match desc.encode(&Counter { n: v }, &scope) {
                Ok(bytes) => {
                    prop_assert!(fits(flow, v));
                    let (graph, id) = decode_one(&desc, &bytes).unwrap();
                    prop_assert_eq!(graph.get::<Counter>(id).unwrap().n, v);
                }
                Err(err) => {
                    prop_assert!(!fits(flow, v));
                    let out_of_range = matches!(
                        err,
                        CodecError::Encode(EncodeError::ValueOutOfRange { .. })
                    );
                    prop_assert!(out_of_range);
                }
            }
        }
    }

    #[test]
    fn double_flows_roundtrip(
        values in prop::option::of(prop::collection::vec(any::<f64>(), 0..8)),
        single in any::<f64>(),
    ) {
        let scope = IndexedScope::new();
        let node = Samples { values: values.clone(), shorts: None, single };

        let wide = samples_type("(default)", "(default)", "(default)");
        let (graph, id) = decode_one(&wide, &wide.encode(&node, &scope).unwrap()).unwrap();
        let back = graph.get::<Samples>(id).unwrap();
        prop_assert_eq!(back.single.to_bits(), single.to_bits());
        prop_assert_eq!(
            back.values.as_ref().map(|v| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>()),
            values.as_ref().map(|v| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>())
        );

        let narrow = samples_type("float32[]", "(default)", "float32");
        let (graph, id) = decode_one(&narrow, &narrow.encode(&node, &scope).unwrap()).unwrap();
        let back = graph.get::<Samples>(id).unwrap();
        let as_f32 = |x: f64| f64::from(x as f32).to_bits();
        prop_assert_eq!(back.single.to_bits(), as_f32(single));
        prop_assert_eq!(
            back.values.as_ref().map(|v| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>()),
            values.as_ref().map(|v| v.iter().map(|&x| as_f32(x)).collect::<Vec<_>>())
        );
    }

    #[test]
    fn short_flows_roundtrip(shorts in prop::option::of(prop::collection::vec(any::<i16>(), 0..8))) {
        let scope = IndexedScope::new();
        let node = Samples { values: None, shorts: shorts.clone(), single: 0.0 };
        for flow in ["uint8[]", "int8[]", "int16[]", "(default)"] {
            let desc = samples_type("(default)", flow, "(default)");
            let fits_all = shorts.iter().flatten().all(|&s| match flow {
                "uint8[]" => u8::try_from(s).is_ok(),
                "int8[]" => i8::try_from(s).is_ok(),
                _ => true,
            });
            match desc.encode(&node, &scope) {
                Ok(bytes) => {
                    prop_assert!(fits_all);
                    let (graph, id) = decode_one(&desc, &bytes).unwrap();
                    prop_assert_eq!(&graph.get::<Samples>(id).unwrap().shorts, &shorts);
                }
                Err(_) => {
                    prop_assert!(!fits_all);
                }
            }
        }
    }

    #[test]
    fn string_arrays_roundtrip(tags in prop::option::of(prop::collection::vec(".*", 0..6))) {
        let desc = plan_type();
        let node = Plan { x0: 0.0, tags: tags.clone() };
        let bytes = desc.encode(&node, &IndexedScope::new()).unwrap();
        let (graph, id) = decode_one(&desc, &bytes).unwrap();
        prop_assert_eq!(&graph.get::<Plan>(id).unwrap().tags, &tags);
    }
}

#[test]
fn multi_byte_strings_keep_their_bytes() {
    let desc = plan_type();
    let tags = Some(vec!["größe".to_string(), "日本".to_string(), "🏢".to_string()]);
    let bytes = desc
        .encode(&Plan { x0: 0.0, tags: tags.clone() }, &IndexedScope::new())
        .unwrap();
    // "größe" is 7 bytes of UTF-8.
    assert_eq!(&bytes[9..13], &[0x80, 0x42, 0x03, 0x07]);
    let (graph, id) = decode_one(&desc, &bytes).unwrap();
    assert_eq!(graph.get::<Plan>(id).unwrap().tags, tags);
}
