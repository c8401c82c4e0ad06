use std::sync::Arc;

use rift::config::RuntimeConfig;
use rift::protocol::{
    read_struct, write_struct, BinaryProtocol, CompactProtocol, JsonProtocol, Protocol,
    ProtocolError,
};
use rift::schema::{load_schema, Resolver, Schema, StructDef};
use rift::transport::{
    BufferedTransport, FramedTransport, MemoryTransport, Transport, TransportError,
};
use rift::value::{StructValue, Value};

fn addressbook() -> Schema {
    load_schema("examples/addressbook.thrift").unwrap()
}

fn tracker() -> Schema {
    load_schema("tests/schemas/tracker.thrift").unwrap()
}

/// Person{name: "Alice", phones: [PhoneNumber{type: WORK, number: "555"}],
/// created_at: 1700000000}
fn alice() -> StructValue {
    StructValue::new("addressbook.Person")
        .with_field(1, Value::String("Alice".into()))
        .with_field(
            2,
            Value::List(vec![Value::Struct(
                StructValue::new("addressbook.PhoneNumber")
                    .with_field(1, Value::I32(2))
                    .with_field(2, Value::String("555".into())),
            )]),
        )
        .with_field(3, Value::I32(1_700_000_000))
}

fn person_def(schema: &Schema) -> Arc<StructDef> {
    schema.struct_def("addressbook.Person").unwrap().clone()
}

#[test]
fn test_binary_person_layout_and_round_trip() {
    let schema = addressbook();
    let def = person_def(&schema);
    let person = alice();

    let mut prot = BinaryProtocol::new(MemoryTransport::new());
    write_struct(&mut prot, &schema, &def, &person).unwrap();

    // Field 1, wire type string, length 5, "Alice".
    let expected_prefix: &[u8] = &[
        0x0b, 0x00, 0x01, 0x00, 0x00, 0x00, 0x05, b'A', b'l', b'i', b'c', b'e',
    ];
    assert_eq!(&prot.transport_mut().bytes()[..expected_prefix.len()], expected_prefix);

    let decoded = read_struct(&mut prot, &schema, &def).unwrap();
    assert_eq!(decoded, person);
}

#[test]
fn test_protocol_interop_on_logical_value() {
    let schema = addressbook();
    let def = person_def(&schema);
    let person = alice();

    let mut binary = BinaryProtocol::new(MemoryTransport::new());
    let mut compact = CompactProtocol::new(MemoryTransport::new());
    let mut json = JsonProtocol::new(MemoryTransport::new());

    write_struct(&mut binary, &schema, &def, &person).unwrap();
    write_struct(&mut compact, &schema, &def, &person).unwrap();
    write_struct(&mut json, &schema, &def, &person).unwrap();

    // Byte representations differ; the decoded value does not.
    let from_binary = read_struct(&mut binary, &schema, &def).unwrap();
    let from_compact = read_struct(&mut compact, &schema, &def).unwrap();
    let from_json = read_struct(&mut json, &schema, &def).unwrap();
    assert_eq!(from_binary, person);
    assert_eq!(from_compact, from_binary);
    assert_eq!(from_json, from_binary);
}

#[test]
fn test_compact_skips_unknown_field() {
    // A writer one schema revision ahead: PhoneNumber grew field 99.
    let evolved = Resolver::new(RuntimeConfig::default())
        .load_str(
            "addressbook",
            "enum PhoneType { MOBILE, HOME, WORK }\nstruct PhoneNumber {\n  1: optional PhoneType type,\n  2: optional string number,\n  99: optional i64 extra,\n}",
        )
        .unwrap();
    let schema = addressbook();
    let evolved_def = evolved.struct_def("addressbook.PhoneNumber").unwrap().clone();
    let def = schema.struct_def("addressbook.PhoneNumber").unwrap().clone();

    let with_extra = StructValue::new("addressbook.PhoneNumber")
        .with_field(1, Value::I32(2))
        .with_field(2, Value::String("555".into()))
        .with_field(99, Value::I64(0x0102_0304_0506));
    let without_extra = StructValue::new("addressbook.PhoneNumber")
        .with_field(1, Value::I32(2))
        .with_field(2, Value::String("555".into()));

    let mut prot = CompactProtocol::new(MemoryTransport::new());
    write_struct(&mut prot, &evolved, &evolved_def, &with_extra).unwrap();
    let decoded = read_struct(&mut prot, &schema, &def).unwrap();
    assert_eq!(decoded, without_extra);
}

#[test]
fn test_required_field_missing_on_decode() {
    let schema = tracker();
    let def = schema.struct_def("tracker.Strict").unwrap().clone();

    // Binary and compact: a bare stop byte. JSON: an empty object.
    let mut binary = BinaryProtocol::new(MemoryTransport::from_bytes(vec![0x00]));
    assert!(matches!(
        read_struct(&mut binary, &schema, &def),
        Err(ProtocolError::RequiredFieldMissing { field_id: 1, .. })
    ));

    let mut compact = CompactProtocol::new(MemoryTransport::from_bytes(vec![0x00]));
    assert!(matches!(
        read_struct(&mut compact, &schema, &def),
        Err(ProtocolError::RequiredFieldMissing { field_id: 1, .. })
    ));

    let mut json = JsonProtocol::new(MemoryTransport::from_bytes(b"{}".to_vec()));
    assert!(matches!(
        read_struct(&mut json, &schema, &def),
        Err(ProtocolError::RequiredFieldMissing { field_id: 1, .. })
    ));
}

#[test]
fn test_union_round_trip_each_arm() {
    let schema = tracker();
    let def = schema.struct_def("tracker.Payload").unwrap().clone();

    let arms = vec![
        StructValue::new("tracker.Payload").with_field(1, Value::String("hi".into())),
        StructValue::new("tracker.Payload").with_field(2, Value::Binary(vec![0, 1, 254, 255])),
        StructValue::new("tracker.Payload").with_field(3, Value::I64(-42)),
    ];
    for arm in arms {
        let mut prot = CompactProtocol::new(MemoryTransport::new());
        write_struct(&mut prot, &schema, &def, &arm).unwrap();
        let decoded = read_struct(&mut prot, &schema, &def).unwrap();
        assert_eq!(decoded, arm);
        assert_eq!(decoded.len(), 1);
    }
}

#[test]
fn test_json_binary_and_unicode_round_trip() {
    let schema = tracker();
    let def = schema.struct_def("tracker.Event").unwrap().clone();
    let event = StructValue::new("tracker.Event")
        .with_field(1, Value::String("naïve — 日本語 \"quoted\"".into()))
        .with_field(
            3,
            Value::Struct(
                StructValue::new("tracker.Payload")
                    .with_field(2, Value::Binary(vec![0xde, 0xad, 0xbe, 0xef])),
            ),
        )
        .with_field(5, Value::Double(2.5));

    let mut prot = JsonProtocol::new(MemoryTransport::new());
    write_struct(&mut prot, &schema, &def, &event).unwrap();
    let decoded = read_struct(&mut prot, &schema, &def).unwrap();
    assert_eq!(decoded, event);
}

#[test]
fn test_absent_optionals_stay_absent() {
    let schema = addressbook();
    let def = person_def(&schema);
    let sparse = StructValue::new("addressbook.Person").with_field(1, Value::String("Bo".into()));

    for prot in [
        &mut BinaryProtocol::new(MemoryTransport::new()) as &mut dyn Protocol,
        &mut CompactProtocol::new(MemoryTransport::new()),
        &mut JsonProtocol::new(MemoryTransport::new()),
    ] {
        write_struct(prot, &schema, &def, &sparse).unwrap();
        let decoded = read_struct(prot, &schema, &def).unwrap();
        assert_eq!(decoded, sparse);
        assert!(!decoded.is_set(2));
        assert!(!decoded.is_set(3));
    }
}

#[test]
fn test_framed_binary_round_trip() {
    let schema = addressbook();
    let def = person_def(&schema);
    let person = alice();

    let mut prot = BinaryProtocol::new(FramedTransport::new(MemoryTransport::new()));
    write_struct(&mut prot, &schema, &def, &person).unwrap();
    prot.flush().unwrap();
    let decoded = read_struct(&mut prot, &schema, &def).unwrap();
    assert_eq!(decoded, person);
}

#[test]
fn test_framed_rejects_oversized_frame() {
    // Produce a legitimate frame, then read it back under a smaller cap.
    let mut writer = FramedTransport::new(MemoryTransport::new());
    writer.write(&[0x55; 100]).unwrap();
    writer.flush().unwrap();
    let bytes = writer.into_inner().take_bytes();

    let mut reader =
        FramedTransport::with_max_frame_size(MemoryTransport::from_bytes(bytes), 10);
    let mut buf = [0u8; 1];
    assert!(matches!(
        reader.read(&mut buf),
        Err(TransportError::FrameTooLarge { size: 100, limit: 10 })
    ));
}

#[test]
fn test_buffered_compact_round_trip() {
    let schema = addressbook();
    let def = person_def(&schema);
    let person = alice();

    let mut prot = CompactProtocol::new(BufferedTransport::with_capacity(
        MemoryTransport::new(),
        8,
    ));
    write_struct(&mut prot, &schema, &def, &person).unwrap();
    prot.flush().unwrap();
    let decoded = read_struct(&mut prot, &schema, &def).unwrap();
    assert_eq!(decoded, person);
}

#[test]
fn test_apply_defaults_materializes_declared_defaults() {
    let schema = addressbook();
    let mut phone = StructValue::new("addressbook.PhoneNumber");
    phone.apply_defaults(&schema).unwrap();
    // PhoneType.MOBILE = 0 per the declared default; `number` has none.
    assert_eq!(phone.get(1), Some(&Value::I32(0)));
    assert!(!phone.is_set(2));
}
