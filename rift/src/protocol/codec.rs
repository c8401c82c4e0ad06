//! Schema-driven encoding and decoding of dynamic values.
//!
//! These drivers walk a [`StructDef`] against a [`StructValue`] over any
//! [`Protocol`]. Field order on the wire is whatever the writer emits;
//! decoding tolerates any order, skips unknown field ids exactly, and
//! enforces requiredness in both directions.

use super::{skip, MessageHeader, Protocol, ProtocolError, ProtocolResult, WireType};
use crate::schema::{Schema, StructDef, TypeRef};
use crate::value::{StructValue, Value};

/// The wire shape of a logical type: enums travel as `I32`, `binary` as
/// `String`, typedefs as their targets.
pub fn wire_type(schema: &Schema, ty: &TypeRef) -> WireType {
    match schema.resolve_alias(ty) {
        TypeRef::Bool => WireType::Bool,
        TypeRef::Byte => WireType::Byte,
        TypeRef::I16 => WireType::I16,
        TypeRef::I32 => WireType::I32,
        TypeRef::I64 => WireType::I64,
        TypeRef::Double => WireType::Double,
        TypeRef::String | TypeRef::Binary => WireType::String,
        TypeRef::List(_) => WireType::List,
        TypeRef::Set(_) => WireType::Set,
        TypeRef::Map(..) => WireType::Map,
        TypeRef::Enum(_) => WireType::I32,
        TypeRef::Struct(_) => WireType::Struct,
        // The resolver rejects these in value position.
        TypeRef::Typedef(_) | TypeRef::Service(_) => WireType::Struct,
    }
}

fn type_error(expected: &TypeRef, value: &Value) -> ProtocolError {
    ProtocolError::UnexpectedType {
        expected: format!("{:?}", expected),
        found: value.kind_name().to_string(),
    }
}

/// Encodes one value of the given logical type.
pub fn write_value(
    prot: &mut dyn Protocol,
    schema: &Schema,
    ty: &TypeRef,
    value: &Value,
) -> ProtocolResult<()> {
    let ty = schema.resolve_alias(ty);
    match (ty, value) {
        (TypeRef::Bool, Value::Bool(v)) => prot.write_bool(*v),
        (TypeRef::Byte, Value::Byte(v)) => prot.write_byte(*v),
        (TypeRef::I16, Value::I16(v)) => prot.write_i16(*v),
        (TypeRef::I32, Value::I32(v)) | (TypeRef::Enum(_), Value::I32(v)) => prot.write_i32(*v),
        (TypeRef::I64, Value::I64(v)) => prot.write_i64(*v),
        (TypeRef::Double, Value::Double(v)) => prot.write_double(*v),
        (TypeRef::String, Value::String(v)) => prot.write_string(v),
        (TypeRef::Binary, Value::Binary(v)) => prot.write_binary(v),
        (TypeRef::List(elem), Value::List(items)) => {
            prot.write_list_begin(wire_type(schema, elem), items.len())?;
            for item in items {
                write_value(prot, schema, elem, item)?;
            }
            prot.write_list_end()
        }
        (TypeRef::Set(elem), Value::Set(items)) => {
            prot.write_set_begin(wire_type(schema, elem), items.len())?;
            for item in items {
                write_value(prot, schema, elem, item)?;
            }
            prot.write_set_end()
        }
        (TypeRef::Map(key_ty, value_ty), Value::Map(pairs)) => {
            prot.write_map_begin(
                wire_type(schema, key_ty),
                wire_type(schema, value_ty),
                pairs.len(),
            )?;
            for (k, v) in pairs {
                write_value(prot, schema, key_ty, k)?;
                write_value(prot, schema, value_ty, v)?;
            }
            prot.write_map_end()
        }
        (TypeRef::Struct(name), Value::Struct(sv)) => {
            let def = schema
                .struct_def(name)
                .ok_or_else(|| ProtocolError::UnexpectedType {
                    expected: name.clone(),
                    found: "unregistered struct".into(),
                })?;
            write_struct(prot, schema, def, sv)
        }
        (ty, value) => Err(type_error(ty, value)),
    }
}

/// Encodes a struct, union, or exception body (fields and stop marker).
pub fn write_struct(
    prot: &mut dyn Protocol,
    schema: &Schema,
    def: &StructDef,
    value: &StructValue,
) -> ProtocolResult<()> {
    if def.is_union() && value.len() > 1 {
        return Err(ProtocolError::UnionCardinality {
            union: def.name.clone(),
            count: value.len(),
        });
    }
    prot.write_struct_begin(&def.name)?;
    for field in &def.fields {
        match value.get(field.id) {
            Some(field_value) => {
                prot.write_field_begin(wire_type(schema, &field.ty), field.id)?;
                write_value(prot, schema, &field.ty, field_value)?;
                prot.write_field_end()?;
            }
            None if field.is_required() => {
                return Err(ProtocolError::RequiredFieldMissing {
                    strukt: def.name.clone(),
                    field_id: field.id,
                });
            }
            None => {}
        }
    }
    prot.write_field_stop()?;
    prot.write_struct_end()
}

/// Decodes one value of the given logical type.
pub fn read_value(
    prot: &mut dyn Protocol,
    schema: &Schema,
    ty: &TypeRef,
) -> ProtocolResult<Value> {
    let limit = prot.recursion_limit();
    read_value_depth(prot, schema, ty, limit)
}

fn read_value_depth(
    prot: &mut dyn Protocol,
    schema: &Schema,
    ty: &TypeRef,
    depth: usize,
) -> ProtocolResult<Value> {
    let ty = schema.resolve_alias(ty);
    match ty {
        TypeRef::Bool => Ok(Value::Bool(prot.read_bool()?)),
        TypeRef::Byte => Ok(Value::Byte(prot.read_byte()?)),
        TypeRef::I16 => Ok(Value::I16(prot.read_i16()?)),
        TypeRef::I32 | TypeRef::Enum(_) => Ok(Value::I32(prot.read_i32()?)),
        TypeRef::I64 => Ok(Value::I64(prot.read_i64()?)),
        TypeRef::Double => Ok(Value::Double(prot.read_double()?)),
        TypeRef::String => Ok(Value::String(prot.read_string()?)),
        TypeRef::Binary => Ok(Value::Binary(prot.read_binary()?)),
        TypeRef::List(elem) => {
            if depth == 0 {
                return Err(ProtocolError::DepthLimit);
            }
            let expected = wire_type(schema, elem);
            let (elem_ty, size) = prot.read_list_begin()?;
            check_element_type(expected, elem_ty, size)?;
            let mut items = Vec::with_capacity(size.min(1024));
            for _ in 0..size {
                items.push(read_value_depth(prot, schema, elem, depth - 1)?);
            }
            prot.read_list_end()?;
            Ok(Value::List(items))
        }
        TypeRef::Set(elem) => {
            if depth == 0 {
                return Err(ProtocolError::DepthLimit);
            }
            let expected = wire_type(schema, elem);
            let (elem_ty, size) = prot.read_set_begin()?;
            check_element_type(expected, elem_ty, size)?;
            let mut items = Vec::with_capacity(size.min(1024));
            for _ in 0..size {
                items.push(read_value_depth(prot, schema, elem, depth - 1)?);
            }
            prot.read_set_end()?;
            Ok(Value::Set(items))
        }
        TypeRef::Map(key_ty, value_ty) => {
            if depth == 0 {
                return Err(ProtocolError::DepthLimit);
            }
            let (wire_key, wire_value, size) = prot.read_map_begin()?;
            check_element_type(wire_type(schema, key_ty), wire_key, size)?;
            check_element_type(wire_type(schema, value_ty), wire_value, size)?;
            let mut pairs = Vec::with_capacity(size.min(1024));
            for _ in 0..size {
                let k = read_value_depth(prot, schema, key_ty, depth - 1)?;
                let v = read_value_depth(prot, schema, value_ty, depth - 1)?;
                pairs.push((k, v));
            }
            prot.read_map_end()?;
            Ok(Value::Map(pairs))
        }
        TypeRef::Struct(name) => {
            if depth == 0 {
                return Err(ProtocolError::DepthLimit);
            }
            let def = schema
                .struct_def(name)
                .ok_or_else(|| ProtocolError::UnexpectedType {
                    expected: name.clone(),
                    found: "unregistered struct".into(),
                })?;
            let def = def.clone();
            Ok(Value::Struct(read_struct_depth(prot, schema, &def, depth)?))
        }
        TypeRef::Typedef(_) | TypeRef::Service(_) => Err(ProtocolError::UnexpectedType {
            expected: "a value type".into(),
            found: format!("{:?}", ty),
        }),
    }
}

fn check_element_type(expected: WireType, found: WireType, size: usize) -> ProtocolResult<()> {
    // Empty compact maps carry no type byte, so only non-empty containers
    // can be checked.
    if size > 0 && expected != found {
        return Err(ProtocolError::UnexpectedType {
            expected: format!("{:?}", expected),
            found: format!("{:?}", found),
        });
    }
    Ok(())
}

/// Decodes a struct body against its definition.
///
/// Unknown field ids (and known ids carrying an unexpected wire type) are
/// skipped; required fields missing after the stop marker are an error.
pub fn read_struct(
    prot: &mut dyn Protocol,
    schema: &Schema,
    def: &StructDef,
) -> ProtocolResult<StructValue> {
    let limit = prot.recursion_limit();
    read_struct_depth(prot, schema, def, limit)
}

fn read_struct_depth(
    prot: &mut dyn Protocol,
    schema: &Schema,
    def: &StructDef,
    depth: usize,
) -> ProtocolResult<StructValue> {
    if depth == 0 {
        return Err(ProtocolError::DepthLimit);
    }
    let mut value = StructValue::new(def.name.clone());
    prot.read_struct_begin()?;
    while let Some(header) = prot.read_field_begin()? {
        match def.field_by_id(header.id) {
            Some(field) if wire_type(schema, &field.ty) == header.ty => {
                let field_value = read_value_depth(prot, schema, &field.ty, depth - 1)?;
                value.set(field.id, field_value);
            }
            _ => skip(prot, header.ty)?,
        }
        prot.read_field_end()?;
    }
    prot.read_struct_end()?;

    for field in &def.fields {
        if field.is_required() && !value.is_set(field.id) {
            return Err(ProtocolError::RequiredFieldMissing {
                strukt: def.name.clone(),
                field_id: field.id,
            });
        }
    }
    Ok(value)
}

/// Writes a complete message: header, body struct, message end.
///
/// Flushing is the caller's business so oneway sends can batch.
pub fn write_message(
    prot: &mut dyn Protocol,
    schema: &Schema,
    header: &MessageHeader,
    def: &StructDef,
    body: &StructValue,
) -> ProtocolResult<()> {
    prot.write_message_begin(header)?;
    write_struct(prot, schema, def, body)?;
    prot.write_message_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::protocol::{BinaryProtocol, CompactProtocol, JsonProtocol};
    use crate::schema::Resolver;
    use crate::transport::MemoryTransport;

    fn schema(source: &str) -> Schema {
        Resolver::new(RuntimeConfig::default())
            .load_str("test", source)
            .unwrap()
    }

    fn sample_schema() -> Schema {
        schema(
            "struct Inner { 1: i32 n }\nstruct Outer {\n  1: optional string name,\n  2: optional list<Inner> items,\n  3: optional map<string, i64> counts,\n  4: optional bool flag,\n}",
        )
    }

    fn sample_value() -> StructValue {
        StructValue::new("test.Outer")
            .with_field(1, Value::String("x".into()))
            .with_field(
                2,
                Value::List(vec![Value::Struct(
                    StructValue::new("test.Inner").with_field(1, Value::I32(7)),
                )]),
            )
            .with_field(
                3,
                Value::Map(vec![(Value::String("k".into()), Value::I64(9))]),
            )
            .with_field(4, Value::Bool(true))
    }

    fn round_trip(prot: &mut dyn Protocol, schema: &Schema) {
        let def = schema.struct_def("test.Outer").unwrap().clone();
        let value = sample_value();
        write_struct(prot, schema, &def, &value).unwrap();
        let decoded = read_struct(prot, schema, &def).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_round_trip_all_protocols() {
        let schema = sample_schema();
        round_trip(&mut BinaryProtocol::new(MemoryTransport::new()), &schema);
        round_trip(&mut CompactProtocol::new(MemoryTransport::new()), &schema);
        round_trip(&mut JsonProtocol::new(MemoryTransport::new()), &schema);
    }

    #[test]
    fn test_required_field_enforced_on_write() {
        let schema = schema("struct S { 1: required i32 x }");
        let def = schema.struct_def("test.S").unwrap().clone();
        let mut prot = BinaryProtocol::new(MemoryTransport::new());
        let err = write_struct(&mut prot, &schema, &def, &StructValue::new("test.S"));
        assert!(matches!(
            err,
            Err(ProtocolError::RequiredFieldMissing { field_id: 1, .. })
        ));
    }

    #[test]
    fn test_required_field_enforced_on_read() {
        let schema = schema("struct S { 1: required i32 x }");
        let def = schema.struct_def("test.S").unwrap().clone();
        // An empty struct payload: just the stop marker.
        let mut prot = BinaryProtocol::new(MemoryTransport::from_bytes(vec![0x00]));
        let err = read_struct(&mut prot, &schema, &def);
        assert!(matches!(
            err,
            Err(ProtocolError::RequiredFieldMissing { field_id: 1, .. })
        ));
    }

    #[test]
    fn test_union_cardinality_enforced_on_write() {
        let schema = schema("union U { 1: i32 a, 2: string b }");
        let def = schema.struct_def("test.U").unwrap().clone();
        let value = StructValue::new("test.U")
            .with_field(1, Value::I32(1))
            .with_field(2, Value::String("two".into()));
        let mut prot = BinaryProtocol::new(MemoryTransport::new());
        assert!(matches!(
            write_struct(&mut prot, &schema, &def, &value),
            Err(ProtocolError::UnionCardinality { count: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_fields_skipped() {
        // Writer's schema has an extra field 99; reader's does not.
        let writer_schema = schema(
            "struct P { 1: optional i32 x, 99: optional i64 extra, 3: optional string s }",
        );
        let reader_schema = schema("struct P { 1: optional i32 x, 3: optional string s }");
        let writer_def = writer_schema.struct_def("test.P").unwrap().clone();
        let reader_def = reader_schema.struct_def("test.P").unwrap().clone();

        let value = StructValue::new("test.P")
            .with_field(1, Value::I32(5))
            .with_field(99, Value::I64(123456789))
            .with_field(3, Value::String("keep".into()));

        for prot in [
            &mut BinaryProtocol::new(MemoryTransport::new()) as &mut dyn Protocol,
            &mut CompactProtocol::new(MemoryTransport::new()),
            &mut JsonProtocol::new(MemoryTransport::new()),
        ] {
            write_struct(prot, &writer_schema, &writer_def, &value).unwrap();
            let decoded = read_struct(prot, &reader_schema, &reader_def).unwrap();
            assert_eq!(decoded.get(1), Some(&Value::I32(5)));
            assert_eq!(decoded.get(3), Some(&Value::String("keep".into())));
            assert!(!decoded.is_set(99));
        }
    }

    #[test]
    fn test_wire_type_mismatch_skips_field() {
        let writer_schema = schema("struct P { 1: optional i64 x }");
        let reader_schema = schema("struct P { 1: optional i32 x }");
        let writer_def = writer_schema.struct_def("test.P").unwrap().clone();
        let reader_def = reader_schema.struct_def("test.P").unwrap().clone();

        let mut prot = BinaryProtocol::new(MemoryTransport::new());
        let value = StructValue::new("test.P").with_field(1, Value::I64(1));
        write_struct(&mut prot, &writer_schema, &writer_def, &value).unwrap();
        let decoded = read_struct(&mut prot, &reader_schema, &reader_def).unwrap();
        assert!(!decoded.is_set(1));
    }

    #[test]
    fn test_depth_limit() {
        let schema = schema("struct Node { 1: optional Node next }");
        let def = schema.struct_def("test.Node").unwrap().clone();

        // Build a chain deeper than the decoder's budget.
        let mut value = StructValue::new("test.Node");
        for _ in 0..80 {
            value = StructValue::new("test.Node").with_field(1, Value::Struct(value));
        }
        let mut prot = BinaryProtocol::new(MemoryTransport::new());
        write_struct(&mut prot, &schema, &def, &value).unwrap();
        assert!(matches!(
            read_struct(&mut prot, &schema, &def),
            Err(ProtocolError::DepthLimit)
        ));
    }

    #[test]
    fn test_typedefs_transparent_on_wire() {
        let schema = schema("typedef i32 timestamp\nstruct S { 1: optional timestamp t }");
        let def = schema.struct_def("test.S").unwrap().clone();
        let value = StructValue::new("test.S").with_field(1, Value::I32(1700000000));
        let mut prot = BinaryProtocol::new(MemoryTransport::new());
        write_struct(&mut prot, &schema, &def, &value).unwrap();
        // On the wire this is a plain i32 field.
        assert_eq!(prot.transport_mut().bytes()[0], 0x08);
        let decoded = read_struct(&mut prot, &schema, &def).unwrap();
        assert_eq!(decoded, value);
    }
}
