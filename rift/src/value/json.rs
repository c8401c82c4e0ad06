//! Schema-directed projection between [`Value`] and `serde_json::Value`.
//!
//! A host-side convenience for debugging, HTTP bridges, and tests. This is
//! not the JSON wire protocol (see [`crate::protocol::json`]); field names
//! key the objects here, and `binary` travels as base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Map, Value as JsonValue};

use super::{StructValue, Value, ValueError};
use crate::schema::{Schema, TypeRef};

/// Converts a typed value into host-facing JSON.
pub fn to_json(schema: &Schema, ty: &TypeRef, value: &Value) -> Result<JsonValue, ValueError> {
    let ty = schema.resolve_alias(ty);
    let mismatch = || ValueError::TypeMismatch {
        expected: format!("{:?}", ty),
        found: value.kind_name().to_string(),
    };
    match (ty, value) {
        (TypeRef::Bool, Value::Bool(v)) => Ok(json!(v)),
        (TypeRef::Byte, Value::Byte(v)) => Ok(json!(v)),
        (TypeRef::I16, Value::I16(v)) => Ok(json!(v)),
        (TypeRef::I32, Value::I32(v)) => Ok(json!(v)),
        (TypeRef::I64, Value::I64(v)) => Ok(json!(v)),
        (TypeRef::Double, Value::Double(v)) => {
            serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .ok_or_else(|| ValueError::TypeMismatch {
                    expected: "finite double".into(),
                    found: v.to_string(),
                })
        }
        (TypeRef::String, Value::String(s)) => Ok(json!(s)),
        (TypeRef::Binary, Value::Binary(bytes)) => Ok(json!(BASE64.encode(bytes))),
        (TypeRef::Enum(name), Value::I32(v)) => {
            // Known members project as their symbol; unknown values stay numeric.
            match schema.enum_def(name).and_then(|def| def.symbol_of(*v)) {
                Some(symbol) => Ok(json!(symbol)),
                None => Ok(json!(v)),
            }
        }
        (TypeRef::List(elem), Value::List(items)) | (TypeRef::Set(elem), Value::Set(items)) => {
            let out: Result<Vec<_>, _> = items
                .iter()
                .map(|item| to_json(schema, elem, item))
                .collect();
            Ok(JsonValue::Array(out?))
        }
        (TypeRef::Map(key_ty, value_ty), Value::Map(pairs)) => {
            // String-keyed maps become objects; anything else an array of pairs.
            if matches!(schema.resolve_alias(key_ty), TypeRef::String) {
                let mut obj = Map::new();
                for (k, v) in pairs {
                    let Value::String(key) = k else {
                        return Err(mismatch());
                    };
                    obj.insert(key.clone(), to_json(schema, value_ty, v)?);
                }
                Ok(JsonValue::Object(obj))
            } else {
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    out.push(JsonValue::Array(vec![
                        to_json(schema, key_ty, k)?,
                        to_json(schema, value_ty, v)?,
                    ]));
                }
                Ok(JsonValue::Array(out))
            }
        }
        (TypeRef::Struct(name), Value::Struct(sv)) => {
            let def = schema
                .struct_def(name)
                .ok_or_else(|| ValueError::UnknownStruct { name: name.clone() })?;
            let mut obj = Map::new();
            for (id, field_value) in sv.iter() {
                let Some(field) = def.field_by_id(id) else {
                    continue; // field unknown to this schema revision
                };
                obj.insert(
                    field.name.clone(),
                    to_json(schema, &field.ty, field_value)?,
                );
            }
            Ok(JsonValue::Object(obj))
        }
        _ => Err(mismatch()),
    }
}

/// Converts host-facing JSON into a typed value.
pub fn from_json(schema: &Schema, ty: &TypeRef, json: &JsonValue) -> Result<Value, ValueError> {
    let ty = schema.resolve_alias(ty);
    let mismatch = || ValueError::TypeMismatch {
        expected: format!("{:?}", ty),
        found: json.to_string(),
    };
    match ty {
        TypeRef::Bool => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
        TypeRef::Byte => json
            .as_i64()
            .and_then(|v| i8::try_from(v).ok())
            .map(Value::Byte)
            .ok_or_else(mismatch),
        TypeRef::I16 => json
            .as_i64()
            .and_then(|v| i16::try_from(v).ok())
            .map(Value::I16)
            .ok_or_else(mismatch),
        TypeRef::I32 => json
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::I32)
            .ok_or_else(mismatch),
        TypeRef::I64 => json.as_i64().map(Value::I64).ok_or_else(mismatch),
        TypeRef::Double => json.as_f64().map(Value::Double).ok_or_else(mismatch),
        TypeRef::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        TypeRef::Binary => {
            let encoded = json.as_str().ok_or_else(mismatch)?;
            BASE64
                .decode(encoded)
                .map(Value::Binary)
                .map_err(|_| mismatch())
        }
        TypeRef::Enum(name) => {
            if let Some(v) = json.as_i64() {
                return i32::try_from(v).map(Value::I32).map_err(|_| mismatch());
            }
            let symbol = json.as_str().ok_or_else(mismatch)?;
            let def = schema
                .enum_def(name)
                .ok_or_else(|| ValueError::UnknownStruct { name: name.clone() })?;
            def.value_of(symbol).map(Value::I32).ok_or_else(mismatch)
        }
        TypeRef::List(elem) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            let out: Result<Vec<_>, _> = items
                .iter()
                .map(|item| from_json(schema, elem, item))
                .collect();
            Ok(Value::List(out?))
        }
        TypeRef::Set(elem) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            let out: Result<Vec<_>, _> = items
                .iter()
                .map(|item| from_json(schema, elem, item))
                .collect();
            Ok(Value::Set(out?))
        }
        TypeRef::Map(key_ty, value_ty) => {
            if let Some(obj) = json.as_object() {
                let mut out = Vec::with_capacity(obj.len());
                for (k, v) in obj {
                    out.push((
                        Value::String(k.clone()),
                        from_json(schema, value_ty, v)?,
                    ));
                }
                return Ok(Value::Map(out));
            }
            let pairs = json.as_array().ok_or_else(mismatch)?;
            let mut out = Vec::with_capacity(pairs.len());
            for pair in pairs {
                let pair = pair.as_array().filter(|p| p.len() == 2).ok_or_else(mismatch)?;
                out.push((
                    from_json(schema, key_ty, &pair[0])?,
                    from_json(schema, value_ty, &pair[1])?,
                ));
            }
            Ok(Value::Map(out))
        }
        TypeRef::Struct(name) => {
            let obj = json.as_object().ok_or_else(mismatch)?;
            let def = schema
                .struct_def(name)
                .ok_or_else(|| ValueError::UnknownStruct { name: name.clone() })?;
            let mut sv = StructValue::new(name.clone());
            for (key, field_json) in obj {
                let field = def
                    .field_by_name(key)
                    .ok_or_else(|| ValueError::UnknownField {
                        strukt: name.clone(),
                        field: key.clone(),
                    })?;
                sv.set(field.id, from_json(schema, &field.ty, field_json)?);
            }
            Ok(Value::Struct(sv))
        }
        TypeRef::Typedef(_) | TypeRef::Service(_) => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::schema::Resolver;

    fn schema(source: &str) -> Schema {
        Resolver::new(RuntimeConfig::default())
            .load_str("test", source)
            .unwrap()
    }

    #[test]
    fn test_struct_projection_round_trip() {
        let schema = schema(
            "enum PhoneType { MOBILE, HOME, WORK }\nstruct PhoneNumber { 1: optional PhoneType type, 2: optional string number }",
        );
        let ty = TypeRef::Struct("test.PhoneNumber".into());
        let value = Value::Struct(
            StructValue::new("test.PhoneNumber")
                .with_field(1, Value::I32(2))
                .with_field(2, Value::String("555".into())),
        );
        let json = to_json(&schema, &ty, &value).unwrap();
        assert_eq!(json, serde_json::json!({"type": "WORK", "number": "555"}));
        assert_eq!(from_json(&schema, &ty, &json).unwrap(), value);
    }

    #[test]
    fn test_binary_base64() {
        let schema = schema("struct S { 1: binary raw }");
        let json = to_json(&schema, &TypeRef::Binary, &Value::Binary(vec![1, 2, 3])).unwrap();
        assert_eq!(json, serde_json::json!("AQID"));
        assert_eq!(
            from_json(&schema, &TypeRef::Binary, &json).unwrap(),
            Value::Binary(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_non_string_map_keys_as_pairs() {
        let schema = schema("struct S { 1: i32 x }");
        let ty = TypeRef::Map(Box::new(TypeRef::I32), Box::new(TypeRef::String));
        let value = Value::Map(vec![(Value::I32(1), Value::String("one".into()))]);
        let json = to_json(&schema, &ty, &value).unwrap();
        assert_eq!(json, serde_json::json!([[1, "one"]]));
        assert_eq!(from_json(&schema, &ty, &json).unwrap(), value);
    }
}
