//! Dynamic values typed by the schema.
//!
//! A [`Value`] is the protocol layer's only currency: decoders produce them,
//! encoders consume them, and hosts project them onto their own records
//! through [`RecordAdapter`].

pub mod json;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::schema::{ConstValue, Schema, StructDef, TypeRef};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("unknown field `{field}` on `{strukt}`")]
    UnknownField { strukt: String, field: String },

    #[error("unknown struct type `{name}`")]
    UnknownStruct { name: String },
}

/// Runtime representation of any Thrift-typed datum.
///
/// Maps are pair vectors rather than hash maps: `Value` contains doubles and
/// has no total ordering, and decoding preserves wire order anyway.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct(StructValue),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Widening view over the integer variants.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(*v as i64),
            Value::I16(v) => Some(*v as i64),
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_struct(self) -> Option<StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Materializes an evaluated constant as a value of the given type.
    ///
    /// Used for field defaults and for surfacing `const` declarations.
    pub fn from_const(schema: &Schema, ty: &TypeRef, value: &ConstValue) -> Result<Value, ValueError> {
        let ty = schema.resolve_alias(ty);
        let mismatch = || ValueError::TypeMismatch {
            expected: format!("{:?}", ty),
            found: format!("{:?}", value),
        };
        match (ty, value) {
            (TypeRef::Bool, ConstValue::Bool(v)) => Ok(Value::Bool(*v)),
            (TypeRef::Bool, ConstValue::Int(v)) => Ok(Value::Bool(*v != 0)),
            (TypeRef::Byte, ConstValue::Int(v)) => Ok(Value::Byte(*v as i8)),
            (TypeRef::I16, ConstValue::Int(v)) => Ok(Value::I16(*v as i16)),
            (TypeRef::I32, ConstValue::Int(v)) | (TypeRef::Enum(_), ConstValue::Int(v)) => {
                Ok(Value::I32(*v as i32))
            }
            (TypeRef::I64, ConstValue::Int(v)) => Ok(Value::I64(*v)),
            (TypeRef::Double, ConstValue::Double(v)) => Ok(Value::Double(*v)),
            (TypeRef::Double, ConstValue::Int(v)) => Ok(Value::Double(*v as f64)),
            (TypeRef::String, ConstValue::Str(s)) => Ok(Value::String(s.clone())),
            (TypeRef::Binary, ConstValue::Str(s)) => Ok(Value::Binary(s.clone().into_bytes())),
            (TypeRef::List(elem), ConstValue::List(items)) => {
                let values: Result<Vec<_>, _> = items
                    .iter()
                    .map(|item| Value::from_const(schema, elem, item))
                    .collect();
                Ok(Value::List(values?))
            }
            (TypeRef::Set(elem), ConstValue::List(items)) => {
                let values: Result<Vec<_>, _> = items
                    .iter()
                    .map(|item| Value::from_const(schema, elem, item))
                    .collect();
                Ok(Value::Set(values?))
            }
            (TypeRef::Map(key_ty, value_ty), ConstValue::Map(pairs)) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    out.push((
                        Value::from_const(schema, key_ty, k)?,
                        Value::from_const(schema, value_ty, v)?,
                    ));
                }
                Ok(Value::Map(out))
            }
            (TypeRef::Struct(name), ConstValue::Map(pairs)) => {
                let def = schema
                    .struct_def(name)
                    .ok_or_else(|| ValueError::UnknownStruct { name: name.clone() })?;
                let mut sv = StructValue::new(name.clone());
                for (k, v) in pairs {
                    let ConstValue::Str(field_name) = k else {
                        return Err(mismatch());
                    };
                    let field = def.field_by_name(field_name).ok_or_else(|| {
                        ValueError::UnknownField {
                            strukt: name.clone(),
                            field: field_name.clone(),
                        }
                    })?;
                    sv.set(field.id, Value::from_const(schema, &field.ty, v)?);
                }
                Ok(Value::Struct(sv))
            }
            _ => Err(mismatch()),
        }
    }
}

/// A struct, union, or exception instance: field id → value.
///
/// Unset optional fields are simply absent from the map.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    /// Qualified name of the [`StructDef`] this value is typed by.
    pub ty: String,
    fields: BTreeMap<i16, Value>,
}

impl StructValue {
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, id: i16, value: Value) -> Self {
        self.fields.insert(id, value);
        self
    }

    pub fn set(&mut self, id: i16, value: Value) {
        self.fields.insert(id, value);
    }

    pub fn get(&self, id: i16) -> Option<&Value> {
        self.fields.get(&id)
    }

    pub fn take(&mut self, id: i16) -> Option<Value> {
        self.fields.remove(&id)
    }

    pub fn is_set(&self, id: i16) -> bool {
        self.fields.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (i16, &Value)> {
        self.fields.iter().map(|(id, value)| (*id, value))
    }

    /// Fills absent fields that declare a default value.
    pub fn apply_defaults(&mut self, schema: &Schema) -> Result<(), ValueError> {
        let def = schema
            .struct_def(&self.ty)
            .ok_or_else(|| ValueError::UnknownStruct {
                name: self.ty.clone(),
            })?;
        for field in &def.fields {
            if self.fields.contains_key(&field.id) {
                continue;
            }
            if let Some(default) = &field.default {
                let value = Value::from_const(schema, &field.ty, default)?;
                self.fields.insert(field.id, value);
            }
        }
        Ok(())
    }
}

/// Maps struct values onto host record representations.
///
/// The protocol layer never sees host records; it speaks [`Value`] and
/// [`StructDef`] only. Statically-typed hosts implement this to project
/// decoded structs onto their own types.
pub trait RecordAdapter {
    type Record;

    fn to_value(&self, def: &StructDef, record: &Self::Record) -> Result<StructValue, ValueError>;

    fn from_value(&self, def: &StructDef, value: StructValue) -> Result<Self::Record, ValueError>;
}

/// The identity adapter: hosts that work with dynamic values directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAdapter;

impl RecordAdapter for IdentityAdapter {
    type Record = StructValue;

    fn to_value(&self, _def: &StructDef, record: &StructValue) -> Result<StructValue, ValueError> {
        Ok(record.clone())
    }

    fn from_value(&self, _def: &StructDef, value: StructValue) -> Result<StructValue, ValueError> {
        Ok(value)
    }
}
