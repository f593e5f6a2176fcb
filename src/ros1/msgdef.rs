//! Dynamic decoding of ROS1 messages from the `message_definition` text stored
//! in bag connection records.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::reader::{MsgReader, RosTime};
use crate::error::{BagError, BagResult};

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][\w/]*)(?:\[(\d*)\])?\s+([A-Za-z_]\w*)$").expect("static regex")
});

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Time,
    Duration,
}

impl Primitive {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "int8" | "byte" => Self::Int8,
            "uint8" | "char" => Self::UInt8,
            "int16" => Self::Int16,
            "uint16" => Self::UInt16,
            "int32" => Self::Int32,
            "uint32" => Self::UInt32,
            "int64" => Self::Int64,
            "uint64" => Self::UInt64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "string" => Self::String,
            "time" => Self::Time,
            "duration" => Self::Duration,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(Primitive),
    /// Fully qualified `pkg/Type`
    Complex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Single,
    Fixed(usize),
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub arity: Arity,
}

/// A decoded message value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Time(RosTime),
    Duration { sec: i32, nsec: i32 },
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::UInt(u) => J::from(*u),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(J::Number).unwrap_or(J::Null),
            Value::String(s) => J::String(s.clone()),
            Value::Time(t) => serde_json::json!({ "secs": t.sec, "nsecs": t.nsec }),
            Value::Duration { sec, nsec } => serde_json::json!({ "secs": sec, "nsecs": nsec }),
            Value::Bytes(b) => J::Array(b.iter().map(|x| J::from(*x)).collect()),
            Value::Array(items) => J::Array(items.iter().map(Value::to_json).collect()),
            Value::Struct(fields) => J::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Flatten into `(column, cell)` pairs. Nested structs become dotted
    /// names, time and duration split into `.secs`/`.nsecs`, arrays are kept
    /// in one cell as compact JSON.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        let join = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };
        match self {
            Value::Struct(fields) => {
                for (name, value) in fields {
                    value.flatten_into(&join(name), out);
                }
            }
            Value::Time(t) => {
                out.push((join("secs"), t.sec.to_string()));
                out.push((join("nsecs"), t.nsec.to_string()));
            }
            Value::Duration { sec, nsec } => {
                out.push((join("secs"), sec.to_string()));
                out.push((join("nsecs"), nsec.to_string()));
            }
            Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
            Value::Int(i) => out.push((prefix.to_string(), i.to_string())),
            Value::UInt(u) => out.push((prefix.to_string(), u.to_string())),
            Value::Float(f) => out.push((prefix.to_string(), f.to_string())),
            Value::String(s) => out.push((prefix.to_string(), s.clone())),
            Value::Bytes(_) | Value::Array(_) => {
                out.push((prefix.to_string(), self.to_json().to_string()))
            }
        }
    }
}

/// A parsed message definition with all of its dependencies.
#[derive(Debug, Clone)]
pub struct MsgDefinition {
    root: String,
    types: HashMap<String, Vec<Field>>,
}

impl MsgDefinition {
    /// Parse the concatenated definition text of `msg_type` (the main type first,
    /// then `MSG: pkg/Type` sections separated by `===` lines).
    pub fn parse(msg_type: &str, text: &str) -> BagResult<Self> {
        let mut sections: Vec<(String, Vec<&str>)> = vec![(msg_type.to_string(), Vec::new())];
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("===") {
                continue;
            }
            if let Some(name) = trimmed.strip_prefix("MSG:") {
                sections.push((name.trim().to_string(), Vec::new()));
                continue;
            }
            if let Some((_, lines)) = sections.last_mut() {
                lines.push(line);
            }
        }

        let known: Vec<String> = sections.iter().map(|(n, _)| n.clone()).collect();
        let mut types = HashMap::new();
        for (name, lines) in &sections {
            let package = name.split_once('/').map(|(p, _)| p).unwrap_or("");
            let mut fields = Vec::new();
            for line in lines {
                if let Some(field) = parse_field_line(name, package, line, &known)? {
                    fields.push(field);
                }
            }
            types.insert(name.clone(), fields);
        }

        let def = Self {
            root: msg_type.to_string(),
            types,
        };
        for fields in def.types.values() {
            for field in fields {
                if let FieldType::Complex(dep) = &field.ty
                    && !def.types.contains_key(dep)
                {
                    return Err(BagError::UnknownType(dep.clone()));
                }
            }
        }
        Ok(def)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn fields(&self, msg_type: &str) -> Option<&[Field]> {
        self.types.get(msg_type).map(|f| f.as_slice())
    }

    pub fn decode(&self, payload: &[u8]) -> BagResult<Value> {
        let mut r = MsgReader::new(payload);
        self.decode_struct(&self.root, &mut r, 0)
    }

    fn decode_struct(&self, msg_type: &str, r: &mut MsgReader<'_>, depth: usize) -> BagResult<Value> {
        if depth > MAX_DEPTH {
            return Err(BagError::MsgDefinition {
                msg_type: msg_type.to_string(),
                reason: "nesting too deep".into(),
            });
        }
        let fields = self
            .types
            .get(msg_type)
            .ok_or_else(|| BagError::UnknownType(msg_type.to_string()))?;

        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            let value = match field.arity {
                Arity::Single => self.decode_one(&field.ty, r, depth)?,
                Arity::Fixed(n) => self.decode_array(&field.ty, n, r, depth)?,
                Arity::Variable => {
                    let n = r.read_u32("array length")? as usize;
                    self.decode_array(&field.ty, n, r, depth)?
                }
            };
            out.push((field.name.clone(), value));
        }
        Ok(Value::Struct(out))
    }

    fn decode_array(&self, ty: &FieldType, n: usize, r: &mut MsgReader<'_>, depth: usize) -> BagResult<Value> {
        if *ty == FieldType::Primitive(Primitive::UInt8) {
            return Ok(Value::Bytes(r.take(n, "uint8 array")?.to_vec()));
        }
        // Each element consumes at least one byte; guards against absurd lengths.
        if n > r.remaining() {
            return Err(BagError::Truncated {
                field: "array",
                offset: r.position(),
                needed: n,
                len: r.position() + r.remaining(),
            });
        }
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            items.push(self.decode_one(ty, r, depth)?);
        }
        Ok(Value::Array(items))
    }

    fn decode_one(&self, ty: &FieldType, r: &mut MsgReader<'_>, depth: usize) -> BagResult<Value> {
        let prim = match ty {
            FieldType::Complex(name) => return self.decode_struct(name, r, depth + 1),
            FieldType::Primitive(p) => *p,
        };
        Ok(match prim {
            Primitive::Bool => Value::Bool(r.read_u8("bool")? != 0),
            Primitive::Int8 => Value::Int(r.read_i8("int8")? as i64),
            Primitive::UInt8 => Value::UInt(r.read_u8("uint8")? as u64),
            Primitive::Int16 => Value::Int(r.read_i16("int16")? as i64),
            Primitive::UInt16 => Value::UInt(r.read_u16("uint16")? as u64),
            Primitive::Int32 => Value::Int(r.read_i32("int32")? as i64),
            Primitive::UInt32 => Value::UInt(r.read_u32("uint32")? as u64),
            Primitive::Int64 => Value::Int(r.read_i64("int64")?),
            Primitive::UInt64 => Value::UInt(r.read_u64("uint64")?),
            Primitive::Float32 => Value::Float(r.read_f32("float32")? as f64),
            Primitive::Float64 => Value::Float(r.read_f64("float64")?),
            Primitive::String => Value::String(r.read_string("string")?),
            Primitive::Time => Value::Time(r.read_time("time")?),
            Primitive::Duration => Value::Duration {
                sec: r.read_i32("duration")?,
                nsec: r.read_i32("duration")?,
            },
        })
    }
}

fn parse_field_line(owner: &str, package: &str, line: &str, known: &[String]) -> BagResult<Option<Field>> {
    // constants carry no wire data; their string values may contain '#'
    let eq = line.find('=');
    let hash = line.find('#');
    if let Some(eq) = eq
        && hash.is_none_or(|h| eq < h)
    {
        return Ok(None);
    }
    let code = match hash {
        Some(h) => &line[..h],
        None => line,
    }
    .trim();
    if code.is_empty() {
        return Ok(None);
    }

    let caps = FIELD_RE.captures(code).ok_or_else(|| BagError::MsgDefinition {
        msg_type: owner.to_string(),
        reason: format!("cannot parse line '{code}'"),
    })?;
    let type_name = &caps[1];
    let arity = match caps.get(2) {
        None => Arity::Single,
        Some(m) if m.as_str().is_empty() => Arity::Variable,
        Some(m) => Arity::Fixed(m.as_str().parse().map_err(|_| BagError::MsgDefinition {
            msg_type: owner.to_string(),
            reason: format!("bad array size in '{code}'"),
        })?),
    };

    Ok(Some(Field {
        name: caps[3].to_string(),
        ty: resolve_type(type_name, package, known),
        arity,
    }))
}

fn resolve_type(name: &str, package: &str, known: &[String]) -> FieldType {
    if let Some(p) = Primitive::from_name(name) {
        return FieldType::Primitive(p);
    }
    if name == "Header" {
        return FieldType::Complex("std_msgs/Header".to_string());
    }
    if name.contains('/') {
        return FieldType::Complex(name.to_string());
    }
    let local = format!("{package}/{name}");
    if known.contains(&local) {
        return FieldType::Complex(local);
    }
    let suffix = format!("/{name}");
    match known.iter().find(|k| k.ends_with(&suffix)) {
        Some(k) => FieldType::Complex(k.clone()),
        None => FieldType::Complex(local),
    }
}
