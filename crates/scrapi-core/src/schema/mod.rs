//! Declarative schema language for candidate inputs and outputs.
//!
//! Schema text is parsed into a [`SchemaType`] tree and interpreted against
//! `serde_json::Value`s; it is never executed. Example:
//!
//! ```text
//! array<{name: string(1..), picture_url?: string}>
//! ```
//!
//! Objects are open: keys the schema does not mention are allowed. An
//! optional field may be absent or `null`.

mod parser;

pub use parser::{parse, MAX_DEPTH};

use serde_json::Value;
use std::fmt;

/// Errors raised while parsing schema text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema is empty")]
    Empty,

    #[error("schema syntax error: {0}")]
    Syntax(String),

    #[error("unknown type name: {0}")]
    UnknownType(String),

    #[error("duplicate field: {0}")]
    DuplicateField(String),
}

/// Inclusive `min..max` bounds. For strings and arrays they bound the length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl Bounds {
    fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    fn contains(&self, n: f64) -> bool {
        self.min.map_or(true, |m| n >= m as f64) && self.max.map_or(true, |m| n <= m as f64)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            return Ok(());
        }
        f.write_str("(")?;
        if let Some(min) = self.min {
            write!(f, "{min}")?;
        }
        f.write_str("..")?;
        if let Some(max) = self.max {
            write!(f, "{max}")?;
        }
        f.write_str(")")
    }
}

/// One field of an object type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub optional: bool,
    pub ty: SchemaType,
}

/// A parsed schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    String(Bounds),
    Number(Bounds),
    Integer(Bounds),
    Boolean,
    Null,
    Any,
    Array { item: Box<SchemaType>, len: Bounds },
    /// Object with arbitrary keys whose values all match the inner type.
    Record(Box<SchemaType>),
    Object(Vec<Field>),
    /// Exact string value.
    Literal(String),
    Union(Vec<SchemaType>),
}

impl std::str::FromStr for SchemaType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::String(b) => write!(f, "string{b}"),
            SchemaType::Number(b) => write!(f, "number{b}"),
            SchemaType::Integer(b) => write!(f, "integer{b}"),
            SchemaType::Boolean => f.write_str("boolean"),
            SchemaType::Null => f.write_str("null"),
            SchemaType::Any => f.write_str("any"),
            SchemaType::Array { item, len } => write!(f, "array<{item}>{len}"),
            SchemaType::Record(v) => write!(f, "record<{v}>"),
            SchemaType::Object(fields) => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    let opt = if field.optional { "?" } else { "" };
                    if is_plain_key(&field.name) {
                        write!(f, "{}{opt}: {}", field.name, field.ty)?;
                    } else {
                        write!(f, "{:?}{opt}: {}", field.name, field.ty)?;
                    }
                }
                f.write_str("}")
            }
            SchemaType::Literal(s) => write!(f, "{s:?}"),
            SchemaType::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    if matches!(m, SchemaType::Union(_)) {
                        write!(f, "({m})")?;
                    } else {
                        write!(f, "{m}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// A value did not match its schema.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// JSON path of the offending value, e.g. `$[0].name`.
    pub path: String,
    pub message: String,
}

impl SchemaType {
    /// Check `value` against this schema, reporting the first mismatch.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let mut path = String::from("$");
        self.check(value, &mut path)
    }

    fn check(&self, value: &Value, path: &mut String) -> Result<(), ValidationError> {
        match self {
            SchemaType::Any => Ok(()),
            SchemaType::Null => match value {
                Value::Null => Ok(()),
                other => fail(path, format!("expected null, got {}", kind_of(other))),
            },
            SchemaType::Boolean => match value {
                Value::Bool(_) => Ok(()),
                other => fail(path, format!("expected boolean, got {}", kind_of(other))),
            },
            SchemaType::String(bounds) => match value {
                Value::String(s) => {
                    let len = s.chars().count();
                    if bounds.contains(len as f64) {
                        Ok(())
                    } else {
                        fail(path, format!("string length {len} outside {bounds}"))
                    }
                }
                other => fail(path, format!("expected string, got {}", kind_of(other))),
            },
            SchemaType::Number(bounds) => match value.as_f64() {
                Some(n) if bounds.contains(n) => Ok(()),
                Some(n) => fail(path, format!("number {n} outside {bounds}")),
                None => fail(path, format!("expected number, got {}", kind_of(value))),
            },
            SchemaType::Integer(bounds) => match value.as_f64() {
                Some(n) if n.fract() == 0.0 && bounds.contains(n) => Ok(()),
                Some(n) if n.fract() == 0.0 => fail(path, format!("integer {n} outside {bounds}")),
                Some(n) => fail(path, format!("expected integer, got {n}")),
                None => fail(path, format!("expected integer, got {}", kind_of(value))),
            },
            SchemaType::Literal(expected) => match value {
                Value::String(s) if s == expected => Ok(()),
                other => fail(path, format!("expected {expected:?}, got {other}")),
            },
            SchemaType::Array { item, len } => {
                let Value::Array(items) = value else {
                    return fail(path, format!("expected array, got {}", kind_of(value)));
                };
                if !len.contains(items.len() as f64) {
                    return fail(path, format!("array length {} outside {len}", items.len()));
                }
                for (i, v) in items.iter().enumerate() {
                    let mark = path.len();
                    path.push_str(&format!("[{i}]"));
                    item.check(v, path)?;
                    path.truncate(mark);
                }
                Ok(())
            }
            SchemaType::Record(inner) => {
                let Value::Object(map) = value else {
                    return fail(path, format!("expected object, got {}", kind_of(value)));
                };
                for (k, v) in map {
                    let mark = path.len();
                    push_key(path, k);
                    inner.check(v, path)?;
                    path.truncate(mark);
                }
                Ok(())
            }
            SchemaType::Object(fields) => {
                let Value::Object(map) = value else {
                    return fail(path, format!("expected object, got {}", kind_of(value)));
                };
                for field in fields {
                    let mark = path.len();
                    push_key(path, &field.name);
                    match map.get(&field.name) {
                        None | Some(Value::Null) if field.optional => {}
                        None => return fail(path, "required field is missing".to_string()),
                        Some(v) => field.ty.check(v, path)?,
                    }
                    path.truncate(mark);
                }
                Ok(())
            }
            SchemaType::Union(members) => {
                let matched = members.iter().any(|m| {
                    let mut scratch = path.clone();
                    m.check(value, &mut scratch).is_ok()
                });
                if matched {
                    Ok(())
                } else {
                    fail(path, format!("expected {self}, got {}", kind_of(value)))
                }
            }
        }
    }
}

fn fail(path: &str, message: String) -> Result<(), ValidationError> {
    Err(ValidationError {
        path: path.to_string(),
        message,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn push_key(path: &mut String, key: &str) {
    if is_plain_key(key) {
        path.push('.');
        path.push_str(key);
    } else {
        path.push_str(&format!("[{key:?}]"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(src: &str) -> SchemaType {
        parse(src).unwrap()
    }

    #[test]
    fn test_valid_hosts_array() {
        let ty = schema("array<{name: string(1..), picture_url?: string}>");
        let value = json!([
            {"name": "Ana", "picture_url": "https://x.test/a.png", "extra": 1},
            {"name": "Bo", "picture_url": null}
        ]);
        assert!(ty.validate(&value).is_ok());
        assert!(ty.validate(&json!([])).is_ok());
    }

    #[test]
    fn test_error_path_points_at_field() {
        let ty = schema("array<{name: string(1..)}>");
        let err = ty.validate(&json!([{"name": "ok"}, {"name": ""}])).unwrap_err();
        assert_eq!(err.path, "$[1].name");
        assert!(err.message.contains("length 0"));

        let err = ty.validate(&json!([{}])).unwrap_err();
        assert_eq!(err.path, "$[0].name");
        assert_eq!(err.to_string(), "$[0].name: required field is missing");
    }

    #[test]
    fn test_numbers_and_integers() {
        assert!(schema("integer").validate(&json!(3)).is_ok());
        assert!(schema("integer").validate(&json!(3.0)).is_ok());
        assert!(schema("integer").validate(&json!(3.5)).is_err());
        assert!(schema("number(0..1)").validate(&json!(0.5)).is_ok());
        assert!(schema("number(0..1)").validate(&json!(2)).is_err());
        assert!(schema("number").validate(&json!("1")).is_err());
    }

    #[test]
    fn test_union_and_literal() {
        let ty = schema(r#""open" | "closed" | null"#);
        assert!(ty.validate(&json!("open")).is_ok());
        assert!(ty.validate(&Value::Null).is_ok());
        let err = ty.validate(&json!("other")).unwrap_err();
        assert_eq!(err.path, "$");
        assert!(err.message.starts_with("expected \"open\" | \"closed\" | null"));
    }

    #[test]
    fn test_record_paths_quote_odd_keys() {
        let ty = schema("record<integer>");
        let err = ty.validate(&json!({"a": 1, "b c": "x"})).unwrap_err();
        assert_eq!(err.path, "$[\"b c\"]");
    }

    #[test]
    fn test_array_length_bounds() {
        let ty = schema("array<any>(1..2)");
        assert!(ty.validate(&json!([])).is_err());
        assert!(ty.validate(&json!([1, 2])).is_ok());
        assert!(ty.validate(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_display_reparses() {
        let src = r#"array<{name: string(1..), "odd key"?: integer | null, tags: string[]}>(..10)"#;
        let ty = schema(src);
        let printed = ty.to_string();
        assert_eq!(schema(&printed), ty);
    }
}
