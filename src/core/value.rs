//! Tagged value tree
//!
//! Every argument of a [`LogEntry`](super::LogEntry) is normalized into a
//! [`Value`] before it reaches a route. Routes only ever see this closed set of
//! node kinds, which is also the allow-list used when serialized log data is
//! decoded again.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel emitted by [`Value::to_json`] for [`Value::Undefined`]
pub const UNDEFINED_TOKEN: &str = "\u{0}undefined\u{0}";
/// Sentinel emitted by [`Value::to_json`] for positive infinity
pub const INF_TOKEN: &str = "\u{0}INF\u{0}";
/// Sentinel emitted by [`Value::to_json`] for negative infinity
pub const NEG_INF_TOKEN: &str = "\u{0}-INF\u{0}";
/// Sentinel emitted by [`Value::to_json`] for NaN
pub const NAN_TOKEN: &str = "\u{0}NaN\u{0}";

/// Key of an array node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArrayKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{}", i),
            ArrayKey::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::Str(s.to_string())
    }
}

impl From<String> for ArrayKey {
    fn from(s: String) -> Self {
        ArrayKey::Str(s)
    }
}

impl From<i64> for ArrayKey {
    fn from(i: i64) -> Self {
        ArrayKey::Int(i)
    }
}

/// The shape of a class, shared by all of its instances
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDefinition {
    pub class_name: String,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
}

/// An object instance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectValue {
    pub class_name: String,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub properties: Vec<(String, Value)>,
}

impl ObjectValue {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_method(mut self, name: impl Into<String>) -> Self {
        self.methods.push(name.into());
        self
    }

    #[must_use]
    pub fn with_extends(mut self, parent: impl Into<String>) -> Self {
        self.extends.push(parent.into());
        self
    }

    #[must_use]
    pub fn with_implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    /// The class-level part of this instance
    pub fn definition(&self) -> ClassDefinition {
        ClassDefinition {
            class_name: self.class_name.clone(),
            extends: self.extends.clone(),
            implements: self.implements.clone(),
            methods: self.methods.clone(),
        }
    }
}

/// A normalized value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Undefined,
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float_repr")] f64),
    String(String),
    Array(Vec<(ArrayKey, Value)>),
    Object(Box<ObjectValue>),
    Resource(String),
    Callable(String),
}

impl Value {
    /// Build a list (keys `0..n`)
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (ArrayKey::Int(i as i64), v.into()))
                .collect(),
        )
    }

    /// Build an associative array preserving the given key order
    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<ArrayKey>,
        V: Into<Value>,
    {
        Value::Array(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Normalize any serializable value
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        SerdeNormalizer::default().normalize(value)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Resource(_) => "resource",
            Value::Callable(_) => "callable",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[(ArrayKey, Value)]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// True for arrays whose keys are exactly `0..n` in order
    pub fn is_list(items: &[(ArrayKey, Value)]) -> bool {
        items
            .iter()
            .enumerate()
            .all(|(i, (k, _))| *k == ArrayKey::Int(i as i64))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// Numeric value of ints, floats and numeric strings
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) if is_numeric_string(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// JSON projection used by the header, script and WAMP routes
    ///
    /// `Undefined` and non-finite floats become the sentinel strings
    /// ([`UNDEFINED_TOKEN`], [`INF_TOKEN`], ...) which each route replaces after
    /// encoding with whatever its target understands.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Undefined => Json::String(UNDEFINED_TOKEN.to_string()),
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Json::Number(n),
                None => Json::String(non_finite_token(*f).to_string()),
            },
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => {
                if Value::is_list(items) {
                    Json::Array(items.iter().map(|(_, v)| v.to_json()).collect())
                } else {
                    let mut map = serde_json::Map::new();
                    for (k, v) in items {
                        map.insert(k.to_string(), v.to_json());
                    }
                    Json::Object(map)
                }
            }
            Value::Object(obj) => {
                let mut map = serde_json::Map::new();
                map.insert(
                    "___class_name".to_string(),
                    Json::String(obj.class_name.clone()),
                );
                for (name, v) in &obj.properties {
                    map.insert(name.clone(), v.to_json());
                }
                Json::Object(map)
            }
            Value::Resource(desc) => Json::String(format!("resource: {}", desc)),
            Value::Callable(name) => Json::String(format!("callable: {}", name)),
        }
    }

    /// Plain-text rendering
    pub fn to_text(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.clone(),
            Value::Array(items) => {
                if Value::is_list(items) {
                    let inner: Vec<String> = items.iter().map(|(_, v)| v.to_text_nested()).collect();
                    format!("[{}]", inner.join(", "))
                } else {
                    let inner: Vec<String> = items
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k, v.to_text_nested()))
                        .collect();
                    format!("{{{}}}", inner.join(", "))
                }
            }
            Value::Object(obj) => {
                let inner: Vec<String> = obj
                    .properties
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.to_text_nested()))
                    .collect();
                format!("{} {{{}}}", obj.class_name, inner.join(", "))
            }
            Value::Resource(desc) => format!("resource({})", desc),
            Value::Callable(name) => format!("callable({})", name),
        }
    }

    /// Nested strings are quoted so `["a, b"]` stays unambiguous
    fn to_text_nested(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s),
            other => other.to_text(),
        }
    }
}

pub(crate) fn non_finite_token(f: f64) -> &'static str {
    if f.is_nan() {
        NAN_TOKEN
    } else if f > 0.0 {
        INF_TOKEN
    } else {
        NEG_INF_TOKEN
    }
}

pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF" } else { "-INF" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// True for strings that parse as a decimal number
pub fn is_numeric_string(s: &str) -> bool {
    let t = s.trim();
    !t.is_empty()
        && t.parse::<f64>().map(|f| f.is_finite()).unwrap_or(false)
        && t.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

mod float_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(f: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if f.is_finite() {
            serializer.serialize_f64(*f)
        } else {
            serializer.serialize_str(&super::format_float(*f))
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Str(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Num(f) => Ok(f),
            Repr::Str(s) => match s.as_str() {
                "INF" => Ok(f64::INFINITY),
                "-INF" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(serde::de::Error::custom(format!(
                    "invalid float token '{}'",
                    other
                ))),
            },
        }
    }
}

/// Converts host values into the [`Value`] tree
pub trait ValueNormalizer {
    fn normalize_json(&self, value: serde_json::Value) -> Value;

    fn normalize<T: Serialize + ?Sized>(&self, value: &T) -> Value
    where
        Self: Sized,
    {
        match serde_json::to_value(value) {
            Ok(json) => self.normalize_json(json),
            Err(err) => Value::String(format!("(unserializable: {})", err)),
        }
    }
}

/// Normalizer for anything implementing `serde::Serialize`
#[derive(Debug, Clone)]
pub struct SerdeNormalizer {
    max_depth: usize,
}

impl SerdeNormalizer {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn convert(&self, value: serde_json::Value, depth: usize) -> Value {
        use serde_json::Value as Json;
        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::String(s),
            Json::Array(_) | Json::Object(_) if depth >= self.max_depth => {
                Value::String("*MAX DEPTH*".to_string())
            }
            Json::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (ArrayKey::Int(i as i64), self.convert(v, depth + 1)))
                    .collect(),
            ),
            Json::Object(map) => Value::Array(
                map.into_iter()
                    .map(|(k, v)| (ArrayKey::Str(k), self.convert(v, depth + 1)))
                    .collect(),
            ),
        }
    }
}

impl Default for SerdeNormalizer {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ValueNormalizer for SerdeNormalizer {
    fn normalize_json(&self, value: serde_json::Value) -> Value {
        self.convert(value, 0)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Value::Int(i as i64)
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i).map(Value::Int).unwrap_or(Value::Float(i as f64))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::from(i as u64)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<ObjectValue> for Value {
    fn from(obj: ObjectValue) -> Self {
        Value::Object(Box::new(obj))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        SerdeNormalizer::default().normalize_json(json)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}
