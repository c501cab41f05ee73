//! Value crating for WAMP transport
//!
//! JSON objects do not reliably keep key order on the wire and cannot carry
//! keys with a leading NUL byte, so associative arrays gain a
//! `__debug_key_order__` list and such keys are sent as `_b64_:<base64>`.
//! Objects are sent as class name plus properties; the class definition
//! itself is queued once per class.

use crate::core::{ArrayKey, ClassDefinition, LogEntry, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value as Json};
use std::collections::HashSet;
use std::path::Path;

pub const KEY_ORDER_FIELD: &str = "__debug_key_order__";
pub const B64_KEY_PREFIX: &str = "_b64_:";

#[derive(Debug, Default)]
pub struct WampCrate {
    sent_classes: HashSet<String>,
    pending: Vec<ClassDefinition>,
    detect_files: bool,
    found_files: Vec<String>,
}

/// Crated arguments of one entry
#[derive(Debug, Clone, PartialEq)]
pub struct CratedEntry {
    pub args: Vec<Json>,
    /// Definitions of classes not sent before, in discovery order
    pub class_definitions: Vec<ClassDefinition>,
    /// String arguments naming existing files (`detectFiles`)
    pub found_files: Vec<String>,
}

impl WampCrate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crate_entry(&mut self, entry: &LogEntry) -> CratedEntry {
        self.detect_files = entry.meta.detect_files();
        self.found_files.clear();
        let args = entry.args.iter().map(|arg| self.crate_value(arg)).collect();
        self.detect_files = false;
        CratedEntry {
            args,
            class_definitions: std::mem::take(&mut self.pending),
            found_files: std::mem::take(&mut self.found_files),
        }
    }

    pub fn crate_value(&mut self, value: &Value) -> Json {
        match value {
            Value::String(s) => {
                if self.detect_files && !self.found_files.contains(s) && Path::new(s).is_file() {
                    self.found_files.push(s.clone());
                }
                Json::String(s.clone())
            }
            Value::Array(items) if Value::is_list(items) => {
                Json::Array(items.iter().map(|(_, v)| self.crate_value(v)).collect())
            }
            Value::Array(items) => {
                let mut map = Map::new();
                let mut order = Vec::with_capacity(items.len());
                for (key, v) in items {
                    let key = crate_key(key);
                    order.push(Json::String(key.clone()));
                    let crated = self.crate_value(v);
                    map.insert(key, crated);
                }
                map.insert(KEY_ORDER_FIELD.to_string(), Json::Array(order));
                Json::Object(map)
            }
            Value::Object(obj) => {
                if self.sent_classes.insert(obj.class_name.clone()) {
                    self.pending.push(obj.definition());
                }
                let mut properties = Map::new();
                for (name, v) in &obj.properties {
                    let crated = self.crate_value(v);
                    properties.insert(name.clone(), crated);
                }
                let mut map = Map::new();
                map.insert("___class_name".to_string(), Json::String(obj.class_name.clone()));
                map.insert("properties".to_string(), Json::Object(properties));
                Json::Object(map)
            }
            other => other.to_json(),
        }
    }
}

fn crate_key(key: &ArrayKey) -> String {
    match key {
        ArrayKey::Str(s) if s.starts_with('\0') => {
            format!("{}{}", B64_KEY_PREFIX, STANDARD.encode(s.as_bytes()))
        }
        other => other.to_string(),
    }
}
