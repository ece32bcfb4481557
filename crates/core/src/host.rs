use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A host-owned value: the snapshot handed over each tick, or anything
/// reachable from it through attribute reads and item lookups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<HostValue>),
    Object(BTreeMap<String, HostValue>),
}

pub static NULL: HostValue = HostValue::Null;

impl HostValue {
    pub fn object() -> Self {
        HostValue::Object(BTreeMap::new())
    }

    /// Builder helper: set an attribute on an object (no-op on other kinds).
    pub fn with(mut self, name: &str, value: impl Into<HostValue>) -> Self {
        if let HostValue::Object(map) = &mut self {
            map.insert(name.to_string(), value.into());
        }
        self
    }

    /// Attribute read. Borrows from `self`; nothing outlives the snapshot.
    pub fn attr(&self, name: &str) -> Option<&HostValue> {
        match self {
            HostValue::Object(map) => map.get(name),
            _ => None,
        }
    }

    /// Random-access item lookup on a sequence.
    pub fn item(&self, index: usize) -> Option<&HostValue> {
        match self {
            HostValue::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(v) => Some(*v),
            HostValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            HostValue::Float(v) => Some(*v),
            HostValue::Int(v) => Some(*v as f64),
            HostValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Truthiness of any value: zero, empty and null are false.
    pub fn is_true(&self) -> bool {
        match self {
            HostValue::Null => false,
            HostValue::Bool(b) => *b,
            HostValue::Int(v) => *v != 0,
            HostValue::Float(v) => *v != 0.0,
            HostValue::Str(s) => !s.is_empty(),
            HostValue::List(items) => !items.is_empty(),
            HostValue::Object(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Int(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Int(v as i64)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Str(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::Str(v)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(v: Vec<HostValue>) -> Self {
        HostValue::List(v)
    }
}

/// The host-side controlling object an agent answers to.
/// Not owned by the agent; the host keeps its own handle.
pub trait BotHandle {
    /// Synchronous query for the current ball trajectory forecast.
    fn ball_prediction(&self) -> Result<HostValue>;
}
