use std::collections::BTreeMap;

/// The kind of value an [`crate::option::Opt`] stores, and therefore how
/// many arguments it consumes and how those arguments are interpreted. See
/// the option model save semantics in `option.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Increment,
    String,
    Int,
    Float,
    StringOptional,
    IntOptional,
    FloatOptional,
    StringRepeat,
    IntRepeat,
    FloatRepeat,
    StringMap,
}

impl OptionKind {
    /// Whether this kind ever consumes an inline/following argument.
    pub fn expects_value(self) -> bool {
        !matches!(self, OptionKind::Bool | OptionKind::Increment)
    }

    /// Whether this kind accumulates more than one value.
    pub fn is_repeat(self) -> bool {
        matches!(
            self,
            OptionKind::StringRepeat
                | OptionKind::IntRepeat
                | OptionKind::FloatRepeat
                | OptionKind::StringMap
        )
    }
}

/// A bound option value. `BTreeMap` is used for `StringMap` so iteration
/// order (help rendering, tests) is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StringMap(BTreeMap<String, String>),
    None,
}

impl Value {
    pub fn default_for(kind: OptionKind) -> Self {
        match kind {
            OptionKind::Bool => Value::Bool(false),
            OptionKind::Increment => Value::Int(0),
            OptionKind::String | OptionKind::StringOptional => Value::None,
            OptionKind::Int | OptionKind::IntOptional => Value::None,
            OptionKind::Float | OptionKind::FloatOptional => Value::None,
            OptionKind::StringRepeat => Value::StringList(Vec::new()),
            OptionKind::IntRepeat => Value::IntList(Vec::new()),
            OptionKind::FloatRepeat => Value::FloatList(Vec::new()),
            OptionKind::StringMap => Value::StringMap(BTreeMap::new()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            Value::StringList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            Value::IntList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_float_list(&self) -> Option<&[f64]> {
        match self {
            Value::FloatList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_string_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Value::StringMap(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
            Value::StringList(v) => write!(f, "{}", v.join(",")),
            Value::IntList(v) => write!(
                f,
                "{}",
                v.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
            ),
            Value::FloatList(v) => write!(
                f,
                "{}",
                v.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
            ),
            Value::StringMap(m) => write!(
                f,
                "{}",
                m.iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Value::None => write!(f, ""),
        }
    }
}
