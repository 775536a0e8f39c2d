//! The option model (component C1): a typed option value with validation,
//! save semantics, aliases, env-var binding, and help metadata.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::value::{OptionKind, Value};

/// A single declared option. Wrapped in [`OptHandle`] so the same option
/// can be reached — and mutated — from every command node that inherited
/// it (spec.md §9: "a handle ... stored by the option and returned by
/// `Value`; children receive the same handle").
#[derive(Debug, Clone)]
pub struct Opt {
    name: String,
    aliases: Vec<String>,
    kind: OptionKind,
    value: Value,
    default_string: Option<String>,
    description: Option<String>,
    help_argname: Option<String>,
    env_var: Option<String>,
    required: bool,
    required_error: Option<String>,
    valid_values: Vec<String>,
    min_args: usize,
    max_args: usize,
    optional_arg: bool,
    called: bool,
    used_alias: Option<String>,
}

/// Shared handle to an [`Opt`]. Cloning an `OptHandle` shares the same
/// underlying cell, so a value set through any handle is observable
/// through all of them — this is what makes parent/child option sharing
/// (spec.md §3 invariant (b) in `ProgramNode`) work without copying data.
pub type OptHandle = Rc<RefCell<Opt>>;

impl Opt {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> OptHandle {
        let name = name.into();
        let (min_args, max_args) = match kind {
            OptionKind::Bool | OptionKind::Increment => (0, 0),
            OptionKind::String
            | OptionKind::Int
            | OptionKind::Float
            | OptionKind::StringOptional
            | OptionKind::IntOptional
            | OptionKind::FloatOptional => (1, 1),
            OptionKind::StringRepeat | OptionKind::IntRepeat | OptionKind::FloatRepeat => {
                (1, usize::MAX)
            }
            OptionKind::StringMap => (1, usize::MAX),
        };
        Rc::new(RefCell::new(Opt {
            aliases: vec![name.clone()],
            name,
            kind,
            value: Value::default_for(kind),
            default_string: None,
            description: None,
            help_argname: None,
            env_var: None,
            required: false,
            required_error: None,
            valid_values: Vec::new(),
            min_args,
            max_args,
            optional_arg: matches!(
                kind,
                OptionKind::StringOptional | OptionKind::IntOptional | OptionKind::FloatOptional
            ),
            called: false,
            used_alias: None,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn add_alias(&mut self, alias: impl Into<String>) -> &mut Self {
        let alias = alias.into();
        if !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn help_argname(&self) -> &str {
        self.help_argname.as_deref().unwrap_or("value")
    }

    pub fn set_help_argname(&mut self, name: impl Into<String>) -> &mut Self {
        self.help_argname = Some(name.into());
        self
    }

    pub fn default_string(&self) -> Option<&str> {
        self.default_string.as_deref()
    }

    pub fn set_default_string(&mut self, s: impl Into<String>) -> &mut Self {
        self.default_string = Some(s.into());
        self
    }

    pub fn env_var(&self) -> Option<&str> {
        self.env_var.as_deref()
    }

    pub fn set_env_var(&mut self, var: impl Into<String>) -> &mut Self {
        self.env_var = Some(var.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn set_required(&mut self, error: Option<String>) -> &mut Self {
        self.required = true;
        self.required_error = error;
        self
    }

    pub fn set_valid_values(&mut self, values: Vec<String>) -> &mut Self {
        self.valid_values = values;
        self
    }

    pub fn valid_values(&self) -> &[String] {
        &self.valid_values
    }

    pub fn set_min_max(&mut self, min: usize, max: usize) -> &mut Self {
        self.min_args = min;
        self.max_args = max;
        self
    }

    pub fn min_args(&self) -> usize {
        self.min_args
    }

    pub fn max_args(&self) -> usize {
        self.max_args
    }

    pub fn set_optional_arg(&mut self, optional: bool) -> &mut Self {
        self.optional_arg = optional;
        self
    }

    pub fn is_optional_arg(&self) -> bool {
        self.optional_arg
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn called(&self) -> bool {
        self.called
    }

    pub fn used_alias(&self) -> Option<&str> {
        self.used_alias.as_deref()
    }

    fn check_valid(&self, s: &str) -> Result<()> {
        if !self.valid_values.is_empty() && !self.valid_values.iter().any(|v| v == s) {
            return Err(Error::InvalidValue(
                s.to_string(),
                self.name.clone(),
                self.valid_values.clone(),
            ));
        }
        Ok(())
    }

    /// Applies the save semantics of spec.md §4.1 for this option's kind.
    /// `used_alias` is the literal token that triggered this save (a CLI
    /// flag or an env-var name); `lowercase_map_keys` mirrors the owning
    /// parser's `StringMap` key-casing configuration.
    pub fn save(
        &mut self,
        args: &[&str],
        used_alias: &str,
        lowercase_map_keys: bool,
    ) -> Result<()> {
        match self.kind {
            OptionKind::Bool => {
                self.value = match args.first() {
                    None => {
                        let default = self.default_string.as_deref() == Some("true");
                        Value::Bool(!default)
                    }
                    Some(s) => match s.to_ascii_lowercase().as_str() {
                        "true" => Value::Bool(true),
                        "false" => Value::Bool(false),
                        other => return Err(Error::ConvertToInt(other.to_string(), self.name.clone())),
                    },
                };
            }
            OptionKind::Increment => {
                let current = self.value.as_int().unwrap_or(0);
                self.value = Value::Int(current + 1);
            }
            OptionKind::String | OptionKind::StringOptional => {
                if let Some(s) = args.first() {
                    self.check_valid(s)?;
                    self.value = Value::String(s.to_string());
                }
            }
            OptionKind::Int | OptionKind::IntOptional => {
                if let Some(s) = args.first() {
                    self.check_valid(s)?;
                    let n: i64 = s
                        .parse()
                        .map_err(|_| Error::ConvertToInt(s.to_string(), self.name.clone()))?;
                    self.value = Value::Int(n);
                }
            }
            OptionKind::Float | OptionKind::FloatOptional => {
                if let Some(s) = args.first() {
                    self.check_valid(s)?;
                    let n: f64 = s
                        .parse()
                        .map_err(|_| Error::ConvertToFloat(s.to_string(), self.name.clone()))?;
                    self.value = Value::Float(n);
                }
            }
            OptionKind::StringRepeat => {
                let mut list = match std::mem::replace(&mut self.value, Value::None) {
                    Value::StringList(v) => v,
                    _ => Vec::new(),
                };
                for s in args {
                    self.check_valid(s)?;
                    list.push(s.to_string());
                }
                self.value = Value::StringList(list);
            }
            OptionKind::IntRepeat => {
                let mut list = match std::mem::replace(&mut self.value, Value::None) {
                    Value::IntList(v) => v,
                    _ => Vec::new(),
                };
                for s in args {
                    self.check_valid(s)?;
                    list.extend(parse_int_repeat_arg(s, &self.name)?);
                }
                self.value = Value::IntList(list);
            }
            OptionKind::FloatRepeat => {
                let mut list = match std::mem::replace(&mut self.value, Value::None) {
                    Value::FloatList(v) => v,
                    _ => Vec::new(),
                };
                for s in args {
                    self.check_valid(s)?;
                    let n: f64 = s
                        .parse()
                        .map_err(|_| Error::ConvertToFloat(s.to_string(), self.name.clone()))?;
                    list.push(n);
                }
                self.value = Value::FloatList(list);
            }
            OptionKind::StringMap => {
                let mut map = match std::mem::replace(&mut self.value, Value::None) {
                    Value::StringMap(m) => m,
                    _ => Default::default(),
                };
                for s in args {
                    let mut parts = s.splitn(2, '=');
                    let key = parts.next().unwrap_or("");
                    let val = match parts.next() {
                        Some(v) => v,
                        None => {
                            return Err(Error::ArgumentIsNotKeyValue(s.to_string(), self.name.clone()))
                        }
                    };
                    self.check_valid(val)?;
                    let key = if lowercase_map_keys {
                        key.to_ascii_lowercase()
                    } else {
                        key.to_string()
                    };
                    map.insert(key, val.to_string());
                }
                self.value = Value::StringMap(map);
            }
        }

        self.called = true;
        self.used_alias = Some(used_alias.to_string());
        Ok(())
    }

    /// spec.md §4.1 `CheckRequired`.
    pub fn check_required(&self) -> Result<()> {
        if self.required && !self.called {
            return Err(Error::MissingRequiredOption(
                self.name.clone(),
                self.required_error.clone(),
            ));
        }
        Ok(())
    }
}

/// Expands an `IntRepeat` argument: either a decimal integer, or an
/// inclusive range `a..b` with `a <= b`.
fn parse_int_repeat_arg(s: &str, option_name: &str) -> Result<Vec<i64>> {
    if let Some((lo, hi)) = s.split_once("..") {
        let lo: i64 = lo
            .parse()
            .map_err(|_| Error::ConvertToInt(s.to_string(), option_name.to_string()))?;
        let hi: i64 = hi
            .parse()
            .map_err(|_| Error::ConvertToInt(s.to_string(), option_name.to_string()))?;
        if lo > hi {
            return Err(Error::ConvertToInt(s.to_string(), option_name.to_string()));
        }
        Ok((lo..=hi).collect())
    } else {
        let n: i64 = s
            .parse()
            .map_err(|_| Error::ConvertToInt(s.to_string(), option_name.to_string()))?;
        Ok(vec![n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_flips_default_with_zero_args() {
        let opt = Opt::new("verbose", OptionKind::Bool);
        opt.borrow_mut().save(&[], "-v", false).unwrap();
        assert_eq!(opt.borrow().value().as_bool(), Some(true));
    }

    #[test]
    fn bool_literal_overrides() {
        let opt = Opt::new("verbose", OptionKind::Bool);
        opt.borrow_mut().save(&["false"], "--verbose", false).unwrap();
        assert_eq!(opt.borrow().value().as_bool(), Some(false));
    }

    #[test]
    fn increment_accumulates() {
        let opt = Opt::new("v", OptionKind::Increment);
        opt.borrow_mut().save(&[], "-v", false).unwrap();
        opt.borrow_mut().save(&[], "-v", false).unwrap();
        opt.borrow_mut().save(&[], "-v", false).unwrap();
        assert_eq!(opt.borrow().value().as_int(), Some(3));
    }

    #[test]
    fn int_repeat_expands_range() {
        let opt = Opt::new("int", OptionKind::IntRepeat);
        opt.borrow_mut().save(&["1..5"], "--int", false).unwrap();
        assert_eq!(opt.borrow().value().as_int_list(), Some([1, 2, 3, 4, 5].as_slice()));
    }

    #[test]
    fn int_repeat_reversed_range_fails() {
        let opt = Opt::new("int", OptionKind::IntRepeat);
        let err = opt.borrow_mut().save(&["5..1"], "--int", false).unwrap_err();
        assert_matches::assert_matches!(err, Error::ConvertToInt(_, _));
    }

    #[test]
    fn string_map_lowercases_keys_when_configured() {
        let opt = Opt::new("m", OptionKind::StringMap);
        opt.borrow_mut()
            .save(&["Key1=v1", "kEy2=v2"], "--m", true)
            .unwrap();
        let map = opt.borrow().value().as_string_map().cloned().unwrap();
        assert_eq!(map.get("key1").map(String::as_str), Some("v1"));
        assert_eq!(map.get("key2").map(String::as_str), Some("v2"));
    }

    #[test]
    fn string_map_rejects_malformed_pair() {
        let opt = Opt::new("m", OptionKind::StringMap);
        let err = opt.borrow_mut().save(&["nopair"], "--m", false).unwrap_err();
        assert_matches::assert_matches!(err, Error::ArgumentIsNotKeyValue(_, _));
    }

    #[test]
    fn check_required_reports_custom_text() {
        let opt = Opt::new("name", OptionKind::String);
        opt.borrow_mut().set_required(Some("pass --name".to_string()));
        let err = opt.borrow().check_required().unwrap_err();
        match err {
            Error::MissingRequiredOption(name, Some(msg)) => {
                assert_eq!(name, "name");
                assert_eq!(msg, "pass --name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn called_becomes_true_on_save() {
        let opt = Opt::new("name", OptionKind::String);
        assert!(!opt.borrow().called());
        opt.borrow_mut().save(&["bob"], "--name", false).unwrap();
        assert!(opt.borrow().called());
        assert_eq!(opt.borrow().used_alias(), Some("--name"));
    }
}
