//! The value environment templates read from and define into.
//!
//! [`ValueEnvironment`] is the narrow capability the renderer consumes;
//! [`Variables`] is the default implementation: an insertion-ordered map with
//! a pluggable name validator and a registry of host methods callable from
//! expressions (`x => x.greet("world")`).

use std::fmt;
use std::sync::Arc;

use fxhash::FxHashMap;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::expr::{EvalError, EvalResult, Value};

lazy_static! {
    /// Token name grammar: a letter, then letters, digits or underscores,
    /// optionally ending in a single `[n]` index.
    static ref NAME_PATTERN: Regex =
        Regex::new(r"^\p{L}[\p{L}\p{Nd}_]*(?:\[[0-9]+\])?$").expect("valid name pattern");

    static ref INDEXED_NAME: Regex =
        Regex::new(r"^(.+)\[([0-9]+)\]$").expect("valid index pattern");
}

/// Check a token name against the default grammar.
///
/// `name`, `first_name2` and `people[2]` are valid; `2name`, `a-b`,
/// `people[2][3]` and `people[-1]` are not.
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// A host function exposed to expressions.
pub type HostMethod = Arc<dyn Fn(&[Value]) -> EvalResult<Value> + Send + Sync>;

/// Predicate deciding whether a token name is acceptable.
pub type NameValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Capability the renderer consumes to read and write template values.
pub trait ValueEnvironment {
    /// Look up a value by name.
    fn try_get(&self, name: &str) -> Option<Value>;

    /// Bind `name` to `value`, replacing any previous binding.
    fn set(&mut self, name: &str, value: Value);

    /// Remove a binding, returning the previous value.
    fn remove(&mut self, name: &str) -> Option<Value>;

    fn contains(&self, name: &str) -> bool {
        self.try_get(name).is_some()
    }

    /// Invoke a named host method.
    fn invoke_method(&self, name: &str, args: Vec<Value>) -> EvalResult<Value>;

    /// Whether `name` is a legal token name.
    fn is_valid_name(&self, name: &str) -> bool {
        is_valid_name(name)
    }
}

/// Default value environment.
#[derive(Clone)]
pub struct Variables {
    /// Bindings (IndexMap preserves insertion order)
    values: IndexMap<String, Value>,
    methods: FxHashMap<String, HostMethod>,
    validator: Option<NameValidator>,
}

impl Variables {
    pub fn new() -> Self {
        Self {
            values: IndexMap::new(),
            methods: FxHashMap::default(),
            validator: None,
        }
    }

    /// Builder-style binding.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Register a host method callable as `x.name(args)` from expressions.
    pub fn register_method<F>(&mut self, name: impl Into<String>, method: F)
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
    }

    /// Replace the default name grammar.
    pub fn set_validator<F>(&mut self, validator: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
    }

    /// Load bindings from a JSON object.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let map: IndexMap<String, serde_json::Value> = serde_json::from_str(text)?;
        let mut vars = Self::new();
        for (name, value) in map {
            vars.insert(name, Value::from(value));
        }
        Ok(vars)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("Variables")
            .field("values", &self.values)
            .field("methods", &methods)
            .field("custom_validator", &self.validator.is_some())
            .finish()
    }
}

impl ValueEnvironment for Variables {
    fn try_get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        // `people[2]` falls back to the third element of a list named `people`
        let captures = INDEXED_NAME.captures(name)?;
        let base = self.values.get(captures.get(1)?.as_str())?;
        let index: i64 = captures.get(2)?.as_str().parse().ok()?;
        base.index(index).ok()
    }

    fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    fn invoke_method(&self, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| EvalError::undefined_method(name))?;
        method(&args)
    }

    fn is_valid_name(&self, name: &str) -> bool {
        match &self.validator {
            Some(validator) => validator(name),
            None => is_valid_name(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_grammar() {
        for name in ["a", "name", "first_name2", "people[2]", "über", "x[0]"] {
            assert!(is_valid_name(name), "{} should be valid", name);
        }
        for name in [
            "", "2name", "_a", "a-b", "a b", "people[2][3]", "people[-1]", "people[]", "a[1]b",
            "a.b",
        ] {
            assert!(!is_valid_name(name), "{} should be invalid", name);
        }
    }

    #[test]
    fn test_insertion_order_preserved() {
        let vars = Variables::new().with("b", "2").with("a", "1").with("c", "3");
        let names: Vec<&str> = vars.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_indexed_lookup() {
        let vars = Variables::new().with("people", vec!["ann", "bob", "cy"]);
        assert_eq!(vars.try_get("people[1]"), Some(Value::from("bob")));
        assert_eq!(vars.try_get("people[9]"), None);
        assert_eq!(vars.try_get("nobody[0]"), None);
    }

    #[test]
    fn test_exact_key_wins_over_index() {
        let vars = Variables::new()
            .with("items", vec!["a", "b"])
            .with("items[0]", "explicit");
        assert_eq!(vars.try_get("items[0]"), Some(Value::from("explicit")));
    }

    #[test]
    fn test_host_methods() {
        let mut vars = Variables::new();
        vars.register_method("greet", |args| {
            let who = args.first().map(Value::display).unwrap_or_default();
            Ok(Value::Str(format!("hello {}", who)))
        });
        assert_eq!(
            vars.invoke_method("greet", vec![Value::from("bob")]).unwrap(),
            Value::from("hello bob")
        );
        assert!(vars.invoke_method("missing", vec![]).is_err());
    }

    #[test]
    fn test_custom_validator() {
        let mut vars = Variables::new();
        assert!(!vars.is_valid_name("a-b"));
        vars.set_validator(|name| !name.is_empty());
        assert!(vars.is_valid_name("a-b"));
    }

    #[test]
    fn test_from_json() {
        let vars = Variables::from_json(r#"{"who": "us", "n": 3, "list": [1, 2]}"#).unwrap();
        assert_eq!(vars.get("who"), Some(&Value::from("us")));
        assert_eq!(vars.get("n"), Some(&Value::Int(3)));
        assert_eq!(vars.try_get("list[1]"), Some(Value::Int(2)));
    }

    #[test]
    fn test_from_json_keeps_document_order() {
        let vars = Variables::from_json(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        let names: Vec<&str> = vars.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_remove() {
        let mut vars = Variables::new().with("a", "1");
        assert_eq!(vars.remove("a"), Some(Value::from("1")));
        assert!(!vars.contains("a"));
    }
}
