//! Named actions and their parameter defaults.
//!
//! # Design
//! Every resource type starts from the same five actions (`get`, `save`,
//! `query`, `remove`, `delete`). Declared actions are merged over that set
//! with [`merge_actions`], a pure function, and the result is frozen in an
//! [`ActionRegistry`] shared by every call and every bound copy of the type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::http::{HttpMethod, UnknownMethod};
use crate::template::{ParamValues, Template};

/// Default parameter values keyed by name.
pub type ParamDefaults = BTreeMap<String, ParamDefault>;

/// Where a default parameter value comes from.
#[derive(Clone)]
pub enum ParamDefault {
    /// A fixed value.
    Value(Value),
    /// Computed at request time.
    Lazy(Arc<dyn Fn() -> Value + Send + Sync>),
    /// Read from the data of the instance being sent. Absent when the call
    /// carries no data or the accessor returns `None`.
    Field(Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>),
}

impl ParamDefault {
    pub fn lazy(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        ParamDefault::Lazy(Arc::new(f))
    }

    pub fn field(f: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        ParamDefault::Field(Arc::new(f))
    }

    /// Resolve against the data of the current call, if any.
    pub fn resolve(&self, data: Option<&Value>) -> Value {
        match self {
            ParamDefault::Value(value) => value.clone(),
            ParamDefault::Lazy(f) => f(),
            ParamDefault::Field(f) => data.and_then(|d| f(d)).unwrap_or(Value::Null),
        }
    }
}

impl fmt::Debug for ParamDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ParamDefault::Lazy(_) => f.write_str("Lazy(..)"),
            ParamDefault::Field(_) => f.write_str("Field(..)"),
        }
    }
}

impl<T: Into<Value>> From<T> for ParamDefault {
    fn from(value: T) -> Self {
        ParamDefault::Value(value.into())
    }
}

/// Resolve defaults against call data. Action-level defaults win over
/// type-level ones.
pub fn extract_params(
    defaults: &ParamDefaults,
    action_params: &ParamDefaults,
    data: Option<&Value>,
) -> ParamValues {
    defaults
        .iter()
        .chain(action_params.iter())
        .map(|(name, default)| (name.clone(), default.resolve(data)))
        .collect()
}

/// Declaration of one action.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub method: HttpMethod,
    /// Replaces the resource type's URL template for this action.
    pub url: Option<Template>,
    /// Responses are arrays; each element becomes its own instance.
    pub is_array: bool,
    pub params: ParamDefaults,
    pub headers: Vec<(String, String)>,
}

impl ActionSpec {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            url: None,
            is_array: false,
            params: ParamDefaults::new(),
            headers: Vec::new(),
        }
    }

    /// Build from a method name in any case, e.g. `"patch"`.
    pub fn with_method(method: &str) -> Result<Self, UnknownMethod> {
        Ok(Self::new(method.parse()?))
    }

    pub fn url(mut self, template: &str) -> Self {
        self.url = Some(Template::compile(template));
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn param(mut self, name: &str, default: impl Into<ParamDefault>) -> Self {
        self.params.insert(name.to_string(), default.into());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// The action set every resource type starts from.
pub fn default_actions() -> BTreeMap<String, ActionSpec> {
    BTreeMap::from([
        ("get".to_string(), ActionSpec::new(HttpMethod::Get)),
        ("save".to_string(), ActionSpec::new(HttpMethod::Post)),
        ("query".to_string(), ActionSpec::new(HttpMethod::Get).array()),
        ("remove".to_string(), ActionSpec::new(HttpMethod::Delete)),
        ("delete".to_string(), ActionSpec::new(HttpMethod::Delete)),
    ])
}

/// Overlay `overrides` on `defaults`; an override replaces the whole action.
pub fn merge_actions(
    defaults: &BTreeMap<String, ActionSpec>,
    overrides: &BTreeMap<String, ActionSpec>,
) -> BTreeMap<String, ActionSpec> {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(name, spec)| (name.clone(), spec.clone())));
    merged
}

/// A registered action.
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub spec: ActionSpec,
    pub has_body: bool,
}

/// The frozen set of actions of a resource type.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Action>,
}

impl ActionRegistry {
    /// Merge `overrides` over [`default_actions`] and freeze the result.
    pub fn new(overrides: &BTreeMap<String, ActionSpec>) -> Self {
        let actions = merge_actions(&default_actions(), overrides)
            .into_iter()
            .map(|(name, spec)| {
                let action = Action {
                    name: name.clone(),
                    has_body: spec.method.has_body(),
                    spec,
                };
                (name, action)
            })
            .collect();
        Self { actions }
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}
