//! Dynamic values carried by configuration blocks, surfaces and instances.
//!
//! # Responsibility
//! - Represent block data (scalars, lists, ordered mappings).
//! - Carry the callable pieces of a configuration: methods, augments,
//!   constructor bodies, built classes and extension descriptors.
//!
//! # Invariants
//! - `Mapping` iteration follows insertion order; loop-mode blocks are
//!   applied in that order.
//! - Callable variants compare by pointer identity, data variants by value.

use crate::error::{FactoryError, FactoryResult};
use crate::extension::Extension;
use crate::model::class::{Class, Construction, Instance, Surface};
use indexmap::IndexMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Ordered block/member mapping.
pub type Mapping = IndexMap<String, Value>;

type MethodFn = dyn Fn(&Instance, &[Value]) -> FactoryResult<Value> + Send + Sync;
type AugmentFn = dyn Fn(&Surface) -> FactoryResult<()> + Send + Sync;
type ConstructorBody = dyn Fn(&Construction<'_>) -> FactoryResult<()> + Send + Sync;

/// Member function invoked with the receiving instance.
///
/// Also used for accessor getters (no arguments) and setters (one argument).
#[derive(Clone)]
pub struct Method(Arc<MethodFn>);

impl Method {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> FactoryResult<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, this: &Instance, args: &[Value]) -> FactoryResult<Value> {
        (self.0)(this, args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Method(..)")
    }
}

/// Imperative mutation of a class's shared surface during assembly.
#[derive(Clone)]
pub struct Augment(Arc<AugmentFn>);

impl Augment {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Surface) -> FactoryResult<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, surface: &Surface) -> FactoryResult<()> {
        (self.0)(surface)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Augment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Augment(..)")
    }
}

/// Constructor body run against a freshly allocated instance.
///
/// A custom body decides itself whether to call [`Construction::call_super`]
/// and [`Construction::initialize`]; nothing is invoked on its behalf.
#[derive(Clone)]
pub struct ConstructorFn(Arc<ConstructorBody>);

impl ConstructorFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Construction<'_>) -> FactoryResult<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Body used when a configuration declares no `constructor`: forward the
    /// arguments to the super class, then fire this level's instance blocks.
    pub fn forwarding() -> Self {
        Self::new(|ctx| {
            if ctx.class().super_class().is_some() {
                ctx.call_super(ctx.args())?;
            }
            ctx.initialize()
        })
    }

    pub fn run(&self, ctx: &Construction<'_>) -> FactoryResult<()> {
        (self.0)(ctx)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for ConstructorFn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConstructorFn(..)")
    }
}

/// Dynamic value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Mapping),
    Method(Method),
    Augment(Augment),
    Constructor(ConstructorFn),
    Class(Class),
    Extension(Extension),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&Method> {
        match self {
            Self::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Class> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Returns the inner mapping, replacing any non-mapping value with an
    /// empty one first.
    pub fn map_entry(&mut self) -> &mut Mapping {
        if !matches!(self, Self::Map(_)) {
            *self = Self::Map(Mapping::new());
        }
        match self {
            Self::Map(map) => map,
            _ => unreachable!("value was just replaced with a mapping"),
        }
    }

    /// Converts plain JSON data into a value.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Self::Str(value),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Converts data-only values back into JSON.
    ///
    /// Fails with `ConfigShape` when the value holds anything callable.
    pub fn to_json(&self) -> FactoryResult<serde_json::Value> {
        Ok(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Int(value) => serde_json::Value::from(*value),
            Self::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Str(value) => serde_json::Value::String(value.clone()),
            Self::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Self::to_json)
                    .collect::<FactoryResult<Vec<_>>>()?,
            ),
            Self::Map(map) => {
                let mut object = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    object.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(object)
            }
            _ => return Err(FactoryError::shape("value", "plain data")),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Method(a), Self::Method(b)) => a.ptr_eq(b),
            (Self::Augment(a), Self::Augment(b)) => a.ptr_eq(b),
            (Self::Constructor(a), Self::Constructor(b)) => a.ptr_eq(b),
            (Self::Class(a), Self::Class(b)) => a.ptr_eq(b),
            (Self::Extension(a), Self::Extension(b)) => a.same_descriptor(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Self::Map(map)
    }
}

impl From<Method> for Value {
    fn from(method: Method) -> Self {
        Self::Method(method)
    }
}

impl From<Augment> for Value {
    fn from(augment: Augment) -> Self {
        Self::Augment(augment)
    }
}

impl From<ConstructorFn> for Value {
    fn from(body: ConstructorFn) -> Self {
        Self::Constructor(body)
    }
}

impl From<Class> for Value {
    fn from(class: Class) -> Self {
        Self::Class(class)
    }
}

impl From<Extension> for Value {
    fn from(extension: Extension) -> Self {
        Self::Extension(extension)
    }
}

/// Builds a [`Mapping`] from `(key, value)` pairs.
pub fn mapping<K, V, I>(entries: I) -> Mapping
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}
