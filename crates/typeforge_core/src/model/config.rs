//! Declarative class configuration record.
//!
//! # Responsibility
//! - Collect reserved blocks and extension blocks into one ordered mapping.
//! - Load plain data blocks from JSON.
//!
//! # Invariants
//! - Reserved block names are listed in [`RESERVED_BLOCKS`].
//! - The builder never validates shapes; composition primitives do that
//!   during assembly.

use crate::error::{FactoryError, FactoryResult};
use crate::extension::Extension;
use crate::model::class::Class;
use crate::model::value::{Augment, ConstructorFn, Mapping, Method, Value};

pub const BLOCK_CONSTRUCTOR: &str = "constructor";
pub const BLOCK_INHERIT: &str = "inherit";
pub const BLOCK_INCLUDE: &str = "include";
pub const BLOCK_AUGMENT: &str = "augment";
pub const BLOCK_PROTOTYPE: &str = "prototype";
pub const BLOCK_STATIC: &str = "static";
pub const BLOCK_ACCESSOR: &str = "accessor";
pub const BLOCK_EXTENSIONS: &str = "extensions";

/// Block names interpreted by the factory itself.
pub const RESERVED_BLOCKS: &[&str] = &[
    BLOCK_CONSTRUCTOR,
    BLOCK_INHERIT,
    BLOCK_INCLUDE,
    BLOCK_AUGMENT,
    BLOCK_PROTOTYPE,
    BLOCK_STATIC,
    BLOCK_ACCESSOR,
    BLOCK_EXTENSIONS,
];

/// Configuration of one hierarchy level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    blocks: Mapping,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object into data blocks.
    pub fn from_json(source: &str) -> FactoryResult<Self> {
        let json: serde_json::Value = serde_json::from_str(source)?;
        match Value::from_json(json) {
            Value::Map(blocks) => Ok(Self { blocks }),
            _ => Err(FactoryError::Json(
                "configuration root must be an object".to_string(),
            )),
        }
    }

    pub fn blocks(&self) -> &Mapping {
        &self.blocks
    }

    pub fn into_blocks(self) -> Mapping {
        self.blocks
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.blocks.get(name)
    }

    /// Sets an arbitrary block, replacing any previous value.
    pub fn block(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_block(name, value);
        self
    }

    pub fn set_block(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.blocks.insert(name.into(), value.into());
    }

    pub fn constructor(self, body: ConstructorFn) -> Self {
        self.block(BLOCK_CONSTRUCTOR, body)
    }

    pub fn inherit(self, parent: Class) -> Self {
        self.block(BLOCK_INHERIT, parent)
    }

    /// Sets the `include` block: a class, a member mapping, or a list of them.
    pub fn include(self, mixins: impl Into<Value>) -> Self {
        self.block(BLOCK_INCLUDE, mixins)
    }

    /// Appends one augment function.
    pub fn augment(mut self, augment: Augment) -> Self {
        self.push_to_list(BLOCK_AUGMENT, Value::Augment(augment));
        self
    }

    /// Adds one member to the `prototype` block.
    pub fn member(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map_block(BLOCK_PROTOTYPE).insert(name.into(), value.into());
        self
    }

    /// Adds one member to the `static` block.
    pub fn static_member(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map_block(BLOCK_STATIC).insert(name.into(), value.into());
        self
    }

    /// Adds a getter-only accessor.
    pub fn getter(self, name: impl Into<String>, get: Method) -> Self {
        self.accessor(name, Value::Method(get))
    }

    /// Adds a raw accessor entry: a method, or a mapping with `get`/`set`.
    pub fn accessor(mut self, name: impl Into<String>, spec: impl Into<Value>) -> Self {
        self.map_block(BLOCK_ACCESSOR).insert(name.into(), spec.into());
        self
    }

    /// Declares an extension at this level.
    pub fn extension(mut self, name: impl Into<String>, extension: impl Into<Value>) -> Self {
        self.map_block(BLOCK_EXTENSIONS)
            .insert(name.into(), extension.into());
        self
    }

    /// Builds a `{get, set}` accessor entry; either side may be omitted.
    pub fn accessor_spec(get: Option<Method>, set: Option<Method>) -> Value {
        let mut spec = Mapping::new();
        if let Some(get) = get {
            spec.insert("get".to_string(), Value::Method(get));
        }
        if let Some(set) = set {
            spec.insert("set".to_string(), Value::Method(set));
        }
        Value::Map(spec)
    }

    fn map_block(&mut self, name: &str) -> &mut Mapping {
        self.blocks.entry(name.to_string()).or_default().map_entry()
    }

    fn push_to_list(&mut self, name: &str, value: Value) {
        let slot = self.blocks.entry(name.to_string()).or_default();
        if let Value::List(items) = slot {
            items.push(value);
            return;
        }
        let previous = std::mem::take(slot);
        *slot = if previous.is_null() {
            Value::List(vec![value])
        } else {
            Value::List(vec![previous, value])
        };
    }
}

impl From<Mapping> for Config {
    fn from(blocks: Mapping) -> Self {
        Self { blocks }
    }
}
