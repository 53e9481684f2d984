//! Extension descriptors: how one named configuration block is consumed.
//!
//! # Responsibility
//! - Declare block kind, inheritance flag, iteration mode and initializer.
//! - Wrap raw `{kind, inherit, loop}` entries into base descriptors.
//!
//! # Invariants
//! - Presets fix `inheritable`: shared surface `false`, class cache and
//!   per-instance `true`.
//! - A descriptor is immutable once it enters a registry; only its name is
//!   assigned at that point.

use crate::compose::for_each_entry;
use crate::error::{FactoryError, FactoryResult};
use crate::model::class::{Instance, Surface};
use crate::model::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Applied to the shared surface at assembly; mutates the surface.
pub type SurfaceInitializer = Arc<dyn Fn(&Surface, &str, &Value) -> FactoryResult<()> + Send + Sync>;
/// Applied at assembly; returns the value memoized in the class cache.
pub type CacheInitializer = Arc<dyn Fn(&Surface, &str, &Value) -> FactoryResult<Value> + Send + Sync>;
/// Applied when a level's instance trigger fires; mutates the instance.
pub type InstanceInitializer =
    Arc<dyn Fn(&Instance, &str, &Value) -> FactoryResult<()> + Send + Sync>;

/// Lifecycle stage of an extension, carrying its typed initializer.
#[derive(Clone)]
pub enum ExtensionKind {
    SharedSurface(Option<SurfaceInitializer>),
    ClassCache(Option<CacheInitializer>),
    PerInstance(Option<InstanceInitializer>),
}

impl ExtensionKind {
    pub fn tag(&self) -> ExtensionKindTag {
        match self {
            Self::SharedSurface(_) => ExtensionKindTag::SharedSurface,
            Self::ClassCache(_) => ExtensionKindTag::ClassCache,
            Self::PerInstance(_) => ExtensionKindTag::PerInstance,
        }
    }

    fn has_initializer(&self) -> bool {
        match self {
            Self::SharedSurface(init) => init.is_some(),
            Self::ClassCache(init) => init.is_some(),
            Self::PerInstance(init) => init.is_some(),
        }
    }

    fn same_initializer(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::SharedSurface(a), Self::SharedSurface(b)) => same_arc(a, b),
            (Self::ClassCache(a), Self::ClassCache(b)) => same_arc(a, b),
            (Self::PerInstance(a), Self::PerInstance(b)) => same_arc(a, b),
            _ => false,
        }
    }
}

fn same_arc<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Data-only view of [`ExtensionKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKindTag {
    SharedSurface,
    ClassCache,
    PerInstance,
}

impl ExtensionKindTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SharedSurface => "shared_surface",
            Self::ClassCache => "class_cache",
            Self::PerInstance => "per_instance",
        }
    }

    /// Parses a kind name; the short names `prototype`, `cache` and
    /// `instance` are accepted as well.
    pub fn parse(value: &str) -> FactoryResult<Self> {
        match value.trim() {
            "shared_surface" | "prototype" => Ok(Self::SharedSurface),
            "class_cache" | "cache" => Ok(Self::ClassCache),
            "per_instance" | "instance" => Ok(Self::PerInstance),
            other => Err(FactoryError::UnknownExtensionKind(other.to_string())),
        }
    }
}

/// Options shared by every preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExtensionOptions {
    /// Apply the initializer once per block entry (`true`) or once for the
    /// whole block (`false`).
    #[serde(rename = "loop", default = "default_loop")]
    pub looped: bool,
}

fn default_loop() -> bool {
    true
}

impl Default for ExtensionOptions {
    fn default() -> Self {
        Self { looped: true }
    }
}

impl ExtensionOptions {
    pub fn whole_block() -> Self {
        Self { looped: false }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawExtension {
    kind: Option<String>,
    inherit: Option<bool>,
    #[serde(rename = "loop")]
    looped: Option<bool>,
}

/// Descriptor for one named configuration block.
#[derive(Clone)]
pub struct Extension {
    name: String,
    kind: ExtensionKind,
    inheritable: bool,
    looped: bool,
}

impl Extension {
    fn preset(kind: ExtensionKind, inheritable: bool, options: ExtensionOptions) -> Self {
        Self {
            name: String::new(),
            kind,
            inheritable,
            looped: options.looped,
        }
    }

    pub fn shared_surface<F>(init: F) -> Self
    where
        F: Fn(&Surface, &str, &Value) -> FactoryResult<()> + Send + Sync + 'static,
    {
        Self::shared_surface_with(ExtensionOptions::default(), init)
    }

    pub fn shared_surface_with<F>(options: ExtensionOptions, init: F) -> Self
    where
        F: Fn(&Surface, &str, &Value) -> FactoryResult<()> + Send + Sync + 'static,
    {
        Self::preset(
            ExtensionKind::SharedSurface(Some(Arc::new(init))),
            false,
            options,
        )
    }

    pub fn class_cache<F>(init: F) -> Self
    where
        F: Fn(&Surface, &str, &Value) -> FactoryResult<Value> + Send + Sync + 'static,
    {
        Self::class_cache_with(ExtensionOptions::default(), init)
    }

    pub fn class_cache_with<F>(options: ExtensionOptions, init: F) -> Self
    where
        F: Fn(&Surface, &str, &Value) -> FactoryResult<Value> + Send + Sync + 'static,
    {
        Self::preset(ExtensionKind::ClassCache(Some(Arc::new(init))), true, options)
    }

    /// Class cache that memoizes block values unchanged.
    pub fn class_cache_raw(options: ExtensionOptions) -> Self {
        Self::preset(ExtensionKind::ClassCache(None), true, options)
    }

    pub fn per_instance<F>(init: F) -> Self
    where
        F: Fn(&Instance, &str, &Value) -> FactoryResult<()> + Send + Sync + 'static,
    {
        Self::per_instance_with(ExtensionOptions::default(), init)
    }

    pub fn per_instance_with<F>(options: ExtensionOptions, init: F) -> Self
    where
        F: Fn(&Instance, &str, &Value) -> FactoryResult<()> + Send + Sync + 'static,
    {
        Self::preset(ExtensionKind::PerInstance(Some(Arc::new(init))), true, options)
    }

    /// Wraps one `extensions` block entry: descriptors pass through, raw
    /// mappings become base descriptors without an initializer.
    pub(crate) fn wrap(name: &str, entry: &Value) -> FactoryResult<Self> {
        let extension = match entry {
            Value::Extension(extension) => extension.clone(),
            Value::Null => Self::from_raw(RawExtension::default())?,
            Value::Map(_) => {
                let json = entry.to_json().map_err(|_| FactoryError::InvalidExtension {
                    name: name.to_string(),
                    reason: "raw descriptor must hold plain data".to_string(),
                })?;
                let raw: RawExtension =
                    serde_json::from_value(json).map_err(|err| FactoryError::InvalidExtension {
                        name: name.to_string(),
                        reason: err.to_string(),
                    })?;
                Self::from_raw(raw)?
            }
            _ => {
                return Err(FactoryError::InvalidExtension {
                    name: name.to_string(),
                    reason: "expected a descriptor or a {kind, inherit, loop} mapping".to_string(),
                })
            }
        };
        Ok(extension.named(name))
    }

    fn from_raw(raw: RawExtension) -> FactoryResult<Self> {
        let tag = match raw.kind.as_deref() {
            Some(kind) => ExtensionKindTag::parse(kind)?,
            None => ExtensionKindTag::PerInstance,
        };
        let kind = match tag {
            ExtensionKindTag::SharedSurface => ExtensionKind::SharedSurface(None),
            ExtensionKindTag::ClassCache => ExtensionKind::ClassCache(None),
            ExtensionKindTag::PerInstance => ExtensionKind::PerInstance(None),
        };
        Ok(Self {
            name: String::new(),
            kind,
            inheritable: raw.inherit.unwrap_or(false),
            looped: raw.looped.unwrap_or(true),
        })
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ExtensionKind {
        &self.kind
    }

    pub fn tag(&self) -> ExtensionKindTag {
        self.kind.tag()
    }

    pub fn is_inheritable(&self) -> bool {
        self.inheritable
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    /// Same name, flags and initializer identity.
    pub fn same_descriptor(&self, other: &Self) -> bool {
        self.name == other.name
            && self.inheritable == other.inheritable
            && self.looped == other.looped
            && self.kind.same_initializer(&other.kind)
    }

    /// Feeds `block` to `f` according to the loop flag: once per entry with
    /// the entry key, or once with this extension's name and the whole block.
    pub(crate) fn each_entry<F>(&self, block: &Value, f: F) -> FactoryResult<()>
    where
        F: FnMut(&str, &Value) -> FactoryResult<()>,
    {
        for_each_entry(&self.name, block, self.looped, f)
    }
}

impl Debug for Extension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("kind", &self.tag())
            .field("inheritable", &self.inheritable)
            .field("looped", &self.looped)
            .field("initializer", &self.kind.has_initializer())
            .finish()
    }
}
