//! Per-level configuration resolver.
//!
//! # Responsibility
//! - Own one hierarchy level's blocks and extension registries.
//! - Merge inheritable block data with the parent level once, at
//!   construction. A side without the block counts as an empty mapping.
//! - Apply shared-surface, class-cache and per-instance extensions, reading
//!   block data from the calling (most-derived) blueprint.
//!
//! # Invariants
//! - A blueprint is read-only after `Blueprint::new` returns.
//! - Shared-surface and class-cache plans come from the global registry;
//!   the per-instance plan comes from the local registry only.
//! - Absent or null blocks are skipped without error.

use crate::compose::{for_each_entry, merge};
use crate::error::FactoryResult;
use crate::extension::{Extension, ExtensionKind, ExtensionKindTag, ExtensionRegistry};
use crate::model::class::{Instance, Surface};
use crate::model::config::{Config, BLOCK_EXTENSIONS};
use crate::model::value::{Mapping, Value};
use log::{debug, trace};
use std::sync::Arc;

/// Extensions resolved per lifecycle stage, in registry order.
#[derive(Debug, Clone, Default)]
struct BuildPlan {
    shared_surface: Vec<Extension>,
    class_cache: Vec<Extension>,
    per_instance: Vec<Extension>,
}

/// Resolved configuration of one hierarchy level.
#[derive(Debug)]
pub struct Blueprint {
    blocks: Mapping,
    parent: Option<Arc<Blueprint>>,
    local_extensions: ExtensionRegistry,
    global_extensions: ExtensionRegistry,
    plan: BuildPlan,
}

impl Blueprint {
    /// Resolves `config` against an optional, already assembled parent level.
    pub fn new(config: impl Into<Config>, parent: Option<Arc<Blueprint>>) -> FactoryResult<Self> {
        let mut blocks = config.into().into_blocks();
        let local_extensions = ExtensionRegistry::from_block(blocks.get(BLOCK_EXTENSIONS))?;
        let global_extensions = match &parent {
            Some(parent) => parent.global_extensions.overlaid_by(&local_extensions),
            None => local_extensions.clone(),
        };

        let mut inherited = 0usize;
        if let Some(parent) = &parent {
            for extension in global_extensions.inheritable() {
                let name = extension.name();
                let merged = merge(parent.get(name), blocks.get(name));
                blocks.insert(name.to_string(), merged);
                inherited += 1;
            }
        }

        let plan = BuildPlan {
            shared_surface: global_extensions.list_by_kind(ExtensionKindTag::SharedSurface),
            class_cache: global_extensions.list_by_kind(ExtensionKindTag::ClassCache),
            per_instance: local_extensions.list_by_kind(ExtensionKindTag::PerInstance),
        };

        debug!(
            "event=blueprint_resolve module=blueprint status=ok has_parent={} local_extensions={} global_extensions={} inherited_blocks={}",
            parent.is_some(),
            local_extensions.len(),
            global_extensions.len(),
            inherited
        );

        Ok(Self {
            blocks,
            parent,
            local_extensions,
            global_extensions,
            plan,
        })
    }

    pub fn blocks(&self) -> &Mapping {
        &self.blocks
    }

    pub fn parent(&self) -> Option<&Arc<Blueprint>> {
        self.parent.as_ref()
    }

    pub fn local_extensions(&self) -> &ExtensionRegistry {
        &self.local_extensions
    }

    pub fn global_extensions(&self) -> &ExtensionRegistry {
        &self.global_extensions
    }

    /// Whether the block exists and is not null.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.blocks.get(name).filter(|value| !value.is_null())
    }

    pub fn get_or<'a>(&'a self, name: &str, fallback: &'a Value) -> &'a Value {
        self.get(name).unwrap_or(fallback)
    }

    /// Feeds a present block to `callback`: per entry when `looped`, else once
    /// with the block name and the whole value. Absent blocks are a no-op.
    pub fn digest<F>(&self, name: &str, looped: bool, callback: F) -> FactoryResult<()>
    where
        F: FnMut(&str, &Value) -> FactoryResult<()>,
    {
        match self.get(name) {
            Some(block) => for_each_entry(name, block, looped, callback),
            None => Ok(()),
        }
    }

    /// Applies every shared-surface extension visible at this level.
    pub fn build_shared_surface(&self, surface: &Surface, calling: &Blueprint) -> FactoryResult<()> {
        for extension in &self.plan.shared_surface {
            let Some(block) = calling.get(extension.name()) else {
                continue;
            };
            let ExtensionKind::SharedSurface(Some(init)) = extension.kind() else {
                continue;
            };
            trace!(
                "event=extension_apply module=blueprint kind=shared_surface extension={}",
                extension.name()
            );
            extension.each_entry(block, |key, value| init(surface, key, value))?;
        }
        Ok(())
    }

    /// Populates the class cache mapping of every class-cache extension.
    ///
    /// The cache lives on `surface` under the extension name and is created
    /// empty when the surface does not define it itself, so a child level
    /// never writes into its parent's cache.
    pub fn build_class_cache(&self, surface: &Surface, calling: &Blueprint) -> FactoryResult<()> {
        for extension in &self.plan.class_cache {
            let name = extension.name();
            let Some(block) = calling.get(name) else {
                continue;
            };
            let ExtensionKind::ClassCache(init) = extension.kind() else {
                continue;
            };
            trace!(
                "event=extension_apply module=blueprint kind=class_cache extension={}",
                name
            );
            surface.with_own_map(name, |_| ())?;
            extension.each_entry(block, |key, value| {
                let memo = match init {
                    Some(init) => init(surface, key, value)?,
                    None => value.clone(),
                };
                surface.with_own_map(name, |cache| {
                    cache.insert(key.to_string(), memo);
                })
            })?;
        }
        Ok(())
    }

    /// Applies this level's own per-instance extensions to `instance`.
    pub fn build_per_instance(&self, instance: &Instance, calling: &Blueprint) -> FactoryResult<()> {
        for extension in &self.plan.per_instance {
            let Some(block) = calling.get(extension.name()) else {
                continue;
            };
            let ExtensionKind::PerInstance(Some(init)) = extension.kind() else {
                continue;
            };
            trace!(
                "event=extension_apply module=blueprint kind=per_instance extension={}",
                extension.name()
            );
            extension.each_entry(block, |key, value| init(instance, key, value))?;
        }
        Ok(())
    }
}
