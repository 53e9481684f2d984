//! Class assembly orchestration.
//!
//! # Responsibility
//! - Turn one level's configuration into a built [`Class`].
//! - Digest reserved blocks, then delegate extension blocks to the level's
//!   [`Blueprint`].
//! - Derive subclasses through [`Class::extend`].
//!
//! # Invariants
//! - Lifecycle is `Created -> Digested -> Assembled`; `assemble()` runs once.
//! - Static members are copied from the parent level by value at build time.
//! - A parent level must be assembled before a child can be created from it.

pub mod industry;

use crate::blueprint::Blueprint;
use crate::compose::{
    apply_augments, define_computed_member, extend_prototype, extend_statics, mixin_include,
    structural_inherit,
};
use crate::error::{FactoryError, FactoryResult};
use crate::model::class::{Class, Surface};
use crate::model::config::{
    Config, BLOCK_ACCESSOR, BLOCK_AUGMENT, BLOCK_CONSTRUCTOR, BLOCK_INCLUDE, BLOCK_INHERIT,
    BLOCK_PROTOTYPE, BLOCK_STATIC,
};
use crate::model::value::{ConstructorFn, Value};
use log::{debug, error};
use std::sync::Arc;
use std::time::Instant;

/// Assembly progress of one factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryState {
    Created,
    Digested,
    Assembled,
}

/// Builds one class from one level's configuration.
#[derive(Debug)]
pub struct Factory {
    blueprint: Arc<Blueprint>,
    parent: Option<Class>,
    ancestors: Vec<Class>,
    super_class: Option<Class>,
    class: Class,
    state: FactoryState,
}

impl Factory {
    /// Resolves `config` under an optional parent level.
    ///
    /// # Errors
    /// - `NotAssembled` when `parent` has not been assembled.
    /// - Any error raised while resolving the blueprint.
    pub fn new(config: impl Into<Config>, parent: Option<&Class>) -> FactoryResult<Self> {
        let parent_blueprint = match parent {
            Some(parent) => Some(parent.blueprint().cloned().ok_or(FactoryError::NotAssembled)?),
            None => None,
        };
        let blueprint = Blueprint::new(config, parent_blueprint)?;
        Self::from_blueprint(blueprint, parent)
    }

    /// Wraps an already resolved blueprint.
    pub fn from_blueprint(blueprint: Blueprint, parent: Option<&Class>) -> FactoryResult<Self> {
        let super_class = blueprint
            .get(BLOCK_INHERIT)
            .and_then(Value::as_class)
            .cloned();
        let body = match blueprint.get(BLOCK_CONSTRUCTOR) {
            None => ConstructorFn::forwarding(),
            Some(Value::Constructor(body)) => body.clone(),
            Some(_) => return Err(FactoryError::shape(BLOCK_CONSTRUCTOR, "a constructor body")),
        };
        Ok(Self {
            blueprint: Arc::new(blueprint),
            parent: parent.cloned(),
            ancestors: parent.map(level_chain).unwrap_or_default(),
            super_class,
            class: Class::new(body),
            state: FactoryState::Created,
        })
    }

    pub fn blueprint(&self) -> &Arc<Blueprint> {
        &self.blueprint
    }

    /// Parent level, represented by its assembled class.
    pub fn parent(&self) -> Option<&Class> {
        self.parent.as_ref()
    }

    /// Levels above this one along the `extend` chain, root first.
    pub fn ancestors(&self) -> &[Class] {
        &self.ancestors
    }

    pub fn root(&self) -> Option<&Class> {
        self.ancestors.first()
    }

    pub fn super_class(&self) -> Option<&Class> {
        self.super_class.as_ref()
    }

    /// The class being built; only usable once assembled.
    pub fn class(&self) -> &Class {
        &self.class
    }

    pub fn state(&self) -> FactoryState {
        self.state
    }

    /// Derives a subclass of this factory's class.
    pub fn extend(&self, config: impl Into<Config>) -> FactoryResult<Class> {
        self.class.extend(config)
    }

    /// Digests reserved blocks, builds the shared surface and class cache,
    /// and installs the per-instance trigger.
    ///
    /// # Errors
    /// - `AlreadyAssembled` on any call after the first.
    /// - Shape errors from composition primitives, unchanged.
    /// - Errors returned by extension initializers.
    pub fn assemble(&mut self) -> FactoryResult<Class> {
        if self.state != FactoryState::Created {
            return Err(FactoryError::AlreadyAssembled);
        }
        let started_at = Instant::now();
        let depth = self.ancestors.len();

        match self.run_assembly() {
            Ok(()) => {
                debug!(
                    "event=factory_assemble module=factory status=ok class_id={} depth={} duration_us={}",
                    self.class.id(),
                    depth,
                    started_at.elapsed().as_micros()
                );
                Ok(self.class.clone())
            }
            Err(err) => {
                error!(
                    "event=factory_assemble module=factory status=error class_id={} depth={} error_code={} error={}",
                    self.class.id(),
                    depth,
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }

    fn run_assembly(&mut self) -> FactoryResult<()> {
        self.digest()?;

        if let Some(parent) = &self.parent {
            self.class.attach_parent_level(parent);
        }
        let blueprint = Arc::clone(&self.blueprint);
        self.class.attach_blueprint(Arc::clone(&blueprint));
        blueprint.build_shared_surface(self.class.prototype(), &blueprint)?;
        blueprint.build_class_cache(self.class.prototype(), &blueprint)?;
        self.class.install_trigger(blueprint);

        industry::register(&self.class);
        self.state = FactoryState::Assembled;
        Ok(())
    }

    fn digest(&mut self) -> FactoryResult<()> {
        let blueprint = &self.blueprint;
        let class = &self.class;

        blueprint.digest(BLOCK_INHERIT, false, |_, parent| {
            structural_inherit(class, parent)
        })?;
        blueprint.digest(BLOCK_INCLUDE, false, |_, mixins| mixin_include(class, mixins))?;
        blueprint.digest(BLOCK_AUGMENT, false, |_, augments| {
            apply_augments(class, augments)
        })?;
        blueprint.digest(BLOCK_PROTOTYPE, false, |_, members| {
            extend_prototype(class, members)
        })?;
        // Single-level copy: the parent's statics already include its own
        // parent's.
        if let Some(parent) = &self.parent {
            class.extend_statics(&parent.statics());
        }
        blueprint.digest(BLOCK_STATIC, false, |_, members| extend_statics(class, members))?;
        blueprint.digest(BLOCK_ACCESSOR, true, |name, access| {
            install_accessor(class.prototype(), name, access);
            Ok(())
        })?;

        self.state = FactoryState::Digested;
        Ok(())
    }
}

/// `parent` preceded by the levels it was itself extended through.
fn level_chain(parent: &Class) -> Vec<Class> {
    let mut chain = parent.level_ancestors();
    chain.push(parent.clone());
    chain
}

/// Installs one `accessor` entry.
///
/// A bare method is a getter. A `{get, set}` mapping installs whichever side
/// is present, except that a set-only mapping installs `set` as the getter.
/// Other shapes are ignored.
fn install_accessor(surface: &Surface, name: &str, access: &Value) {
    match access {
        Value::Method(get) => define_computed_member(surface, name, get.clone(), None),
        Value::Map(spec) => {
            let get = spec.get("get").and_then(Value::as_method).cloned();
            let set = spec.get("set").and_then(Value::as_method).cloned();
            match (get, set) {
                (Some(get), set) => define_computed_member(surface, name, get, set),
                (None, Some(set)) => define_computed_member(surface, name, set, None),
                (None, None) => {}
            }
        }
        _ => {}
    }
}

impl Class {
    /// Builds and assembles a subclass whose `inherit` block is `self`.
    ///
    /// # Errors
    /// - `NotAssembled` when `self` is not assembled yet.
    pub fn extend(&self, config: impl Into<Config>) -> FactoryResult<Class> {
        if !self.is_assembled() {
            return Err(FactoryError::NotAssembled);
        }
        let config = config.into().inherit(self.clone());
        Factory::new(config, Some(self))?.assemble()
    }
}

/// Assembles a root-level class from `config`.
pub fn factory(config: impl Into<Config>) -> FactoryResult<Class> {
    Factory::new(config, None)?.assemble()
}
