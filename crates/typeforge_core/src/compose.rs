//! Structural composition primitives used during assembly.
//!
//! # Responsibility
//! - Mapping merge, entry iteration, structural inheritance, mixin include,
//!   augment application and computed member definition.
//! - Raise `ConfigShape` for blocks whose value cannot be used.
//!
//! # Invariants
//! - Merges are shallow and never mutate their inputs.
//! - Later mixins override earlier ones on name collisions.

use crate::error::{FactoryError, FactoryResult};
use crate::model::class::{Class, Member, Surface};
use crate::model::config::{BLOCK_AUGMENT, BLOCK_INCLUDE, BLOCK_INHERIT, BLOCK_PROTOTYPE, BLOCK_STATIC};
use crate::model::value::{Mapping, Method, Value};

/// Shallow merge of two block values.
///
/// Mappings merge key-wise with `overlay` entries winning. An absent or null
/// side counts as an empty mapping. Any other overlay value replaces `base`.
pub fn merge(base: Option<&Value>, overlay: Option<&Value>) -> Value {
    let base = base.filter(|value| !value.is_null());
    let overlay = overlay.filter(|value| !value.is_null());
    match (base, overlay) {
        (Some(Value::Map(base)), Some(Value::Map(overlay))) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                merged.insert(key.clone(), value.clone());
            }
            Value::Map(merged)
        }
        (_, Some(overlay)) => overlay.clone(),
        (Some(base), None) => base.clone(),
        (None, None) => Value::Map(Mapping::new()),
    }
}

/// Calls `f` once per entry of a mapping block (`looped`), or once with
/// `name` and the whole block.
pub fn for_each_entry<F>(name: &str, block: &Value, looped: bool, mut f: F) -> FactoryResult<()>
where
    F: FnMut(&str, &Value) -> FactoryResult<()>,
{
    if !looped {
        return f(name, block);
    }
    let entries = block
        .as_map()
        .ok_or_else(|| FactoryError::shape(name, "a mapping"))?;
    for (key, value) in entries {
        f(key, value)?;
    }
    Ok(())
}

/// Makes `child` delegate unresolved member lookups to `parent` and records
/// the `super_class` back-reference.
pub fn structural_inherit(child: &Class, parent: &Value) -> FactoryResult<()> {
    let parent = parent
        .as_class()
        .ok_or_else(|| FactoryError::shape(BLOCK_INHERIT, "a built class"))?;
    if parent.is_subclass_of(child) {
        return Err(FactoryError::shape(BLOCK_INHERIT, "a class outside its own lineage"));
    }
    child.attach_super(parent);
    Ok(())
}

/// Copies the members of one mixin, or of a list of mixins, onto `target`.
///
/// A mixin is a class (its resolved surface is copied) or a member mapping.
pub fn mixin_include(target: &Class, mixins: &Value) -> FactoryResult<()> {
    let surface = target.prototype();
    match mixins {
        Value::Class(mixin) => {
            for (name, member) in mixin.prototype().resolved_members() {
                surface.insert_member(name, member);
            }
            Ok(())
        }
        Value::Map(members) => {
            for (name, value) in members {
                surface.set(name.clone(), value.clone());
            }
            Ok(())
        }
        Value::List(items) => items
            .iter()
            .try_for_each(|item| match item {
                Value::List(_) => Err(FactoryError::shape(BLOCK_INCLUDE, "a class or a mapping")),
                _ => mixin_include(target, item),
            }),
        _ => Err(FactoryError::shape(
            BLOCK_INCLUDE,
            "a class, a mapping or a list of them",
        )),
    }
}

/// Runs one augment, or each augment of a list, against the shared surface.
pub fn apply_augments(target: &Class, augments: &Value) -> FactoryResult<()> {
    match augments {
        Value::Augment(augment) => augment.apply(target.prototype()),
        Value::List(items) => items.iter().try_for_each(|item| match item {
            Value::Augment(augment) => augment.apply(target.prototype()),
            _ => Err(FactoryError::shape(BLOCK_AUGMENT, "augment functions")),
        }),
        _ => Err(FactoryError::shape(
            BLOCK_AUGMENT,
            "an augment function or a list of them",
        )),
    }
}

/// Sets every entry of a member mapping on the shared surface.
pub fn extend_prototype(target: &Class, members: &Value) -> FactoryResult<()> {
    let members = members
        .as_map()
        .ok_or_else(|| FactoryError::shape(BLOCK_PROTOTYPE, "a member mapping"))?;
    for (name, value) in members {
        target.prototype().set(name.clone(), value.clone());
    }
    Ok(())
}

/// Copies a static member mapping onto the class by value.
pub fn extend_statics(target: &Class, members: &Value) -> FactoryResult<()> {
    let members = members
        .as_map()
        .ok_or_else(|| FactoryError::shape(BLOCK_STATIC, "a member mapping"))?;
    target.extend_statics(members);
    Ok(())
}

/// Installs a computed member on `surface`.
pub fn define_computed_member(surface: &Surface, name: &str, get: Method, set: Option<Method>) {
    surface.insert_member(name.to_string(), Member::Computed { get, set });
}
