//! Built classes, their shared surface, and instances.
//!
//! # Responsibility
//! - Hold everything assembly produces for one hierarchy level.
//! - Resolve member reads through own fields, the class surface and the
//!   parent surface recorded at build time.
//! - Run constructor bodies with an explicit [`Construction`] context.
//!
//! # Invariants
//! - A surface delegates to exactly one parent class, fixed during assembly.
//!   The parent's resolved member table is captured at that point; lookups
//!   consult it directly and never walk the ancestor chain.
//! - No lock is held while a user closure (getter, setter, method, body)
//!   runs.

use crate::blueprint::Blueprint;
use crate::error::{FactoryError, FactoryResult};
use crate::model::value::{ConstructorFn, Mapping, Method, Value};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Stable identifier of one built class.
pub type ClassId = Uuid;

/// One member of a shared surface.
#[derive(Debug, Clone)]
pub enum Member {
    Data(Value),
    /// Computed member; `get` runs on every read.
    Computed { get: Method, set: Option<Method> },
}

impl Member {
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::Computed { .. } => None,
        }
    }
}

/// Member table visible to every instance of a class.
#[derive(Default)]
pub struct Surface {
    members: RwLock<IndexMap<String, Member>>,
    parent: OnceCell<Class>,
    inherited: OnceCell<IndexMap<String, Member>>,
}

impl Surface {
    /// Resolves a member through this surface, then the inherited table.
    pub fn get(&self, name: &str) -> Option<Member> {
        if let Some(member) = self.get_own(name) {
            return Some(member);
        }
        self.inherited.get()?.get(name).cloned()
    }

    pub fn get_own(&self, name: &str) -> Option<Member> {
        self.members.read().get(name).cloned()
    }

    /// Resolved data member value; computed members yield `None`.
    pub fn data(&self, name: &str) -> Option<Value> {
        match self.get(name)? {
            Member::Data(value) => Some(value),
            Member::Computed { .. } => None,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.members.read().contains_key(name)
    }

    /// Sets an own data member, shadowing anything inherited.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.members
            .write()
            .insert(name.into(), Member::Data(value.into()));
    }

    pub(crate) fn insert_member(&self, name: String, member: Member) {
        self.members.write().insert(name, member);
    }

    pub fn own_names(&self) -> Vec<String> {
        self.members.read().keys().cloned().collect()
    }

    /// Every member reachable from this surface, ancestors first, with own
    /// members overriding inherited ones.
    pub fn resolved_members(&self) -> Vec<(String, Member)> {
        let mut resolved = self.inherited.get().cloned().unwrap_or_default();
        for (name, member) in self.members.read().iter() {
            resolved.insert(name.clone(), member.clone());
        }
        resolved.into_iter().collect()
    }

    /// Runs `f` against a copy of the own mapping stored under `name` and
    /// stores the result back. Starts from an empty mapping when the surface
    /// does not define `name` itself. `f` may read this surface.
    pub fn with_own_map<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Mapping) -> R,
    ) -> FactoryResult<R> {
        let mut map = match self.get_own(name) {
            None => Mapping::new(),
            Some(Member::Data(Value::Map(map))) => map,
            Some(_) => return Err(FactoryError::shape(name, "a mapping")),
        };
        let result = f(&mut map);
        self.insert_member(name.to_string(), Member::Data(Value::Map(map)));
        Ok(result)
    }

    /// Records `parent` and snapshots its resolved member table.
    pub(crate) fn delegate_to(&self, parent: &Class) {
        if self.parent.set(parent.clone()).is_ok() {
            let table = parent.prototype().resolved_members().into_iter().collect();
            let _ = self.inherited.set(table);
        }
    }

    pub fn parent(&self) -> Option<&Class> {
        self.parent.get()
    }
}

impl Debug for Surface {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("members", &self.own_names())
            .field("parent", &self.parent.get().map(Class::id))
            .finish()
    }
}

struct ClassInner {
    id: ClassId,
    body: ConstructorFn,
    prototype: Surface,
    statics: RwLock<Mapping>,
    super_class: OnceCell<Class>,
    parent_level: OnceCell<Class>,
    blueprint: OnceCell<Arc<Blueprint>>,
    trigger: OnceCell<Arc<Blueprint>>,
}

/// A constructible type produced by a [`crate::Factory`].
///
/// Cheap to clone; clones share identity.
#[derive(Clone)]
pub struct Class(Arc<ClassInner>);

impl Class {
    pub(crate) fn new(body: ConstructorFn) -> Self {
        Self(Arc::new(ClassInner {
            id: Uuid::new_v4(),
            body,
            prototype: Surface::default(),
            statics: RwLock::new(Mapping::new()),
            super_class: OnceCell::new(),
            parent_level: OnceCell::new(),
            blueprint: OnceCell::new(),
            trigger: OnceCell::new(),
        }))
    }

    pub fn id(&self) -> ClassId {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Constructor body this class runs for `construct`.
    pub fn constructor(&self) -> &ConstructorFn {
        &self.0.body
    }

    /// Shared surface (the prototype) of this class.
    pub fn prototype(&self) -> &Surface {
        &self.0.prototype
    }

    pub fn super_class(&self) -> Option<&Class> {
        self.0.super_class.get()
    }

    /// Level this class was extended from. Unlike [`Class::super_class`], a
    /// root-level `inherit` block does not set it.
    pub fn parent_level(&self) -> Option<&Class> {
        self.0.parent_level.get()
    }

    /// Levels this class was extended through, root level first, excluding
    /// `self`.
    pub fn level_ancestors(&self) -> Vec<Class> {
        let mut chain = Vec::new();
        let mut current = self.parent_level();
        while let Some(class) = current {
            chain.push(class.clone());
            current = class.parent_level();
        }
        chain.reverse();
        chain
    }

    /// Blueprint attached during assembly.
    pub fn blueprint(&self) -> Option<&Arc<Blueprint>> {
        self.0.blueprint.get()
    }

    pub fn is_assembled(&self) -> bool {
        self.0.trigger.get().is_some()
    }

    pub fn get_static(&self, name: &str) -> Option<Value> {
        self.0.statics.read().get(name).cloned()
    }

    pub fn set_static(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.statics.write().insert(name.into(), value.into());
    }

    /// Snapshot of the resolved static members.
    pub fn statics(&self) -> Mapping {
        self.0.statics.read().clone()
    }

    pub(crate) fn extend_statics(&self, members: &Mapping) {
        let mut statics = self.0.statics.write();
        for (name, value) in members {
            statics.insert(name.clone(), value.clone());
        }
    }

    pub(crate) fn attach_super(&self, parent: &Class) {
        let _ = self.0.super_class.set(parent.clone());
        self.0.prototype.delegate_to(parent);
    }

    pub(crate) fn attach_parent_level(&self, parent: &Class) {
        let _ = self.0.parent_level.set(parent.clone());
    }

    pub(crate) fn attach_blueprint(&self, blueprint: Arc<Blueprint>) {
        let _ = self.0.blueprint.set(blueprint);
    }

    pub(crate) fn install_trigger(&self, blueprint: Arc<Blueprint>) {
        let _ = self.0.trigger.set(blueprint);
    }

    /// Allocates an instance of this class and runs its constructor body.
    pub fn construct(&self, args: &[Value]) -> FactoryResult<Instance> {
        let instance = Instance::new(self.clone());
        self.constructor().run(&Construction {
            this: &instance,
            class: self,
            args,
        })?;
        Ok(instance)
    }

    /// Applies this level's per-instance extensions to `instance`.
    ///
    /// Block data is read from the blueprint of the instance's runtime class,
    /// which may be a descendant of `self`. Calling this zero or several
    /// times is the caller's choice.
    pub fn initialize(&self, instance: &Instance) -> FactoryResult<()> {
        let own = self.0.trigger.get().ok_or(FactoryError::NotAssembled)?;
        let top = instance
            .class()
            .blueprint()
            .ok_or(FactoryError::NotAssembled)?;
        own.build_per_instance(instance, top)
    }

    /// Whether `self` is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.ptr_eq(other) {
                return true;
            }
            current = class.super_class();
        }
        false
    }

    /// Super class chain from the root down to `self`.
    pub fn lineage(&self) -> Vec<Class> {
        let mut chain = vec![self.clone()];
        let mut current = self.super_class();
        while let Some(class) = current {
            chain.push(class.clone());
            current = class.super_class();
        }
        chain.reverse();
        chain
    }

    /// Introspection snapshot.
    pub fn summary(&self) -> ClassSummary {
        let (local_extensions, global_extensions) = match self.blueprint() {
            Some(blueprint) => (
                blueprint.local_extensions().names(),
                blueprint.global_extensions().names(),
            ),
            None => (vec![], vec![]),
        };
        ClassSummary {
            id: self.id(),
            super_id: self.super_class().map(Class::id),
            depth: self.lineage().len() - 1,
            assembled: self.is_assembled(),
            local_extensions,
            global_extensions,
            statics: self.0.statics.read().keys().cloned().collect(),
            members: self.prototype().own_names(),
        }
    }
}

impl Debug for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id())
            .field("super", &self.super_class().map(Class::id))
            .finish()
    }
}

/// Serializable description of a class, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSummary {
    pub id: ClassId,
    pub super_id: Option<ClassId>,
    /// Number of ancestors above this class.
    pub depth: usize,
    pub assembled: bool,
    pub local_extensions: Vec<String>,
    pub global_extensions: Vec<String>,
    pub statics: Vec<String>,
    pub members: Vec<String>,
}

struct InstanceInner {
    class: Class,
    fields: RwLock<Mapping>,
}

/// Object created by [`Class::construct`].
#[derive(Clone)]
pub struct Instance(Arc<InstanceInner>);

impl Instance {
    fn new(class: Class) -> Self {
        Self(Arc::new(InstanceInner {
            class,
            fields: RwLock::new(Mapping::new()),
        }))
    }

    /// Runtime (most-derived) class.
    pub fn class(&self) -> &Class {
        &self.0.class
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_instance_of(&self, class: &Class) -> bool {
        self.class().is_subclass_of(class)
    }

    /// Own field, ignoring the surface.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.fields.read().get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.fields.write().insert(name.into(), value.into());
    }

    /// Runs `f` against a copy of an own field (`Null` when missing) and
    /// stores the result back. `f` may read this instance.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut value = self.field(name).unwrap_or_default();
        let result = f(&mut value);
        self.set_field(name, value);
        result
    }

    /// Reads a member: own fields first, then the class surface chain.
    pub fn get(&self, name: &str) -> FactoryResult<Option<Value>> {
        if let Some(value) = self.field(name) {
            return Ok(Some(value));
        }
        match self.class().prototype().get(name) {
            Some(Member::Data(value)) => Ok(Some(value)),
            Some(Member::Computed { get, .. }) => get.call(self, &[]).map(Some),
            None => Ok(None),
        }
    }

    /// Writes a member, routing through a computed setter when one applies.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> FactoryResult<()> {
        let value = value.into();
        match self.class().prototype().get(name) {
            Some(Member::Computed { set: Some(set), .. }) => set.call(self, &[value]).map(|_| ()),
            Some(Member::Computed { set: None, .. }) => {
                Err(FactoryError::ReadOnlyMember(name.to_string()))
            }
            _ => {
                self.set_field(name, value);
                Ok(())
            }
        }
    }

    /// Invokes a method member with `self` as receiver.
    pub fn call(&self, name: &str, args: &[Value]) -> FactoryResult<Value> {
        match self.get(name)? {
            Some(Value::Method(method)) => method.call(self, args),
            Some(_) => Err(FactoryError::NotCallable(name.to_string())),
            None => Err(FactoryError::MemberNotFound(name.to_string())),
        }
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class().id())
            .field("fields", &*self.0.fields.read())
            .finish()
    }
}

/// Context handed to a constructor body.
pub struct Construction<'a> {
    this: &'a Instance,
    class: &'a Class,
    args: &'a [Value],
}

impl<'a> Construction<'a> {
    /// Instance under construction.
    pub fn this(&self) -> &'a Instance {
        self.this
    }

    /// Level whose body is running; differs from `this().class()` while a
    /// super body runs.
    pub fn class(&self) -> &'a Class {
        self.class
    }

    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Runs the super class's constructor body against the same instance.
    pub fn call_super(&self, args: &[Value]) -> FactoryResult<()> {
        let parent = self
            .class
            .super_class()
            .ok_or_else(|| FactoryError::MemberNotFound("super".to_string()))?;
        parent.constructor().run(&Construction {
            this: self.this,
            class: parent,
            args,
        })
    }

    /// Fires the running level's per-instance extensions.
    pub fn initialize(&self) -> FactoryResult<()> {
        self.class.initialize(self.this)
    }
}
