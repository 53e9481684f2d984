//! Declarative class composition engine.
//!
//! A [`Config`] describes one hierarchy level: constructor body, inherited
//! parent, mixins, shared members, statics, accessors, and extension blocks.
//! A [`Factory`] resolves it through a [`Blueprint`] into a built [`Class`].
//! Extension descriptors let third parties declare new block kinds applied to
//! the shared surface, to a per-class cache, or to each instance.

pub mod blueprint;
pub mod compose;
pub mod error;
pub mod extension;
pub mod factory;
pub mod logging;
pub mod model;

pub use blueprint::Blueprint;
pub use error::{FactoryError, FactoryResult};
pub use extension::{Extension, ExtensionKind, ExtensionKindTag, ExtensionOptions, ExtensionRegistry};
pub use factory::industry::{assembled_classes, assembled_count, find_class};
pub use factory::{factory, Factory, FactoryState};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::class::{Class, ClassId, ClassSummary, Construction, Instance, Member, Surface};
pub use model::config::{Config, RESERVED_BLOCKS};
pub use model::value::{mapping, Augment, ConstructorFn, Mapping, Method, Value};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
