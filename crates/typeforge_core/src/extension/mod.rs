//! Extension contracts.
//!
//! Third parties declare new kinds of configuration blocks by registering a
//! descriptor under the block's name in the `extensions` block. Descriptors
//! declared at one level are visible to every descendant level.

pub mod descriptor;
pub mod registry;

pub use descriptor::{
    CacheInitializer, Extension, ExtensionKind, ExtensionKindTag, ExtensionOptions,
    InstanceInitializer, SurfaceInitializer,
};
pub use registry::ExtensionRegistry;
