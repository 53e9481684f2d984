//! Process-wide, append-only record of assembled classes.
//!
//! Nothing in assembly or construction reads it; it exists for external
//! introspection only. Entries are never removed, so the record grows with
//! every class assembled during the process lifetime.

use crate::model::class::{Class, ClassId};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

static INDUSTRY: Lazy<Mutex<Vec<Class>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Appends one assembled class.
pub(crate) fn register(class: &Class) {
    INDUSTRY.lock().push(class.clone());
}

/// Snapshot of every class assembled so far, in assembly order.
pub fn assembled_classes() -> Vec<Class> {
    INDUSTRY.lock().clone()
}

pub fn assembled_count() -> usize {
    INDUSTRY.lock().len()
}

pub fn find_class(id: ClassId) -> Option<Class> {
    INDUSTRY
        .lock()
        .iter()
        .find(|class| class.id() == id)
        .cloned()
}
