//! Pass blackboard (spec.md §3.3, §4.1).
//!
//! A type-keyed store so a later pass can fetch an earlier pass's output
//! struct without either side naming individual resources. Grounded on
//! the sibling `render-extra` crate's `Blackboard` (name/type-keyed lookup
//! with structural reuse), simplified here to the type-id keying spec.md
//! actually asks for — this crate has no by-name variant.

use std::any::{Any, TypeId};

use fxhash::FxHashMap;

/// Keyed by `TypeId`; `update::<T>` overwrites any previous value of the
/// same type. Reset along with the rest of the graph at `reset()`.
#[derive(Default)]
pub struct Blackboard {
    entries: FxHashMap<TypeId, Box<dyn Any>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Blackboard::default()
    }

    pub fn update<T: 'static>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.entries.get(&TypeId::of::<T>()).and_then(|b| b.downcast_ref::<T>())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
