use std::{
    any::type_name,
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock},
};

use crate::types::{Injectable, Resolved, TypeInfo};

/// A dependency field of an instance, filled in place by the builder.
///
/// `T` is either a capability (`dyn Trait`) or a concrete component type.
///
/// ### Panics
///
/// [Inject::get] panics when called before the build wired the slot.
pub struct Inject<T: ?Sized + Injectable> {
    cell: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized + Injectable> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Injectable> Debug for Inject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_filled() { "filled" } else { "empty" };
        f.debug_tuple("Inject")
            .field(&type_name::<T>())
            .field(&state)
            .finish()
    }
}

impl<T: ?Sized + Injectable> Inject<T> {
    /// An empty slot
    pub fn new() -> Self {
        Inject {
            cell: RwLock::new(None),
        }
    }

    /// A slot which is already filled.
    ///
    /// A compatible registered provider still replaces the value during a build,
    /// without one the value is kept and counts as satisfied.
    pub fn with(value: Arc<T>) -> Self {
        Inject {
            cell: RwLock::new(Some(value)),
        }
    }

    /// Accesses the wired dependency
    ///
    /// # Panics
    /// - When the slot has not been filled
    pub fn get(&self) -> Arc<T> {
        self.try_get().unwrap_or_else(|| {
            panic!(
                "slot of type '{}' accessed before it was wired",
                type_name::<T>()
            )
        })
    }

    /// Accesses the wired dependency, if any
    pub fn try_get(&self) -> Option<Arc<T>> {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_filled(&self) -> bool {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Setter side of a slot, used by the builder to wire instances
///
/// Implemented by [Inject], the builder only ever sees slots through this trait.
pub trait Slot: Send + Sync {
    /// The declared dependency type
    fn declared(&self) -> TypeInfo;

    /// Stores the value, replacing a previous one
    ///
    /// Returns false if the value was not cast to the declared type.
    fn fill(&self, value: &Resolved) -> bool;

    fn is_filled(&self) -> bool;
}

impl<T: ?Sized + Injectable> Slot for Inject<T> {
    fn declared(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn fill(&self, value: &Resolved) -> bool {
        let Some(value) = value.downcast::<T>() else {
            return false;
        };

        *self.cell.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
        true
    }

    fn is_filled(&self) -> bool {
        Inject::is_filled(self)
    }
}

/// Named reference to one slot of an instance
pub struct SlotRef<'a> {
    pub name: &'static str,
    pub slot: &'a dyn Slot,
}

impl<'a> SlotRef<'a> {
    pub fn new(name: &'static str, slot: &'a dyn Slot) -> Self {
        SlotRef { name, slot }
    }
}

/// Builds the slot list of a [Component](crate::Component) from its `Inject` fields.
///
/// ```rust
/// use tie::{slots, Component, Inject, SlotRef};
///
/// trait Store: Send + Sync {}
///
/// #[derive(Default)]
/// struct Service {
///     store: Inject<dyn Store>,
///     name: String,
/// }
///
/// impl Component for Service {
///     fn slots(&self) -> Vec<SlotRef<'_>> {
///         slots![self => store]
///     }
/// }
/// ```
#[macro_export]
macro_rules! slots {
    ($this:expr => $($field:ident),* $(,)?) => {
        vec![$($crate::SlotRef::new(stringify!($field), &$this.$field)),*]
    };
}
