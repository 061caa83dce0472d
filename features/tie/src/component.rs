use std::{marker::PhantomData, sync::Arc};

use crate::{
    slot::SlotRef,
    types::{Injectable, Instance, Resolved, TypeInfo},
};

/// A type which can take part in a graph, either as a registered instance
/// or as the product of a factory.
///
/// Both methods have defaults, so a plain struct only needs an empty impl:
///
/// ```rust
/// struct Clock;
/// impl tie::Component for Clock {}
/// ```
pub trait Component: Injectable {
    /// Declares the capabilities (trait objects) this type can be injected as.
    ///
    /// Every component can always be injected as its own concrete type.
    fn capabilities(caps: &mut Capabilities<Self>)
    where
        Self: Sized,
    {
        let _ = caps;
    }

    /// Lists the slots to fill when this component is registered as an instance.
    ///
    /// Use [slots!](crate::slots) to build the list from `Inject` fields.
    fn slots(&self) -> Vec<SlotRef<'_>> {
        Vec::new()
    }
}

/// The static set of types a component can be provided as
///
/// ```rust
/// use tie::{Capabilities, Component};
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 {
///         0
///     }
/// }
/// impl Component for FixedClock {
///     fn capabilities(caps: &mut Capabilities<Self>) {
///         caps.add::<dyn Clock>(|it| it);
///     }
/// }
/// ```
pub struct Capabilities<T> {
    provisions: Vec<Provision>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> Capabilities<T> {
    /// Provisions of `T`, its own type first
    pub(crate) fn of() -> Vec<Provision> {
        let mut caps = Capabilities {
            provisions: Vec::new(),
            _marker: PhantomData,
        };
        caps.add::<T>(|it| it);
        T::capabilities(&mut caps);

        caps.provisions
    }

    /// Lets `T` fill slots declared as `I`
    ///
    /// The cast is usually just `|it| it`, relying on unsized coercion to `Arc<dyn Trait>`.
    pub fn add<I: ?Sized + Injectable>(&mut self, cast: fn(Arc<T>) -> Arc<I>) -> &mut Self {
        let info = TypeInfo::of::<I>();
        if self.provisions.iter().any(|provision| provision.info == info) {
            return self;
        }

        self.provisions.push(Provision {
            info,
            cast: Box::new(move |instance| {
                instance
                    .downcast::<T>()
                    .ok()
                    .map(|concrete| Resolved::new(cast(concrete)))
            }),
        });
        self
    }
}

/// One type a provider can be cast to
pub(crate) struct Provision {
    pub info: TypeInfo,
    cast: Box<dyn Fn(&Instance) -> Option<Resolved> + Send + Sync>,
}

impl Provision {
    /// Casts the provider's value to this provision's type
    pub(crate) fn cast(&self, instance: &Instance) -> Option<Resolved> {
        (self.cast)(instance)
    }
}
