//! Classification of registered values into instances and factories.
//!
//! The shape rules are enforced by the trait bounds of [IntoComponent], so a
//! value which is neither an instance nor a valid factory does not compile.
//!
//! An instance must be a [Component], plain values are rejected:
//!
//! ```compile_fail
//! struct Root;
//! impl tie::Component for Root {}
//!
//! let builder = tie::Builder::new(Root).with(42_u32);
//! ```
//!
//! A factory has to return a component, or a `Result` of one with an error
//! convertible into a boxed error:
//!
//! ```compile_fail
//! struct Root;
//! impl tie::Component for Root {}
//!
//! let builder = tie::Builder::new(|| -> Result<Root, ()> { Ok(Root) });
//! ```
//!
//! ```compile_fail
//! let builder = tie::Builder::new(|| String::from("not a component"));
//! ```
//!
//! Every factory parameter is a shared pointer to a capability or a component:
//!
//! ```compile_fail
//! use std::sync::Arc;
//!
//! struct Root;
//! impl tie::Component for Root {}
//!
//! let builder = tie::Builder::new(|port: u16| Root);
//! ```
//!
//! What is left for runtime is reading the slots and capabilities of every
//! registration, which is done here once per build.

use std::{marker::PhantomData, sync::Arc};

use crate::{
    component::{Capabilities, Component, Provision},
    factories::{Factory, FactoryOutput},
    slot::{Slot, SlotRef},
    types::{DynError, Instance, Resolved, TypeInfo},
};

/// Anything that can be registered on a [Builder](crate::Builder):
/// a component value, an `Arc` of one, or a factory function.
///
/// The `Marker` only keeps the three implementations apart.
pub trait IntoComponent<Marker> {
    /// The type the component provides as itself
    type Produces: Component;

    #[doc(hidden)]
    fn into_registration(self) -> Registration;
}

#[doc(hidden)]
pub struct OwnedInstance;
#[doc(hidden)]
pub struct SharedInstance;
#[doc(hidden)]
pub struct FactoryFn<Args, Out>(PhantomData<fn() -> (Args, Out)>);

impl<T: Component> IntoComponent<OwnedInstance> for T {
    type Produces = T;

    fn into_registration(self) -> Registration {
        Registration::instance(Arc::new(self))
    }
}

impl<T: Component> IntoComponent<SharedInstance> for Arc<T> {
    type Produces = T;

    fn into_registration(self) -> Registration {
        Registration::instance(self)
    }
}

impl<F, Args, Out> IntoComponent<FactoryFn<Args, Out>> for F
where
    F: Factory<Args, Out>,
    Args: 'static,
    Out: FactoryOutput,
{
    type Produces = Out::Produces;

    fn into_registration(self) -> Registration {
        Registration::factory(self)
    }
}

/// A registered component, as stored by the builder
pub struct Registration {
    pub(crate) name: String,
    pub(crate) produces: TypeInfo,
    provisions: fn() -> Vec<Provision>,
    source: Source,
}

enum Source {
    Instance {
        instance: Instance,
        wired: Arc<dyn Component>,
    },
    Factory(FactoryEntry),
}

/// A factory with its types erased
pub(crate) struct FactoryEntry {
    pub params: Vec<TypeInfo>,
    pub fallible: bool,
    invoke: Box<dyn Fn(&[Resolved]) -> Result<Instance, DynError> + Send + Sync>,
    product_slots: fn(&Instance) -> Vec<SlotRef<'_>>,
}

impl FactoryEntry {
    pub(crate) fn invoke(&self, args: &[Resolved]) -> Result<Instance, DynError> {
        (self.invoke)(args)
    }

    /// Slots of a value this factory produced
    pub(crate) fn product_slots<'v>(&self, product: &'v Instance) -> Vec<SlotRef<'v>> {
        (self.product_slots)(product)
    }
}

fn slots_of<T: Component>(instance: &Instance) -> Vec<SlotRef<'_>> {
    instance
        .instance
        .downcast_ref::<T>()
        .map(T::slots)
        .unwrap_or_default()
}

impl Registration {
    fn instance<T: Component>(instance: Arc<T>) -> Self {
        let produces = TypeInfo::of::<T>();
        Registration {
            name: produces.to_string(),
            produces,
            provisions: Capabilities::<T>::of,
            source: Source::Instance {
                instance: Instance::new(instance.clone()),
                wired: instance,
            },
        }
    }

    fn factory<F, Args, Out>(factory: F) -> Self
    where
        F: Factory<Args, Out>,
        Args: 'static,
        Out: FactoryOutput,
    {
        let params = <F as Factory<Args, Out>>::params();
        let name = signature(&params, TypeInfo::of::<Out>());
        let invoke = move |args: &[Resolved]| {
            <F as Factory<Args, Out>>::invoke(&factory, args)
                .map(|produced| Instance::new(Arc::new(produced)))
        };

        Registration {
            name,
            produces: TypeInfo::of::<Out::Produces>(),
            provisions: Capabilities::<Out::Produces>::of,
            source: Source::Factory(FactoryEntry {
                params,
                fallible: Out::FALLIBLE,
                invoke: Box::new(invoke),
                product_slots: slots_of::<Out::Produces>,
            }),
        }
    }
}

/// Renders a factory like `fn(dyn Store, Config) -> Result<Service, Error>`
fn signature(params: &[TypeInfo], output: TypeInfo) -> String {
    let params: Vec<String> = params.iter().map(TypeInfo::short_name).collect();
    format!("fn({}) -> {}", params.join(", "), output.short_name())
}

/// Kind of a classified component
pub(crate) enum NodeKind<'r> {
    Instance(&'r Instance),
    Factory(&'r FactoryEntry),
}

/// One requirement of a component: an instance field or a factory parameter
pub(crate) struct SlotInfo<'r> {
    pub index: usize,
    pub name: String,
    pub declared: TypeInfo,
    /// Setter for instance slots, factories receive their slots as arguments
    pub target: Option<&'r dyn Slot>,
}

/// A registration classified for one build
pub(crate) struct ComponentNode<'r> {
    pub position: usize,
    pub name: &'r str,
    pub produces: TypeInfo,
    pub provisions: Vec<Provision>,
    pub slots: Vec<SlotInfo<'r>>,
    pub kind: NodeKind<'r>,
}

impl ComponentNode<'_> {
    pub(crate) fn is_factory(&self) -> bool {
        matches!(self.kind, NodeKind::Factory(_))
    }

    /// How this component provides `declared`, if it can fill such a slot at all
    pub(crate) fn provision(&self, declared: TypeInfo) -> Option<&Provision> {
        self.provisions
            .iter()
            .find(|provision| provision.info.type_id == declared.type_id)
    }
}

/// Classifies one registration, reading its slots and capabilities
pub(crate) fn classify(position: usize, registration: &Registration) -> ComponentNode<'_> {
    let (kind, slots) = match &registration.source {
        Source::Instance { instance, wired } => {
            let slots: Vec<_> = wired
                .slots()
                .into_iter()
                .enumerate()
                .map(|(index, slot)| SlotInfo {
                    index,
                    name: slot.name.to_string(),
                    declared: slot.slot.declared(),
                    target: Some(slot.slot),
                })
                .collect();
            (NodeKind::Instance(instance), slots)
        }
        Source::Factory(entry) => {
            let slots: Vec<_> = entry
                .params
                .iter()
                .enumerate()
                .map(|(index, declared)| SlotInfo {
                    index,
                    name: format!("arg{index}"),
                    declared: *declared,
                    target: None,
                })
                .collect();
            (NodeKind::Factory(entry), slots)
        }
    };

    tracing::trace!(
        "Classified '{}' as {} with {} slot(s)",
        registration.name,
        match kind {
            NodeKind::Factory(entry) if entry.fallible => "fallible factory",
            NodeKind::Factory(_) => "factory",
            NodeKind::Instance(_) => "instance",
        },
        slots.len()
    );

    ComponentNode {
        position,
        name: &registration.name,
        produces: registration.produces,
        provisions: (registration.provisions)(),
        slots,
        kind,
    }
}
