use std::{fmt, marker::PhantomData, sync::Arc};

use crate::{
    classify::{classify, IntoComponent, Registration},
    component::Component,
    dependency_graph::DependencyGraph,
    errors::BuildError,
    initiator::{product_slots, wire_products, Initiator},
    ordering::construction_order,
    types::{short_type_name, TypeInfo},
    validate,
};

/// Registry of components which are wired into one root value.
///
/// The first registered component is the root. Every other component has to
/// be taken by at least one slot, either of the root or of another component.
///
/// ```rust
/// use std::sync::Arc;
/// use tie::{slots, Builder, Capabilities, Component, Inject, SlotRef};
///
/// trait Answer: Send + Sync {
///     fn get(&self) -> i32;
/// }
///
/// struct FortyTwo;
/// impl Answer for FortyTwo {
///     fn get(&self) -> i32 {
///         42
///     }
/// }
/// impl Component for FortyTwo {
///     fn capabilities(caps: &mut Capabilities<Self>) {
///         caps.add::<dyn Answer>(|it| it);
///     }
/// }
///
/// #[derive(Default)]
/// struct App {
///     answer: Inject<dyn Answer>,
/// }
/// impl Component for App {
///     fn slots(&self) -> Vec<SlotRef<'_>> {
///         slots![self => answer]
///     }
/// }
///
/// let app: Arc<App> = Builder::new(App::default()).with(FortyTwo).build().unwrap();
/// assert_eq!(app.answer.get().get(), 42);
/// ```
pub struct Builder<R> {
    registrations: Vec<Registration>,
    _root: PhantomData<fn() -> R>,
}

impl<R: Component> Builder<R> {
    /// Starts a graph with its root, an instance or a factory producing `R`
    pub fn new<M, C>(root: C) -> Self
    where
        C: IntoComponent<M, Produces = R>,
    {
        Builder {
            registrations: vec![root.into_registration()],
            _root: PhantomData,
        }
    }

    /// Registers one more component
    ///
    /// If it is compatible with a slot another component already satisfies,
    /// it replaces that one.
    pub fn with<M, C>(mut self, component: C) -> Self
    where
        C: IntoComponent<M>,
    {
        self.registrations.push(component.into_registration());
        self
    }

    /// Display names of all registered components, root first
    pub fn components(&self) -> Vec<&str> {
        self.registrations
            .iter()
            .map(|registration| registration.name.as_str())
            .collect()
    }

    /// Wires all components and returns the root.
    ///
    /// Every call runs all factories again and overwrites the slots of
    /// registered instances. Slots of factory products are filled once all
    /// factories ran.
    pub fn build(&self) -> Result<Arc<R>, BuildError> {
        self.try_build()
            .inspect_err(|error| tracing::warn!("Build of {} failed: {error}", self.root_name()))
    }

    /// Same as [Builder::build]
    ///
    /// # Panics
    /// - On any [BuildError], with its message
    pub fn must_build(&self) -> Arc<R> {
        self.build().unwrap_or_else(|error| panic!("{error}"))
    }

    /// Computes construction order and wiring without calling any factory
    /// or touching any slot.
    ///
    /// Fails on missing factory arguments, conflicts and cycles. Slots declared
    /// by factory products only exist once the factory ran, so they are not
    /// listed, and unused components are only detected by a build.
    pub fn plan(&self) -> Result<Plan, BuildError> {
        let graph = self.graph()?;
        let order = construction_order(&graph)?;

        let wiring = graph
            .nodes()
            .iter()
            .flat_map(|node| {
                node.slots.iter().map(|slot| Wiring {
                    consumer: node.name.to_string(),
                    slot: slot.name.clone(),
                    dependency: slot.declared,
                    provider: graph
                        .winner(node.position, slot.index)
                        .map(|provider| graph.node(provider).name.to_string()),
                })
            })
            .collect();

        Ok(Plan {
            order: order
                .into_iter()
                .map(|position| graph.node(position).name.to_string())
                .collect(),
            wiring,
        })
    }

    fn try_build(&self) -> Result<Arc<R>, BuildError> {
        tracing::debug!(
            "Building {} from {} components",
            self.root_name(),
            self.registrations.len()
        );

        let graph = self.graph()?;
        let order = construction_order(&graph)?;

        let values = Initiator::new(&graph).initiate(&order)?;

        let products = product_slots(&graph, &values);
        validate::check_product_conflicts(&graph, &products)?;
        wire_products(&graph, &values, &products)?;

        validate::check_unused(&graph, &products)?;
        validate::check_satisfied(&graph, &products)?;

        let root = values
            .first()
            .ok_or_else(|| BuildError::DowncastFailed {
                required_type: TypeInfo::of::<R>(),
                actual_type: "no root registered".to_string(),
            })?;
        root.downcast::<R>()
            .map_err(|actual| BuildError::DowncastFailed {
                required_type: TypeInfo::of::<R>(),
                actual_type: short_type_name(actual),
            })
    }

    /// Classifies all registrations and links them, checks which need no construction run first
    fn graph(&self) -> Result<DependencyGraph<'_>, BuildError> {
        let nodes = self
            .registrations
            .iter()
            .enumerate()
            .map(|(position, registration)| classify(position, registration))
            .collect();

        let graph = DependencyGraph::new(nodes)?;
        validate::check_conflicts(&graph)?;
        Ok(graph)
    }

    fn root_name(&self) -> &str {
        self.registrations
            .first()
            .map(|registration| registration.name.as_str())
            .unwrap_or_default()
    }
}

impl<R> fmt::Debug for Builder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("root", &short_type_name(std::any::type_name::<R>()))
            .field(
                "components",
                &self
                    .registrations
                    .iter()
                    .map(|registration| registration.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Outcome of [Builder::plan]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Component names in the order a build constructs them
    pub order: Vec<String>,
    /// Every slot of every component, in registration order
    pub wiring: Vec<Wiring>,
}

/// The provider chosen for one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wiring {
    pub consumer: String,
    pub slot: String,
    pub dependency: TypeInfo,
    /// None for an instance slot without provider, which a build only
    /// accepts if the slot was created with a value
    pub provider: Option<String>,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "order:")?;
        for (index, name) in self.order.iter().enumerate() {
            writeln!(f, "  {index}. {name}")?;
        }

        writeln!(f, "wiring:")?;
        for wiring in &self.wiring {
            writeln!(
                f,
                "  {}#{} ({}) <- {}",
                wiring.consumer,
                wiring.slot,
                wiring.dependency,
                wiring.provider.as_deref().unwrap_or("nothing")
            )?;
        }
        Ok(())
    }
}
