use crate::{
    classify::{FactoryEntry, NodeKind},
    dependency_graph::DependencyGraph,
    errors::BuildError,
    slot::Slot,
    types::{Instance, Resolved, TypeInfo},
};

/// Constructs all components of a graph in a given order
///
/// Instances exist from the start. Factories are called once all their providers
/// exist, and instance slots are filled as soon as their provider exists.
/// Slots of factory products are filled afterwards, see [product_slots].
pub(crate) struct Initiator<'g, 'r> {
    graph: &'g DependencyGraph<'r>,
    /// Produced values by registration index, None until constructed
    values: Vec<Option<Instance>>,
    /// Instance slots won by each provider, as (consumer, slot)
    wins: Vec<Vec<(usize, usize)>>,
}

impl<'g, 'r> Initiator<'g, 'r> {
    pub(crate) fn new(graph: &'g DependencyGraph<'r>) -> Self {
        let mut wins = vec![Vec::new(); graph.len()];
        for consumer in graph.nodes().iter().filter(|node| !node.is_factory()) {
            for slot in &consumer.slots {
                if let Some(provider) = graph.winner(consumer.position, slot.index) {
                    wins[provider].push((consumer.position, slot.index));
                }
            }
        }

        Initiator {
            graph,
            values: vec![None; graph.len()],
            wins,
        }
    }

    /// Runs construction, returning the value of every component by registration index.
    ///
    /// Aborts on the first failing factory, factories called before are not undone.
    pub(crate) fn initiate(mut self, order: &[usize]) -> Result<Vec<Instance>, BuildError> {
        tracing::debug!("Initializing graph with {} components", self.graph.len());

        let graph = self.graph;
        for node in graph.nodes() {
            if let NodeKind::Instance(instance) = node.kind {
                self.values[node.position] = Some(instance.clone());
            }
        }

        // Instance to instance wiring needs no ordering
        for node in graph.nodes().iter().filter(|node| !node.is_factory()) {
            self.wire_from(node.position)?;
        }

        for &position in order {
            if let NodeKind::Factory(entry) = graph.node(position).kind {
                self.construct(position, entry)?;
                self.wire_from(position)?;
            }
        }

        self.values
            .into_iter()
            .enumerate()
            .map(|(position, value)| {
                value.ok_or_else(|| BuildError::DowncastFailed {
                    required_type: graph.node(position).produces,
                    actual_type: "nothing, the component was never constructed".to_string(),
                })
            })
            .collect()
    }

    /// Calls a factory with the winning provider of each parameter
    fn construct(&mut self, position: usize, entry: &FactoryEntry) -> Result<(), BuildError> {
        let graph = self.graph;
        let node = graph.node(position);

        let mut args = Vec::with_capacity(node.slots.len());
        for slot in &node.slots {
            let provider = graph.winner(position, slot.index).ok_or_else(|| {
                BuildError::UnsatisfiedDependency {
                    component: node.name.to_string(),
                    slot: slot.name.clone(),
                    dependency: slot.declared,
                }
            })?;
            args.push(self.resolve(provider, slot.declared)?);
        }

        let instance = entry.invoke(&args).map_err(|error| {
            tracing::error!("Factory {} failed: {}", node.name, error);
            BuildError::factory_failed(node.name, error)
        })?;

        tracing::debug!("Constructed instance of {}", instance.info);
        self.values[position] = Some(instance);
        Ok(())
    }

    /// Fills every instance slot won by `provider`
    fn wire_from(&self, provider: usize) -> Result<(), BuildError> {
        for &(consumer, slot) in &self.wins[provider] {
            let slot = &self.graph.node(consumer).slots[slot];
            let Some(target) = slot.target else {
                continue;
            };

            let resolved = self.resolve(provider, slot.declared)?;
            if !target.fill(&resolved) {
                return Err(BuildError::DowncastFailed {
                    required_type: slot.declared,
                    actual_type: resolved.info().to_string(),
                });
            }

            tracing::trace!(
                "Wired {}#{} <- {}",
                self.graph.node(consumer).name,
                slot.name,
                self.graph.node(provider).name
            );
        }
        Ok(())
    }

    /// The value of a constructed provider, cast to a slot's declared type
    fn resolve(&self, provider: usize, declared: TypeInfo) -> Result<Resolved, BuildError> {
        let instance = self.values[provider]
            .as_ref()
            .ok_or_else(|| BuildError::DowncastFailed {
                required_type: declared,
                actual_type: format!(
                    "{}, which is not constructed yet",
                    self.graph.node(provider).name
                ),
            })?;

        cast(self.graph, provider, instance, declared)
    }
}

fn cast(
    graph: &DependencyGraph,
    provider: usize,
    instance: &Instance,
    declared: TypeInfo,
) -> Result<Resolved, BuildError> {
    graph
        .node(provider)
        .provision(declared)
        .and_then(|provision| provision.cast(instance))
        .ok_or_else(|| BuildError::DowncastFailed {
            required_type: declared,
            actual_type: instance.info.to_string(),
        })
}

/// A slot declared by a value a factory produced
///
/// These are only known once the factory ran, so they take no part in ordering.
pub(crate) struct ProductSlot<'v> {
    /// Registration index of the factory
    pub consumer: usize,
    pub name: &'static str,
    pub declared: TypeInfo,
    pub target: &'v dyn Slot,
}

/// Reads the slots of every factory product, `values` as returned by [Initiator::initiate]
pub(crate) fn product_slots<'v>(
    graph: &DependencyGraph,
    values: &'v [Instance],
) -> Vec<ProductSlot<'v>> {
    graph
        .nodes()
        .iter()
        .filter_map(|node| match node.kind {
            NodeKind::Factory(entry) => Some((node.position, entry)),
            NodeKind::Instance(_) => None,
        })
        .flat_map(|(position, entry)| {
            entry
                .product_slots(&values[position])
                .into_iter()
                .map(move |slot| ProductSlot {
                    consumer: position,
                    name: slot.name,
                    declared: slot.slot.declared(),
                    target: slot.slot,
                })
        })
        .collect()
}

/// Fills every product slot from the compatible provider registered last
///
/// All values exist at this point, so no order is needed. Slots without any
/// provider are left as they are.
pub(crate) fn wire_products(
    graph: &DependencyGraph,
    values: &[Instance],
    slots: &[ProductSlot],
) -> Result<(), BuildError> {
    for slot in slots {
        let Some(&provider) = graph.providers_of(slot.declared).last() else {
            continue;
        };

        let resolved = cast(graph, provider, &values[provider], slot.declared)?;
        if !slot.target.fill(&resolved) {
            return Err(BuildError::DowncastFailed {
                required_type: slot.declared,
                actual_type: resolved.info().to_string(),
            });
        }

        tracing::trace!(
            "Wired {}#{} <- {}",
            graph.node(slot.consumer).name,
            slot.name,
            graph.node(provider).name
        );
    }
    Ok(())
}
