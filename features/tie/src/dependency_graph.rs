use std::{any::TypeId, collections::HashMap};

use crate::{
    classify::{ComponentNode, SlotInfo},
    errors::BuildError,
    types::TypeInfo,
};

/// Whether `provider` can fill a slot declared as `declared`
///
/// True when the provider is exactly that type, or declared the capability.
pub(crate) fn compatible(provider: &ComponentNode, declared: TypeInfo) -> bool {
    provider.provision(declared).is_some()
}

/// Provider -> Consumer relation, tagged with the slot it satisfies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DependencyEdge {
    pub provider: usize,
    pub consumer: usize,
    pub slot: usize,
}

/// Graph of all components of one build
///
/// Holds every provider compatible with every slot. When several providers are
/// compatible the one registered last wins.
pub(crate) struct DependencyGraph<'r> {
    nodes: Vec<ComponentNode<'r>>,
    /// Compatible providers per node, per slot, in registration order
    candidates: Vec<Vec<Vec<usize>>>,
    /// Capability index: providers of every provided type, in registration order
    providers_of: HashMap<TypeId, Vec<usize>>,
}

impl<'r> DependencyGraph<'r> {
    /// Links every slot to its compatible providers
    ///
    /// Fails on the first factory parameter without any provider, factories can't
    /// be called with missing arguments. Empty instance slots are left to validation.
    pub fn new(nodes: Vec<ComponentNode<'r>>) -> Result<Self, BuildError> {
        // Capability index, computed once, turns compatibility into a lookup
        let mut providers_of: HashMap<TypeId, Vec<usize>> = HashMap::new();
        for node in &nodes {
            for provision in &node.provisions {
                providers_of
                    .entry(provision.info.type_id)
                    .or_default()
                    .push(node.position);
            }
        }

        let mut candidates = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let mut per_slot = Vec::with_capacity(node.slots.len());
            for slot in &node.slots {
                let providers = providers_of
                    .get(&slot.declared.type_id)
                    .cloned()
                    .unwrap_or_default();
                debug_assert!(providers
                    .iter()
                    .all(|&provider| compatible(&nodes[provider], slot.declared)));

                if providers.is_empty() && node.is_factory() {
                    return Err(BuildError::UnsatisfiedDependency {
                        component: node.name.to_string(),
                        slot: slot.name.clone(),
                        dependency: slot.declared,
                    });
                }

                tracing::trace!(
                    "{}#{} ({}) has {} compatible provider(s)",
                    node.name,
                    slot.name,
                    slot.declared,
                    providers.len()
                );
                per_slot.push(providers);
            }
            candidates.push(per_slot);
        }

        Ok(DependencyGraph {
            nodes,
            candidates,
            providers_of,
        })
    }

    pub fn nodes(&self) -> &[ComponentNode<'r>] {
        &self.nodes
    }

    pub fn node(&self, position: usize) -> &ComponentNode<'r> {
        &self.nodes[position]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn slot(&self, edge: DependencyEdge) -> &SlotInfo<'r> {
        &self.nodes[edge.consumer].slots[edge.slot]
    }

    /// All providers compatible with a slot, in registration order
    pub fn candidates(&self, consumer: usize, slot: usize) -> &[usize] {
        &self.candidates[consumer][slot]
    }

    /// All providers compatible with a type, in registration order
    ///
    /// Used for slots which are only known once their owner was constructed.
    pub fn providers_of(&self, declared: TypeInfo) -> &[usize] {
        self.providers_of
            .get(&declared.type_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The provider filling a slot: the compatible one registered last
    pub fn winner(&self, consumer: usize, slot: usize) -> Option<usize> {
        self.candidates(consumer, slot).last().copied()
    }

    /// Every provider -> consumer edge
    pub fn edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.candidates
            .iter()
            .enumerate()
            .flat_map(|(consumer, per_slot)| {
                per_slot.iter().enumerate().flat_map(move |(slot, providers)| {
                    providers.iter().map(move |&provider| DependencyEdge {
                        provider,
                        consumer,
                        slot,
                    })
                })
            })
    }

    /// Edges constraining construction order, those consumed by a factory
    ///
    /// Instances can reference each other in any order once they exist,
    /// so their edges never take part in ordering.
    pub fn ordering_edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.edges()
            .filter(|edge| self.nodes[edge.consumer].is_factory())
    }

    /// Whether a component is compatible with at least one slot anywhere in the graph
    pub fn is_provider(&self, position: usize) -> bool {
        self.edges().any(|edge| edge.provider == position)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        classify::{classify, IntoComponent, Registration},
        slot::SlotRef,
        slots, Capabilities, Component, Inject,
    };

    trait Store: Send + Sync {}

    struct Memory;
    impl Store for Memory {}
    impl Component for Memory {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.add::<dyn Store>(|it| it);
        }
    }

    struct Disk;
    impl Store for Disk {}
    impl Component for Disk {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.add::<dyn Store>(|it| it);
        }
    }

    #[derive(Default)]
    struct Service {
        store: Inject<dyn Store>,
    }
    impl Component for Service {
        fn slots(&self) -> Vec<SlotRef<'_>> {
            slots![self => store]
        }
    }

    struct Report;
    impl Component for Report {}

    fn report(_store: Arc<dyn Store>) -> Report {
        Report
    }

    fn graph(registrations: &[Registration]) -> Result<DependencyGraph<'_>, BuildError> {
        let nodes = registrations
            .iter()
            .enumerate()
            .map(|(position, registration)| classify(position, registration))
            .collect();
        DependencyGraph::new(nodes)
    }

    #[test]
    fn compatibility_covers_own_type_and_capabilities() {
        let registration = Memory.into_registration();
        let node = classify(0, &registration);

        assert!(compatible(&node, TypeInfo::of::<Memory>()));
        assert!(compatible(&node, TypeInfo::of::<dyn Store>()));
        assert!(!compatible(&node, TypeInfo::of::<Disk>()));
    }

    #[test]
    fn last_registered_provider_wins() {
        let registrations = vec![
            Service::default().into_registration(),
            Memory.into_registration(),
            Disk.into_registration(),
        ];
        let graph = graph(&registrations).expect("all slots satisfiable");

        assert_eq!(graph.candidates(0, 0), &[1, 2]);
        assert_eq!(graph.providers_of(TypeInfo::of::<dyn Store>()), &[1, 2]);
        assert!(graph.providers_of(TypeInfo::of::<Report>()).is_empty());
        assert_eq!(graph.winner(0, 0), Some(2));
        assert_eq!(graph.edges().count(), 2);
        assert_eq!(graph.ordering_edges().count(), 0);
        assert!(graph.is_provider(1));
        assert!(graph.is_provider(2));
        assert!(!graph.is_provider(0));
    }

    #[test]
    fn factory_edges_constrain_ordering() {
        let registrations = vec![report.into_registration(), Memory.into_registration()];
        let graph = graph(&registrations).expect("all slots satisfiable");

        let edges: Vec<_> = graph.ordering_edges().collect();
        assert_eq!(
            edges,
            vec![DependencyEdge {
                provider: 1,
                consumer: 0,
                slot: 0
            }]
        );
        assert_eq!(graph.slot(edges[0]).declared, TypeInfo::of::<dyn Store>());
    }

    #[test]
    fn unsatisfied_factory_fails_early() {
        let registrations = vec![report.into_registration()];
        let error = graph(&registrations).err().expect("store is missing");

        match error {
            BuildError::UnsatisfiedDependency {
                component,
                slot,
                dependency,
            } => {
                assert_eq!(component, "fn(dyn Store) -> Report");
                assert_eq!(slot, "arg0");
                assert_eq!(dependency, TypeInfo::of::<dyn Store>());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unsatisfied_instance_is_deferred() {
        let registrations = vec![Service::default().into_registration()];
        let graph = graph(&registrations).expect("instances are checked after construction");

        assert!(graph.candidates(0, 0).is_empty());
        assert_eq!(graph.winner(0, 0), None);
    }
}
