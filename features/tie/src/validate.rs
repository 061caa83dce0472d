use std::collections::HashSet;

use crate::{dependency_graph::DependencyGraph, errors::BuildError, initiator::ProductSlot};

/// Fails if any component declares the same type for two slots
///
/// Only the last such slot could ever be told apart from the first one,
/// so this is rejected regardless of whether a provider exists.
pub(crate) fn check_conflicts(graph: &DependencyGraph) -> Result<(), BuildError> {
    for node in graph.nodes() {
        let mut seen = HashSet::new();
        if let Some(slot) = node
            .slots
            .iter()
            .find(|slot| !seen.insert(slot.declared.type_id))
        {
            return Err(BuildError::InterfaceConflict {
                component: node.name.to_string(),
                interface: slot.declared,
            });
        }
    }
    Ok(())
}

/// Same as [check_conflicts], for the slots of factory products
pub(crate) fn check_product_conflicts(
    graph: &DependencyGraph,
    slots: &[ProductSlot],
) -> Result<(), BuildError> {
    let mut seen = HashSet::new();
    match slots
        .iter()
        .find(|slot| !seen.insert((slot.consumer, slot.declared.type_id)))
    {
        Some(slot) => Err(BuildError::InterfaceConflict {
            component: graph.node(slot.consumer).name.to_string(),
            interface: slot.declared,
        }),
        None => Ok(()),
    }
}

/// Fails on the first component after the root which no slot can take,
/// product slots included
pub(crate) fn check_unused(
    graph: &DependencyGraph,
    products: &[ProductSlot],
) -> Result<(), BuildError> {
    let takes = |position: usize| {
        graph.is_provider(position)
            || products
                .iter()
                .any(|slot| graph.providers_of(slot.declared).contains(&position))
    };

    match graph.nodes().iter().skip(1).find(|node| !takes(node.position)) {
        Some(node) => Err(BuildError::UnusedComponent(node.name.to_string())),
        None => Ok(()),
    }
}

/// Fails on the first instance or product slot still empty after construction
///
/// Slots created with a value count as satisfied even without a provider.
pub(crate) fn check_satisfied(
    graph: &DependencyGraph,
    products: &[ProductSlot],
) -> Result<(), BuildError> {
    for node in graph.nodes().iter().filter(|node| !node.is_factory()) {
        for slot in &node.slots {
            if slot.target.is_some_and(|target| !target.is_filled()) {
                return Err(BuildError::UnsatisfiedDependency {
                    component: node.name.to_string(),
                    slot: slot.name.clone(),
                    dependency: slot.declared,
                });
            }
        }
    }

    match products.iter().find(|slot| !slot.target.is_filled()) {
        Some(slot) => Err(BuildError::UnsatisfiedDependency {
            component: graph.node(slot.consumer).name.to_string(),
            slot: slot.name.to_string(),
            dependency: slot.declared,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        classify::{classify, IntoComponent, Registration},
        slot::SlotRef,
        slots, Component, Inject, TypeInfo,
    };

    struct Clock;
    impl Component for Clock {}

    struct Logger;
    impl Component for Logger {}

    #[derive(Default)]
    struct Twice {
        first: Inject<Clock>,
        second: Inject<Clock>,
    }
    impl Component for Twice {
        fn slots(&self) -> Vec<SlotRef<'_>> {
            slots![self => first, second]
        }
    }

    #[derive(Default)]
    struct Root {
        clock: Inject<Clock>,
    }
    impl Component for Root {
        fn slots(&self) -> Vec<SlotRef<'_>> {
            slots![self => clock]
        }
    }

    fn graph(registrations: &[Registration]) -> DependencyGraph<'_> {
        let nodes = registrations
            .iter()
            .enumerate()
            .map(|(position, registration)| classify(position, registration))
            .collect();
        DependencyGraph::new(nodes).expect("no factories involved")
    }

    #[test]
    fn repeated_slot_type_is_a_conflict_even_without_provider() {
        let registrations = vec![Twice::default().into_registration()];

        match check_conflicts(&graph(&registrations)) {
            Err(BuildError::InterfaceConflict {
                component,
                interface,
            }) => {
                assert_eq!(component, "Twice");
                assert_eq!(interface, TypeInfo::of::<Clock>());
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn components_nobody_takes_are_unused() {
        let registrations = vec![
            Root::default().into_registration(),
            Clock.into_registration(),
            Logger.into_registration(),
        ];

        let error = check_unused(&graph(&registrations), &[]).expect_err("logger is unused");
        assert_eq!(error.to_string(), "unused component: Logger");
    }

    #[test]
    fn root_is_never_unused() {
        let registrations = vec![Clock.into_registration()];
        assert!(check_unused(&graph(&registrations), &[]).is_ok());
    }

    #[test]
    fn empty_instance_slots_are_unsatisfied() {
        let registrations = vec![Root::default().into_registration()];

        let error = check_satisfied(&graph(&registrations), &[]).expect_err("clock is missing");
        assert_eq!(
            error.to_string(),
            "dependency not enough: Clock for Root#clock"
        );
    }

    #[test]
    fn prefilled_slots_are_satisfied() {
        let root = Root {
            clock: Inject::with(Arc::new(Clock)),
        };
        let registrations = vec![root.into_registration()];

        assert!(check_satisfied(&graph(&registrations), &[]).is_ok());
    }
}
