use std::{cmp::Reverse, collections::BinaryHeap};

use crate::{
    dependency_graph::{DependencyEdge, DependencyGraph},
    errors::{BuildError, CycleStep, CycleTrace},
};

/// Orders all components so every factory comes after its providers.
///
/// Kahn's algorithm over the factory edges only, ties are broken by registration
/// order. If components are left over, a concrete cycle is traced and returned.
pub(crate) fn construction_order(graph: &DependencyGraph) -> Result<Vec<usize>, BuildError> {
    let n = graph.len();
    let mut outgoing: Vec<Vec<DependencyEdge>> = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    for edge in graph.ordering_edges() {
        outgoing[edge.provider].push(edge);
        indegree[edge.consumer] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&position| indegree[position] == 0)
        .map(Reverse)
        .collect();
    let mut removed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(position)) = ready.pop() {
        removed[position] = true;
        order.push(position);

        for edge in &outgoing[position] {
            indegree[edge.consumer] -= 1;
            if indegree[edge.consumer] == 0 {
                ready.push(Reverse(edge.consumer));
            }
        }
    }

    if order.len() == n {
        return Ok(order);
    }

    let trace = find_cycle(graph, &outgoing, &removed).unwrap_or_else(|| {
        // Can't happen with a left over component, report the first one on its own
        let stuck = removed.iter().position(|done| !done).unwrap_or_default();
        CycleTrace {
            start: graph.node(stuck).name.to_string(),
            steps: Vec::new(),
        }
    });

    tracing::error!("Dependency cycle between factories: {trace}");
    Err(BuildError::DependencyCycle(trace))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnStack,
    Done,
}

struct Frame {
    node: usize,
    next_edge: usize,
    entered_by: Option<DependencyEdge>,
}

/// Depth first search over the components left by the sort, with an explicit stack.
///
/// Returns the first loop found, starting at the lowest registration index possible.
fn find_cycle(
    graph: &DependencyGraph,
    outgoing: &[Vec<DependencyEdge>],
    removed: &[bool],
) -> Option<CycleTrace> {
    let mut visit = vec![Visit::Unvisited; outgoing.len()];

    for root in (0..outgoing.len()).filter(|&position| !removed[position]) {
        if visit[root] != Visit::Unvisited {
            continue;
        }

        visit[root] = Visit::OnStack;
        let mut stack = vec![Frame {
            node: root,
            next_edge: 0,
            entered_by: None,
        }];

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            let Some(&edge) = outgoing[node].get(frame.next_edge) else {
                visit[node] = Visit::Done;
                stack.pop();
                continue;
            };
            frame.next_edge += 1;

            let next = edge.consumer;
            if removed[next] {
                continue;
            }

            match visit[next] {
                Visit::Done => {}
                Visit::Unvisited => {
                    visit[next] = Visit::OnStack;
                    stack.push(Frame {
                        node: next,
                        next_edge: 0,
                        entered_by: Some(edge),
                    });
                }
                Visit::OnStack => {
                    let start = stack.iter().position(|frame| frame.node == next)?;
                    return Some(trace(graph, &stack[start..], edge));
                }
            }
        }
    }

    None
}

/// Renders the frames of a loop, closed by `closing` back onto the first frame
fn trace(graph: &DependencyGraph, frames: &[Frame], closing: DependencyEdge) -> CycleTrace {
    let step = |edge: DependencyEdge| CycleStep {
        requirement: graph.slot(edge).declared,
        component: graph.node(edge.consumer).name.to_string(),
    };

    CycleTrace {
        start: graph.node(frames[0].node).name.to_string(),
        steps: frames[1..]
            .iter()
            .filter_map(|frame| frame.entered_by)
            .chain(std::iter::once(closing))
            .map(step)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        classify::{classify, IntoComponent, Registration},
        slot::SlotRef,
        slots, Capabilities, Component, Inject, TypeInfo,
    };

    trait Left: Send + Sync {}
    trait Right: Send + Sync {}

    struct L;
    impl Left for L {}
    impl Component for L {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.add::<dyn Left>(|it| it);
        }
    }

    struct R;
    impl Right for R {}
    impl Component for R {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.add::<dyn Right>(|it| it);
        }
    }

    #[derive(Default)]
    struct Top {
        left: Inject<dyn Left>,
        right: Inject<dyn Right>,
    }
    impl Component for Top {
        fn slots(&self) -> Vec<SlotRef<'_>> {
            slots![self => left, right]
        }
    }

    fn left(_right: Arc<dyn Right>) -> L {
        L
    }

    fn right(_left: Arc<dyn Left>) -> R {
        R
    }

    fn plain_right() -> R {
        R
    }

    fn order_of(registrations: &[Registration]) -> Result<Vec<usize>, BuildError> {
        let nodes = registrations
            .iter()
            .enumerate()
            .map(|(position, registration)| classify(position, registration))
            .collect();
        construction_order(&DependencyGraph::new(nodes)?)
    }

    #[test]
    fn providers_come_before_factories() {
        let registrations = vec![
            Top::default().into_registration(),
            left.into_registration(),
            plain_right.into_registration(),
        ];

        assert_eq!(order_of(&registrations).expect("no cycle"), vec![0, 2, 1]);
    }

    #[test]
    fn ties_follow_registration_order() {
        let registrations = vec![
            Top::default().into_registration(),
            L.into_registration(),
            R.into_registration(),
        ];

        assert_eq!(order_of(&registrations).expect("no cycle"), vec![0, 1, 2]);
    }

    #[test]
    fn instance_cycles_do_not_constrain_order() {
        #[derive(Default)]
        struct Ping {
            pong: Inject<Pong>,
        }
        impl Component for Ping {
            fn slots(&self) -> Vec<SlotRef<'_>> {
                slots![self => pong]
            }
        }
        #[derive(Default)]
        struct Pong {
            ping: Inject<Ping>,
        }
        impl Component for Pong {
            fn slots(&self) -> Vec<SlotRef<'_>> {
                slots![self => ping]
            }
        }

        let registrations = vec![
            Ping::default().into_registration(),
            Pong::default().into_registration(),
        ];
        assert_eq!(order_of(&registrations).expect("no cycle"), vec![0, 1]);
    }

    #[test]
    fn factory_cycle_is_traced() {
        let registrations = vec![
            Top::default().into_registration(),
            left.into_registration(),
            right.into_registration(),
        ];

        let Err(BuildError::DependencyCycle(trace)) = order_of(&registrations) else {
            panic!("expected a cycle");
        };
        assert_eq!(
            trace,
            CycleTrace {
                start: "fn(dyn Right) -> L".into(),
                steps: vec![
                    CycleStep {
                        requirement: TypeInfo::of::<dyn Left>(),
                        component: "fn(dyn Left) -> R".into(),
                    },
                    CycleStep {
                        requirement: TypeInfo::of::<dyn Right>(),
                        component: "fn(dyn Right) -> L".into(),
                    },
                ],
            }
        );
        assert_eq!(
            trace.to_string(),
            "fn(dyn Right) -> L -> dyn Left for fn(dyn Left) -> R -> dyn Right for fn(dyn Right) -> L"
        );
    }

    #[test]
    fn self_dependent_factory_is_a_cycle() {
        fn chain(_previous: Arc<dyn Left>) -> L {
            L
        }

        let registrations = vec![chain.into_registration()];
        let Err(BuildError::DependencyCycle(trace)) = order_of(&registrations) else {
            panic!("expected a cycle");
        };
        assert_eq!(trace.to_string(), "fn(dyn Left) -> L -> dyn Left for fn(dyn Left) -> L");
        assert_eq!(trace.components(), vec!["fn(dyn Left) -> L"; 2]);
    }
}
