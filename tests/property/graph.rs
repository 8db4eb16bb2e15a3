// tests/property/graph.rs

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use proptest::prelude::*;

use assetdag::dag::{OutputTarget, Task, TaskGraph};
use assetdag::errors::BuildError;
use assetdag::exec::builtin::CopyTransform;

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, deps)| {
                    let set: BTreeSet<usize> = deps
                        .into_iter()
                        .filter(|_| i > 0)
                        .map(|d| d % i.max(1))
                        .collect();
                    set.into_iter().collect()
                })
                .collect()
        })
    })
}

fn name(i: usize) -> String {
    format!("task_{i:02}")
}

fn build_graph(deps: &[Vec<usize>]) -> TaskGraph {
    let copy = Arc::new(CopyTransform);
    let mut graph = TaskGraph::new();
    for (i, ds) in deps.iter().enumerate() {
        let mut task = Task::new(
            name(i),
            copy.clone(),
            OutputTarget::File(format!("{}.out", name(i)).into()),
        );
        for d in ds {
            task = task.after(name(*d));
        }
        graph.add_task(task).unwrap();
    }
    graph
}

proptest! {
    #[test]
    fn every_task_is_ordered_after_its_dependencies(deps in dag_strategy(12)) {
        let graph = build_graph(&deps);
        let batches = graph.topological_order().unwrap();

        let mut batch_of: HashMap<String, usize> = HashMap::new();
        for (b, batch) in batches.iter().enumerate() {
            // Batches are deterministic: sorted by identifier.
            let mut sorted = batch.clone();
            sorted.sort();
            prop_assert_eq!(&sorted, batch);
            for id in batch {
                prop_assert!(batch_of.insert(id.clone(), b).is_none(), "{} scheduled twice", id);
            }
        }
        prop_assert_eq!(batch_of.len(), deps.len());

        for (i, ds) in deps.iter().enumerate() {
            for d in ds {
                prop_assert!(batch_of[&name(*d)] < batch_of[&name(i)]);
            }
        }
    }

    #[test]
    fn dependents_are_exactly_the_reachable_tasks(deps in dag_strategy(10), pick in any::<usize>()) {
        let graph = build_graph(&deps);
        let start = pick % deps.len();

        // Reference closure by forward propagation over the index order.
        let mut reachable = vec![false; deps.len()];
        reachable[start] = true;
        for (i, ds) in deps.iter().enumerate() {
            if ds.iter().any(|d| reachable[*d]) {
                reachable[i] = true;
            }
        }
        let expected: BTreeSet<String> = (0..deps.len())
            .filter(|i| *i != start && reachable[*i])
            .map(name)
            .collect();

        prop_assert_eq!(graph.dependents_of(&name(start)), expected);
    }

    #[test]
    fn back_edge_makes_ordering_fail(deps in dag_strategy(10), a in any::<usize>(), b in any::<usize>()) {
        prop_assume!(deps.len() >= 2);
        let n = deps.len();
        let (lo, hi) = {
            let x = a % n;
            let y = b % n;
            if x == y { (0, n - 1) } else { (x.min(y), x.max(y)) }
        };

        // Force a path lo -> hi, then close it with hi -> lo.
        let mut deps = deps;
        if !deps[hi].contains(&lo) {
            deps[hi].push(lo);
        }
        let copy = Arc::new(CopyTransform);
        let mut graph = TaskGraph::new();
        for (i, ds) in deps.iter().enumerate() {
            let mut task = Task::new(
                name(i),
                copy.clone(),
                OutputTarget::File(format!("{}.out", name(i)).into()),
            );
            for d in ds {
                task = task.after(name(*d));
            }
            if i == lo {
                task = task.after(name(hi));
            }
            graph.add_task(task).unwrap();
        }

        match graph.topological_order() {
            Err(BuildError::Cycle(id)) => prop_assert!(graph.contains(&id)),
            other => prop_assert!(false, "expected a cycle, got {:?}", other.map(|b| b.len())),
        }
    }
}
