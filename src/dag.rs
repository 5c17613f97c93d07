//! Generic topological layering shared by the outer step graph's tooling and
//! the inner per-package task graph (§4.D). One algorithm, two thin adapters
//! (see `taskgraph.rs` for the `TaskNode` adapter).

use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A node that can be layered: an identity plus a set of dependency ids.
/// Edges whose target is not present among the layered nodes are ignored.
pub trait Node {
    fn id(&self) -> &str;
    fn deps(&self) -> &[String];
}

#[derive(Debug, Error)]
#[error("Circular dependency detected among: {0:?}")]
pub struct CycleError(pub Vec<String>);

/// Partition `nodes` into an ordered list of layers. Each layer holds the
/// maximal set of remaining nodes with zero unsatisfied in-set dependencies;
/// within a layer, order follows the input order. Errors with `CycleError`
/// naming the remaining nodes if a round would emit an empty layer while
/// work remains.
pub fn layer<N: Node + Clone>(nodes: &[N]) -> Result<Vec<Vec<N>>, CycleError> {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id()).collect();

    // Only count dependencies that are actually present in the input set.
    let deps_in_set: HashMap<&str, Vec<&str>> = nodes
        .iter()
        .map(|n| {
            let deps: Vec<&str> = n
                .deps()
                .iter()
                .map(String::as_str)
                .filter(|d| ids.contains(d))
                .collect();
            (n.id(), deps)
        })
        .collect();

    let mut remaining: Vec<&N> = nodes.iter().collect();
    let mut done: HashSet<&str> = HashSet::new();
    let mut layers: Vec<Vec<N>> = Vec::new();

    while !remaining.is_empty() {
        let (ready, not_ready): (Vec<&N>, Vec<&N>) = remaining.into_iter().partition(|n| {
            deps_in_set
                .get(n.id())
                .map(|deps| deps.iter().all(|d| done.contains(d)))
                .unwrap_or(true)
        });

        if ready.is_empty() {
            let stuck: Vec<String> = not_ready.iter().map(|n| n.id().to_string()).collect();
            return Err(CycleError(stuck));
        }

        for n in &ready {
            done.insert(n.id());
        }
        layers.push(ready.into_iter().cloned().collect());
        remaining = not_ready;
    }

    Ok(layers)
}
