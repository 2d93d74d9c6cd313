//! Deadlock breaking for cyclic grammars
//!
//! Left-recursive and mutually recursive productions make dispatchers wait
//! on each other. Once the pool runs dry while dispatchers are still
//! active, nothing but the breaker can make progress.
//!
//! The breaker builds the wait-for graph among incomplete dispatchers
//! (an edge `Y -> X` when a walker owned by `Y` is a dependent of `X`) and
//! force-completes every dispatcher of each *terminal* strongly connected
//! component, i.e. one with no edge to another component. A terminal
//! component can never be fed from outside, so completing it loses no
//! match an acyclic derivation could still produce.

use super::parser::Session;
use super::table::FastMap;
use std::sync::Arc;

/// Force-complete the terminal components of the wait-for graph
///
/// Returns how many dispatchers were forced.
pub(crate) fn resolve(session: &Arc<Session>) -> usize {
    let stuck: Vec<_> = session
        .dispatchers()
        .into_iter()
        .filter(|d| !d.is_completed())
        .collect();

    let node_of: FastMap<_, _> = stuck
        .iter()
        .enumerate()
        .map(|(node, d)| (d.id(), node))
        .collect();

    let mut edges = vec![Vec::new(); stuck.len()];
    for (target, dispatcher) in stuck.iter().enumerate() {
        for owner in dispatcher.waiting_owners() {
            if let Some(&source) = node_of.get(&owner) {
                edges[source].push(target);
            }
        }
    }

    let mut forced = 0;
    for component in terminal_components(&edges) {
        log_debug!(
            "breaking cycle of {} categories at {}",
            component.len(),
            stuck[component[0]].category()
        );
        for node in component {
            stuck[node].force_complete(session);
            forced += 1;
        }
    }
    forced
}

/// Strongly connected components with no edge leaving them
///
/// `edges[n]` lists the successors of node `n`. Components are found with
/// an iterative Kosaraju pass; each is returned with its nodes ascending,
/// components ordered by their smallest node.
pub(crate) fn terminal_components(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = edges.len();

    // First pass: nodes in order of DFS completion
    let mut visited = vec![false; n];
    let mut finished = Vec::with_capacity(n);
    for root in 0..n {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut stack = vec![(root, 0usize)];
        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            if next < edges[node].len() {
                top.1 += 1;
                let successor = edges[node][next];
                if !visited[successor] {
                    visited[successor] = true;
                    stack.push((successor, 0));
                }
            } else {
                finished.push(node);
                stack.pop();
            }
        }
    }

    let mut reverse = vec![Vec::new(); n];
    for (from, targets) in edges.iter().enumerate() {
        for &to in targets {
            reverse[to].push(from);
        }
    }

    // Second pass: components on the reversed graph
    const UNASSIGNED: usize = usize::MAX;
    let mut component = vec![UNASSIGNED; n];
    let mut count = 0;
    for &root in finished.iter().rev() {
        if component[root] != UNASSIGNED {
            continue;
        }
        component[root] = count;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for &predecessor in &reverse[node] {
                if component[predecessor] == UNASSIGNED {
                    component[predecessor] = count;
                    stack.push(predecessor);
                }
            }
        }
        count += 1;
    }

    let mut exits = vec![false; count];
    for (from, targets) in edges.iter().enumerate() {
        for &to in targets {
            if component[from] != component[to] {
                exits[component[from]] = true;
            }
        }
    }

    let mut groups = vec![Vec::new(); count];
    for node in 0..n {
        if !exits[component[node]] {
            groups[component[node]].push(node);
        }
    }
    groups.retain(|g| !g.is_empty());
    groups.sort_by_key(|g| g[0]);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph() {
        assert!(terminal_components(&[]).is_empty());
    }

    #[test]
    fn test_self_loop() {
        assert_eq!(terminal_components(&[vec![0]]), vec![vec![0]]);
    }

    #[test]
    fn test_cycle_is_terminal() {
        // 0 -> 1 -> 2 -> 0
        let edges = vec![vec![1], vec![2], vec![0]];
        assert_eq!(terminal_components(&edges), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_waiting_component_is_not_terminal() {
        // {0, 1} waits on the cycle {2, 3}
        let edges = vec![vec![1], vec![0, 2], vec![3], vec![2]];
        assert_eq!(terminal_components(&edges), vec![vec![2, 3]]);
    }

    #[test]
    fn test_independent_cycles() {
        let edges = vec![vec![0], vec![2], vec![1], vec![0]];
        assert_eq!(terminal_components(&edges), vec![vec![0], vec![1, 2]]);
    }

    #[test]
    fn test_chain_ends_in_sink() {
        // 0 -> 1 -> 2, node 2 has no edges
        let edges = vec![vec![1], vec![2], vec![]];
        assert_eq!(terminal_components(&edges), vec![vec![2]]);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let n = 100_000;
        let mut edges: Vec<Vec<usize>> = (0..n).map(|i| vec![i + 1]).collect();
        edges[n - 1] = vec![0];
        let components = terminal_components(&edges);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), n);
    }
}
