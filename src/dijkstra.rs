use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::{BinaryHeap, HashMap};
use std::cmp::Ordering;

use petgraph::Direction;
use petgraph::algo::Measure;
use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;
use petgraph::graph::EdgeReference;
use petgraph::visit::{EdgeRef, VisitMap, Visitable};

use super::network::EdgeId;

/// The routing graph: node weights are vertex indices, edge weights are edge ids into the
/// network's edge list.
pub type RoutingGraph = DiGraph<usize, EdgeId>;


/// Forward dijkstra from `origin` to every reachable node, recording the edge used to
/// enter each node.  Based on the implementation in the petgraph library.
///
/// The function `edge_cost` should return the cost for a particular edge; edge costs must
/// be non-negative.
///
/// Returns two `HashMap`s: the first maps each reached node to its path cost, and the
/// second maps each reached node (other than the origin) to the id of its predecessor
/// edge on the shortest path.  Walking the predecessor map backwards from any node
/// reproduces the shortest path from the origin.
pub fn dijkstra_with_predecessors<F, K>(
    graph: &RoutingGraph,
    origin: NodeIndex,
    mut edge_cost: F,
) -> (HashMap<NodeIndex, K>, HashMap<NodeIndex, EdgeId>)
where
    F: FnMut(EdgeReference<EdgeId>) -> K,
    K: Measure + Copy,
{
    let mut visited = graph.visit_map();
    let mut scores = HashMap::new();
    let mut predecessors = HashMap::new();
    let zero_score = K::default();
    scores.insert(origin, zero_score);

    let mut visit_next = BinaryHeap::new();
    visit_next.push(MinScored(zero_score, origin));
    while let Some(MinScored(node_score, node)) = visit_next.pop() {
        if visited.is_visited(&node) {
            continue;
        }
        for edge in graph.edges_directed(node, Direction::Outgoing) {
            let next = edge.target();
            if visited.is_visited(&next) {
                continue;
            }
            let next_score = node_score + edge_cost(edge);
            match scores.entry(next) {
                Occupied(ent) => {
                    if next_score < *ent.get() {
                        *ent.into_mut() = next_score;
                        visit_next.push(MinScored(next_score, next));
                        predecessors.insert(next, *edge.weight());
                    }
                }
                Vacant(ent) => {
                    ent.insert(next_score);
                    visit_next.push(MinScored(next_score, next));
                    predecessors.insert(next, *edge.weight());
                }
            }
        }
        visited.visit(node);
    }
    (scores, predecessors)
}


#[derive(Copy, Clone, Debug)]
pub struct MinScored<K, T>(pub K, pub T);

impl<K: PartialOrd, T> PartialEq for MinScored<K, T> {
    #[inline]
    fn eq(&self, other: &MinScored<K, T>) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: PartialOrd, T> Eq for MinScored<K, T> {}

impl<K: PartialOrd, T> PartialOrd for MinScored<K, T> {
    #[inline]
    fn partial_cmp(&self, other: &MinScored<K, T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: PartialOrd, T> Ord for MinScored<K, T> {
    #[inline]
    fn cmp(&self, other: &MinScored<K, T>) -> Ordering {
        let a = &self.0;
        let b = &other.0;
        if a == b {
            Ordering::Equal
        } else if a < b {
            Ordering::Greater
        } else if a > b {
            Ordering::Less
        } else if a.ne(a) && b.ne(b) {
            // these are the NaN cases
            Ordering::Equal
        } else if a.ne(a) {
            // Order NaN less, so that it is last in the MinScore order
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}
