use crate::instance::ItemId;
use crate::misc::{HashMap, IntSet};

/// Undirected incompatibility graph over active item identifiers.
///
/// An edge between two items forbids packing them into the same column.
#[derive(Clone, Debug, Default)]
pub struct ConflictGraph {
    nodes: IntSet<ItemId>,
    edges: HashMap<ItemId, IntSet<ItemId>>,
}

impl ConflictGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: ItemId) {
        self.nodes.insert(node);
    }

    pub fn add_nodes_from(&mut self, nodes: impl IntoIterator<Item = ItemId>) {
        for node in nodes {
            self.add_node(node);
        }
    }

    pub fn has_node(&self, node: ItemId) -> bool {
        self.nodes.contains(&node)
    }

    /// Self loops are ignored, repeated edges are a no-op
    pub fn add_edge(&mut self, u: ItemId, v: ItemId) {
        if u == v {
            return;
        }
        self.nodes.insert(u);
        self.nodes.insert(v);
        self.edges.entry(u).or_default().insert(v);
        self.edges.entry(v).or_default().insert(u);
    }

    pub fn has_edge(&self, u: ItemId, v: ItemId) -> bool {
        self.edges.get(&u).map_or(false, |n| n.contains(&v))
    }

    pub fn neighbors(&self, node: ItemId) -> impl Iterator<Item = ItemId> + '_ {
        self.edges.get(&node).into_iter().flat_map(|n| n.iter().copied())
    }

    pub fn degree(&self, node: ItemId) -> usize {
        self.edges.get(&node).map_or(0, |n| n.len())
    }

    /// Removes the node and every edge incident to it
    pub fn remove_node(&mut self, node: ItemId) {
        if let Some(neighbors) = self.edges.remove(&node) {
            for neighbor in neighbors {
                if let Some(back) = self.edges.get_mut(&neighbor) {
                    back.remove(&node);
                }
            }
        }
        self.nodes.remove(&node);
    }

    /// Every undirected edge exactly once, smaller id first
    pub fn all_edges(&self) -> impl Iterator<Item = (ItemId, ItemId)> + '_ {
        self.edges.iter().flat_map(|(&origin, targets)| {
            targets
                .iter()
                .copied()
                .filter(move |&target| origin < target)
                .map(move |target| (origin, target))
        })
    }

    pub fn num_edges(&self) -> usize {
        self.edges.values().map(|n| n.len()).sum::<usize>() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    fn id(i: u32) -> ItemId {
        ItemId(i)
    }

    #[test]
    fn edges_are_symmetric_and_idempotent() {
        let mut graph = ConflictGraph::new();
        graph.add_nodes_from((1..=4).map(id));
        graph.add_edge(id(1), id(2));
        graph.add_edge(id(2), id(1));
        graph.add_edge(id(3), id(3));

        assert!(graph.has_edge(id(1), id(2)));
        assert!(graph.has_edge(id(2), id(1)));
        assert!(!graph.has_edge(id(3), id(3)));
        assert_eq!(graph.num_edges(), 1);
        assert_eq!(graph.all_edges().collect_vec(), vec![(id(1), id(2))]);
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut graph = ConflictGraph::new();
        graph.add_edge(id(1), id(2));
        graph.add_edge(id(1), id(3));
        graph.add_edge(id(2), id(3));

        graph.remove_node(id(1));

        assert!(!graph.has_node(id(1)));
        for other in [2, 3] {
            assert!(!graph.has_edge(id(1), id(other)));
            assert!(!graph.has_edge(id(other), id(1)));
        }
        assert!(graph.has_edge(id(2), id(3)));
        assert_eq!(graph.neighbors(id(2)).collect_vec(), vec![id(3)]);
    }

    #[test]
    fn all_edges_emits_each_pair_once() {
        let mut graph = ConflictGraph::new();
        for (u, v) in (1..=5).tuple_combinations() {
            graph.add_edge(id(v), id(u));
        }
        let edges = graph.all_edges().sorted().collect_vec();
        assert_eq!(edges.len(), 10);
        assert!(edges.iter().all(|(u, v)| u < v));
        assert_eq!(edges.iter().unique().count(), 10);
    }
}
