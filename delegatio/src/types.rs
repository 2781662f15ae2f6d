//! Node identities and cluster shape.

use std::fmt;

/// Index of a node in `[0, num_nodes)`.
///
/// Node 0 initializes the cluster; every other node joins it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const INITIALIZER: NodeId = NodeId(0);

    pub fn is_initializer(self) -> bool {
        self == Self::INITIALIZER
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic node naming for a cluster of fixed size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterLayout {
    prefix: String,
    num_nodes: usize,
}

impl ClusterLayout {
    pub fn new(prefix: impl Into<String>, num_nodes: usize) -> Self {
        Self {
            prefix: prefix.into(),
            num_nodes,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Name of the domain and boot volume backing `node`.
    pub fn node_name(&self, node: NodeId) -> String {
        format!("{}{}", self.prefix, node.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.num_nodes).map(NodeId)
    }

    /// Nodes that join after the initializer.
    pub fn joiners(&self) -> impl Iterator<Item = NodeId> + '_ {
        (1..self.num_nodes).map(NodeId)
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes().map(|n| self.node_name(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefix_plus_index() {
        let layout = ClusterLayout::new("delegatio-", 3);
        assert_eq!(
            layout.node_names(),
            vec!["delegatio-0", "delegatio-1", "delegatio-2"]
        );
        assert_eq!(layout.joiners().collect::<Vec<_>>(), vec![NodeId(1), NodeId(2)]);
        assert!(NodeId(0).is_initializer());
        assert!(!NodeId(2).is_initializer());
    }

    #[test]
    fn single_node_cluster_has_no_joiners() {
        let layout = ClusterLayout::new("n", 1);
        assert_eq!(layout.joiners().count(), 0);
    }
}
