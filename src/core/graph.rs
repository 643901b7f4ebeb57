//! Resource graph — immutable node declarations with explicit dependency
//! edges and a derived topological ordering.
//!
//! The graph is built functionally in one pass and never mutated afterwards;
//! a re-run produces a fresh graph that an external emitter diffs against
//! live infrastructure. Insertion enforces the integrity invariants up front:
//! logical names are unique, and every `depends_on` reference must already be
//! present, which makes the finished graph acyclic by construction.

use super::error::{BuildError, BuildResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// The provider resource kinds this domain needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Role,
    InstanceProfile,
    SecurityGroup,
    InfrastructureConfiguration,
    Component,
    ImageRecipe,
    DistributionConfiguration,
    ImagePipeline,
    Image,
    LogGroup,
    Parameter,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role => write!(f, "role"),
            Self::InstanceProfile => write!(f, "instance-profile"),
            Self::SecurityGroup => write!(f, "security-group"),
            Self::InfrastructureConfiguration => write!(f, "infrastructure-configuration"),
            Self::Component => write!(f, "component"),
            Self::ImageRecipe => write!(f, "image-recipe"),
            Self::DistributionConfiguration => write!(f, "distribution-configuration"),
            Self::ImagePipeline => write!(f, "image-pipeline"),
            Self::Image => write!(f, "image"),
            Self::LogGroup => write!(f, "log-group"),
            Self::Parameter => write!(f, "parameter"),
        }
    }
}

/// Whether the emitter owns the resource's create/destroy lifecycle or only
/// points at a pre-existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Owned,
    Referenced,
}

/// One declared provisioning resource. Immutable after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub kind: ResourceKind,

    /// Logical name, unique within the graph.
    pub name: String,

    pub lifecycle: Lifecycle,

    /// Kind-specific property bag.
    #[serde(default)]
    pub properties: IndexMap<String, Value>,

    /// Logical names of upstream nodes that must exist first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ResourceNode {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            lifecycle: Lifecycle::Owned,
            properties: IndexMap::new(),
            depends_on: Vec::new(),
        }
    }

    /// A reference to a pre-existing instance — no create/destroy lifecycle.
    pub fn reference(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            lifecycle: Lifecycle::Referenced,
            ..Self::new(kind, name)
        }
    }

    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn depends_on(mut self, upstream: &str) -> Self {
        self.depends_on.push(upstream.to_string());
        self
    }
}

/// Ordered set of resource nodes keyed by logical name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
    nodes: IndexMap<String, ResourceNode>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, enforcing the graph invariants: unique logical name,
    /// and every dependency already present.
    pub fn insert(&mut self, node: ResourceNode) -> BuildResult<()> {
        if self.nodes.contains_key(&node.name) {
            return Err(BuildError::integrity(format!(
                "duplicate logical name '{}' ({})",
                node.name, node.kind
            )));
        }
        for dep in &node.depends_on {
            if !self.nodes.contains_key(dep) {
                return Err(BuildError::integrity(format!(
                    "{} '{}' depends on missing node '{}'",
                    node.kind, node.name, dep
                )));
            }
        }
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ResourceNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn count_kind(&self, kind: ResourceKind) -> usize {
        self.nodes.values().filter(|n| n.kind == kind).count()
    }

    /// Topological ordering of logical names. Kahn's algorithm with
    /// insertion-order tie-breaking, so the result is deterministic and
    /// mirrors declaration order wherever dependencies allow.
    pub fn execution_order(&self) -> BuildResult<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

        for name in self.nodes.keys() {
            in_degree.insert(name.as_str(), 0);
            adjacency.insert(name.as_str(), Vec::new());
        }
        for (name, node) in &self.nodes {
            for dep in &node.depends_on {
                let dep = self.nodes.get_key_value(dep).map(|(k, _)| k.as_str()).ok_or_else(
                    || {
                        BuildError::integrity(format!(
                            "node '{}' references missing '{}'",
                            name, dep
                        ))
                    },
                )?;
                adjacency.get_mut(dep).unwrap().push(name.as_str());
                *in_degree.get_mut(name.as_str()).unwrap() += 1;
            }
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|n| in_degree[n] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            order.push(current.to_string());
            // Preserve insertion order among newly ready nodes.
            let mut ready: Vec<&str> = Vec::new();
            for neighbor in adjacency[current].clone() {
                let degree = in_degree.get_mut(neighbor).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.push(neighbor);
                }
            }
            ready.sort_by_key(|n| self.nodes.get_index_of(*n));
            queue.extend(ready);
        }

        if order.len() != self.nodes.len() {
            let ordered: std::collections::HashSet<&str> =
                order.iter().map(String::as_str).collect();
            let stuck: Vec<&str> = self
                .nodes
                .keys()
                .map(String::as_str)
                .filter(|n| !ordered.contains(n))
                .collect();
            return Err(BuildError::integrity(format!(
                "dependency cycle involving: {}",
                stuck.join(", ")
            )));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut graph = ResourceGraph::new();
        graph
            .insert(ResourceNode::new(ResourceKind::Role, "R").property("assumed_by", "ec2"))
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get("R").unwrap().kind, ResourceKind::Role);
        assert_eq!(
            graph.get("R").unwrap().properties["assumed_by"],
            serde_json::json!("ec2")
        );
    }

    #[test]
    fn test_insert_duplicate_name_rejected() {
        let mut graph = ResourceGraph::new();
        graph.insert(ResourceNode::new(ResourceKind::Role, "R")).unwrap();
        let err = graph
            .insert(ResourceNode::new(ResourceKind::Parameter, "R"))
            .unwrap_err();
        assert!(matches!(err, BuildError::GraphIntegrity { .. }));
    }

    #[test]
    fn test_insert_missing_dependency_rejected() {
        let mut graph = ResourceGraph::new();
        let err = graph
            .insert(ResourceNode::new(ResourceKind::InstanceProfile, "P").depends_on("R"))
            .unwrap_err();
        assert!(err.to_string().contains("missing node 'R'"));
    }

    #[test]
    fn test_execution_order_respects_edges() {
        let mut graph = ResourceGraph::new();
        graph.insert(ResourceNode::new(ResourceKind::Role, "role")).unwrap();
        graph
            .insert(ResourceNode::new(ResourceKind::InstanceProfile, "profile").depends_on("role"))
            .unwrap();
        graph
            .insert(ResourceNode::new(ResourceKind::SecurityGroup, "sg"))
            .unwrap();
        graph
            .insert(
                ResourceNode::new(ResourceKind::InfrastructureConfiguration, "infra")
                    .depends_on("profile")
                    .depends_on("sg"),
            )
            .unwrap();

        let order = graph.execution_order().unwrap();
        let pos = |n: &str| order.iter().position(|o| o == n).unwrap();
        assert!(pos("role") < pos("profile"));
        assert!(pos("profile") < pos("infra"));
        assert!(pos("sg") < pos("infra"));
    }

    #[test]
    fn test_execution_order_deterministic_insertion_tiebreak() {
        let mut graph = ResourceGraph::new();
        for name in ["zeta", "alpha", "mid"] {
            graph.insert(ResourceNode::new(ResourceKind::LogGroup, name)).unwrap();
        }
        // All independent: declaration order, not alphabetical.
        assert_eq!(graph.execution_order().unwrap(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_count_kind() {
        let mut graph = ResourceGraph::new();
        graph.insert(ResourceNode::new(ResourceKind::LogGroup, "a")).unwrap();
        graph.insert(ResourceNode::new(ResourceKind::LogGroup, "b")).unwrap();
        graph.insert(ResourceNode::new(ResourceKind::Image, "c")).unwrap();
        assert_eq!(graph.count_kind(ResourceKind::LogGroup), 2);
        assert_eq!(graph.count_kind(ResourceKind::ImagePipeline), 0);
    }

    #[test]
    fn test_reference_node_lifecycle() {
        let node = ResourceNode::reference(ResourceKind::LogGroup, "/X/messages");
        assert_eq!(node.lifecycle, Lifecycle::Referenced);
        assert!(node.properties.is_empty());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ResourceKind::LogGroup.to_string(), "log-group");
        assert_eq!(
            ResourceKind::InfrastructureConfiguration.to_string(),
            "infrastructure-configuration"
        );
    }
}
