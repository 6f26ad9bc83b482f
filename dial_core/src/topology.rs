//! Network topology: node names and per-edge delivery configuration.

use crate::scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while building a topology.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    /// Empty, or contains the `/` address separator
    #[error("Invalid node name \"{0}\"")]
    InvalidNodeName(String),

    #[error("Node \"{0}\" already exists")]
    DuplicateNode(String),

    #[error("Edge \"{from}\" -> \"{to}\" already exists")]
    DuplicateEdge { from: String, to: String },

    #[error("Node \"{0}\" does not exist")]
    UnknownNode(String),

    #[error("Reliability {0} is outside [0, 1]")]
    InvalidReliability(f64),
}

/// Whether an edge is added in one or both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeDirection {
    Unidirectional,
    Bidirectional,
}

/// Delivery policy of an edge.
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// Computes arrival times of messages sent over the edge
    pub scheduler: Scheduler,

    /// Direction the edge was declared with
    pub direction: EdgeDirection,

    /// Probability in `[0, 1]` that a message is delivered
    pub reliability: f64,
}

impl EdgeConfig {
    pub fn new(scheduler: Scheduler, direction: EdgeDirection, reliability: f64) -> Self {
        Self {
            scheduler,
            direction,
            reliability,
        }
    }

    /// A lossless edge.
    pub fn reliable(scheduler: Scheduler, direction: EdgeDirection) -> Self {
        Self::new(scheduler, direction, 1.0)
    }
}

/// The graph the simulated algorithms run on.
///
/// Building is append-only. Nodes keep their insertion order, which is
/// also the order neighbor lists are reported in.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: Vec<String>,
    edges: BTreeMap<(String, String), EdgeConfig>,

    /// Add a reliable Local-FIFO loop to every new node
    self_loops: bool,
}

impl Topology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty topology that gives every added node a reliable
    /// Local-FIFO self loop.
    pub fn with_self_loops() -> Self {
        Self {
            self_loops: true,
            ..Self::default()
        }
    }

    /// Builds a topology from node and edge lists.
    pub fn build<N, E>(self_loops: bool, nodes: N, edges: E) -> Result<Self, TopologyError>
    where
        N: IntoIterator,
        N::Item: Into<String>,
        E: IntoIterator<Item = (String, String, EdgeConfig)>,
    {
        let mut topology = if self_loops {
            Self::with_self_loops()
        } else {
            Self::new()
        };
        for node in nodes {
            topology.add_node(node)?;
        }
        for (from, to, config) in edges {
            topology.add_edge(from, to, config)?;
        }
        Ok(topology)
    }

    pub fn has_node(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.contains_key(&(from.to_string(), to.to_string()))
    }

    /// Node names in insertion order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// All directed edges, sorted by `(from, to)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &EdgeConfig)> + '_ {
        self.edges
            .iter()
            .map(|((from, to), config)| (from.as_str(), to.as_str(), config))
    }

    /// Nodes reachable from `node` over one edge, including `node` itself
    /// when it has a loop.
    pub fn neighbors(&self, node: &str) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|other| self.has_edge(node, other))
            .cloned()
            .collect()
    }

    pub fn edge_config(&self, from: &str, to: &str) -> Option<&EdgeConfig> {
        self.edges.get(&(from.to_string(), to.to_string()))
    }

    /// Adds a node.
    pub fn add_node(&mut self, node: impl Into<String>) -> Result<(), TopologyError> {
        let node = node.into();
        if node.is_empty() || node.contains('/') {
            return Err(TopologyError::InvalidNodeName(node));
        }
        if self.has_node(&node) {
            return Err(TopologyError::DuplicateNode(node));
        }
        self.nodes.push(node.clone());
        if self.self_loops {
            let config = EdgeConfig::reliable(Scheduler::LocalFifo, EdgeDirection::Unidirectional);
            self.add_edge(node.clone(), node, config)?;
        }
        Ok(())
    }

    /// Adds an edge. A bidirectional config is added in both directions,
    /// and fails without changes if either direction already exists.
    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        config: EdgeConfig,
    ) -> Result<(), TopologyError> {
        let (from, to) = (from.into(), to.into());
        for node in [&from, &to] {
            if !self.has_node(node) {
                return Err(TopologyError::UnknownNode(node.clone()));
            }
        }
        if !(0.0..=1.0).contains(&config.reliability) {
            return Err(TopologyError::InvalidReliability(config.reliability));
        }

        let mut keys = vec![(from.clone(), to.clone())];
        if config.direction == EdgeDirection::Bidirectional && from != to {
            keys.push((to, from));
        }
        if let Some((from, to)) = keys.iter().find(|key| self.edges.contains_key(*key)) {
            return Err(TopologyError::DuplicateEdge {
                from: from.clone(),
                to: to.clone(),
            });
        }
        for key in keys {
            self.edges.insert(key, config.clone());
        }
        Ok(())
    }

    /// Serializable view of the topology.
    pub fn summary(&self) -> TopologySummary {
        TopologySummary {
            nodes: self.nodes.clone(),
            edges: self
                .edges()
                .map(|(from, to, config)| EdgeSummary {
                    from: from.to_string(),
                    to: to.to_string(),
                    scheduler: config.scheduler.name().to_string(),
                    direction: config.direction,
                    reliability: config.reliability,
                })
                .collect(),
        }
    }
}

/// Serializable description of one directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSummary {
    pub from: String,
    pub to: String,
    pub scheduler: String,
    pub direction: EdgeDirection,
    pub reliability: f64,
}

/// Serializable description of a topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySummary {
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeSummary>,
}
