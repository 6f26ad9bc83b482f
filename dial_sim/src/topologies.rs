//! Topology presets.
//!
//! Nodes are named `A`, `B`, `C`, ... in order; past `Z` the names continue
//! as `N26`, `N27`, ...

use dial_core::{EdgeConfig, EdgeDirection, Scheduler, Topology, TopologyError};

/// Name of the `index`-th preset node.
pub fn node_name(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
        _ => format!("N{index}"),
    }
}

fn reliable(scheduler: Scheduler, direction: EdgeDirection) -> EdgeConfig {
    EdgeConfig::reliable(scheduler, direction)
}

fn with_edges(
    self_loops: bool,
    n: usize,
    edges: impl IntoIterator<Item = (usize, usize, EdgeConfig)>,
) -> Result<Topology, TopologyError> {
    Topology::build(
        self_loops,
        (0..n).map(node_name),
        edges
            .into_iter()
            .map(|(from, to, config)| (node_name(from), node_name(to), config)),
    )
}

/// `n` nodes in a line, linked in both directions with `config`.
pub fn line_with(n: usize, config: EdgeConfig) -> Result<Topology, TopologyError> {
    let config = EdgeConfig {
        direction: EdgeDirection::Bidirectional,
        ..config
    };
    with_edges(false, n, (1..n).map(|i| (i - 1, i, config.clone())))
}

/// `n` nodes in a line over reliable Local-FIFO edges.
pub fn line(n: usize) -> Topology {
    line_with(n, reliable(Scheduler::LocalFifo, EdgeDirection::Bidirectional)).unwrap_or_default()
}

/// `n` nodes in a unidirectional ring `A -> B -> ... -> A`.
pub fn ring_with(n: usize, config: EdgeConfig) -> Result<Topology, TopologyError> {
    let config = EdgeConfig {
        direction: EdgeDirection::Unidirectional,
        ..config
    };
    if n < 2 {
        return with_edges(false, n, Vec::new());
    }
    with_edges(false, n, (0..n).map(|i| (i, (i + 1) % n, config.clone())))
}

/// Unidirectional ring over reliable Local-FIFO edges.
pub fn ring(n: usize) -> Topology {
    ring_with(n, reliable(Scheduler::LocalFifo, EdgeDirection::Unidirectional)).unwrap_or_default()
}

/// Every pair of the `n` nodes linked in both directions with `config`.
pub fn complete_with(n: usize, config: EdgeConfig) -> Result<Topology, TopologyError> {
    let config = EdgeConfig {
        direction: EdgeDirection::Bidirectional,
        ..config
    };
    let pairs = (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j)));
    with_edges(false, n, pairs.map(|(i, j)| (i, j, config.clone())).collect::<Vec<_>>())
}

/// Complete graph over reliable Local-FIFO edges.
pub fn complete(n: usize) -> Topology {
    complete_with(n, reliable(Scheduler::LocalFifo, EdgeDirection::Bidirectional)).unwrap_or_default()
}

/// The eight-node tree `A..H` used by the tutorials, with self loops.
///
/// ```text
///   D   E
///    \ /
///     B - C - A - G - H
///                 |
///                 F
/// ```
pub fn example_network() -> Topology {
    const EDGES: [(&str, &str); 7] = [
        ("A", "C"),
        ("B", "C"),
        ("D", "B"),
        ("E", "B"),
        ("F", "G"),
        ("G", "H"),
        ("A", "G"),
    ];

    let config = reliable(Scheduler::LocalFifo, EdgeDirection::Bidirectional);
    Topology::build(
        true,
        (0..8).map(node_name),
        EDGES
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string(), config.clone())),
    )
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_names() {
        assert_eq!(node_name(0), "A");
        assert_eq!(node_name(25), "Z");
        assert_eq!(node_name(26), "N26");
    }

    #[test]
    fn test_line() {
        let topology = line(3);
        assert_eq!(topology.nodes(), &["A", "B", "C"]);
        assert!(topology.has_edge("A", "B"));
        assert!(topology.has_edge("B", "A"));
        assert!(!topology.has_edge("A", "C"));
        assert_eq!(topology.edges().count(), 4);
    }

    #[test]
    fn test_ring_is_unidirectional() {
        let topology = ring(4);
        assert!(topology.has_edge("D", "A"));
        assert!(!topology.has_edge("A", "D"));
        assert_eq!(topology.neighbors("B"), vec!["C".to_string()]);
    }

    #[test]
    fn test_complete() {
        let topology = complete(5);
        assert_eq!(topology.edges().count(), 20);
        assert_eq!(topology.neighbors("C").len(), 4);
    }

    #[test]
    fn test_example_network() {
        let topology = example_network();
        assert_eq!(topology.nodes().len(), 8);
        // 7 bidirectional edges plus 8 loops
        assert_eq!(topology.edges().count(), 22);
        assert_eq!(topology.neighbors("B"), vec!["B", "C", "D", "E"]);
    }

    #[test]
    fn test_lossy_variants_keep_reliability() {
        let topology = complete_with(3, EdgeConfig::new(Scheduler::Random, EdgeDirection::Unidirectional, 0.25)).unwrap();
        let config = topology.edge_config("B", "A").unwrap();
        assert_eq!(config.reliability, 0.25);
        assert_eq!(config.scheduler.name(), "random");
    }
}
