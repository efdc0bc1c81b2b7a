//! Serpentine grid layout
//!
//! Nodes are placed left-to-right on even rows and right-to-left on odd rows,
//! so consecutive nodes are always adjacent and the path snakes down the page.

use crate::reduce::GroupedNode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Layout errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Invalid column count: {0} (must be at least 1)")]
    InvalidColumns(usize),
}

/// Grid geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Nodes per row
    pub columns: usize,
    pub node_width: f64,
    pub node_height: f64,
    /// Horizontal gap between nodes
    pub gap_x: f64,
    /// Vertical gap between rows
    pub gap_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            columns: 5,
            node_width: 260.0,
            node_height: 120.0,
            gap_x: 80.0,
            gap_y: 80.0,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.columns == 0 {
            return Err(LayoutError::InvalidColumns(self.columns));
        }
        Ok(())
    }

    /// Grid cell of the node at `index`
    pub fn cell(&self, index: usize) -> (usize, usize) {
        let row = index / self.columns;
        let offset = index % self.columns;
        let col = if row % 2 == 0 {
            offset
        } else {
            self.columns - 1 - offset
        };
        (row, col)
    }
}

/// Side of a node a connector attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleSide {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A placed node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Stable id: timestamp without `:` and `.`, then `_<index>`
    pub id: String,
    #[serde(rename = "groupedNode")]
    pub node: GroupedNode,
    pub position: Position,
    pub source_handle: HandleSide,
    pub target_handle: HandleSide,
}

/// Connector between two consecutive nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub source_handle: HandleSide,
    pub target_handle: HandleSide,
    /// The source node failed
    pub has_error: bool,
}

/// Laid-out execution graph, rebuilt from scratch for every input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
}

impl ExecutionGraph {
    /// Look up a node by its stable id
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Number of nodes that failed
    pub fn error_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.node.has_error).count()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Stable node id from a timestamp and sequence index
pub fn node_id(timestamp: &str, index: usize) -> String {
    format!("{}_{}", timestamp.replace([':', '.'], ""), index)
}

fn target_handle(index: usize, row: usize, row_start: bool) -> HandleSide {
    if index == 0 {
        HandleSide::Left
    } else if row_start && row > 0 {
        HandleSide::Top
    } else if row % 2 == 0 {
        HandleSide::Left
    } else {
        HandleSide::Right
    }
}

fn source_handle(row: usize, row_end: bool, has_successor: bool) -> HandleSide {
    if row_end && has_successor {
        HandleSide::Bottom
    } else if row % 2 == 0 {
        HandleSide::Right
    } else {
        HandleSide::Left
    }
}

/// Place nodes on the serpentine grid and connect consecutive pairs.
pub fn layout(nodes: Vec<GroupedNode>, config: &LayoutConfig) -> Result<ExecutionGraph, LayoutError> {
    config.validate()?;

    let count = nodes.len();
    let step_x = config.node_width + config.gap_x;
    let step_y = config.node_height + config.gap_y;

    let placed: Vec<GraphNode> = nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| {
            let (row, col) = config.cell(i);
            let offset = i % config.columns;

            GraphNode {
                id: node_id(&node.entry.timestamp, i),
                position: Position {
                    x: col as f64 * step_x,
                    y: row as f64 * step_y,
                },
                target_handle: target_handle(i, row, offset == 0),
                source_handle: source_handle(row, offset == config.columns - 1, i + 1 < count),
                node,
            }
        })
        .collect();

    let edges = placed
        .windows(2)
        .map(|pair| {
            let (source, target) = (&pair[0], &pair[1]);
            Edge {
                id: format!("e{}-{}", source.id, target.id),
                source_id: source.id.clone(),
                target_id: target.id.clone(),
                source_handle: source.source_handle,
                target_handle: target.target_handle,
                has_error: source.node.has_error,
            }
        })
        .collect();

    Ok(ExecutionGraph { nodes: placed, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogEntry;
    use proptest::prelude::*;

    fn leaf(ts: &str, error: bool) -> GroupedNode {
        GroupedNode::leaf(LogEntry {
            module_type: "PlayPrompt".to_string(),
            timestamp: ts.to_string(),
            results: error.then(|| "Error".to_string()),
            ..Default::default()
        })
    }

    fn leaves(n: usize) -> Vec<GroupedNode> {
        (0..n)
            .map(|i| leaf(&format!("2024-01-01T00:00:{:02}.000Z", i), false))
            .collect()
    }

    #[test]
    fn test_node_id() {
        assert_eq!(node_id("2024-01-01T00:00:01.123Z", 7), "2024-01-01T000001123Z_7");
    }

    #[test]
    fn test_zero_columns_rejected() {
        let config = LayoutConfig {
            columns: 0,
            ..Default::default()
        };
        assert_eq!(layout(leaves(2), &config), Err(LayoutError::InvalidColumns(0)));
    }

    #[test]
    fn test_empty_input() {
        let graph = layout(Vec::new(), &LayoutConfig::default()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_serpentine_positions() {
        let graph = layout(leaves(12), &LayoutConfig::default()).unwrap();
        let cells: Vec<(f64, f64)> = graph.nodes.iter().map(|n| (n.position.x, n.position.y)).collect();

        // Row 0 runs left to right
        assert_eq!(cells[0], (0.0, 0.0));
        assert_eq!(cells[4], (4.0 * 340.0, 0.0));
        // Row 1 runs right to left
        assert_eq!(cells[5], (4.0 * 340.0, 200.0));
        assert_eq!(cells[9], (0.0, 200.0));
        // Row 2 back to left to right
        assert_eq!(cells[10], (0.0, 400.0));
        assert_eq!(cells[11], (340.0, 400.0));
    }

    #[test]
    fn test_handles() {
        let graph = layout(leaves(12), &LayoutConfig::default()).unwrap();
        let n = &graph.nodes;

        assert_eq!(n[0].target_handle, HandleSide::Left);
        assert_eq!(n[0].source_handle, HandleSide::Right);
        assert_eq!(n[4].source_handle, HandleSide::Bottom);
        assert_eq!(n[5].target_handle, HandleSide::Top);
        assert_eq!(n[6].target_handle, HandleSide::Right);
        assert_eq!(n[6].source_handle, HandleSide::Left);
        assert_eq!(n[9].source_handle, HandleSide::Bottom);
        assert_eq!(n[10].target_handle, HandleSide::Top);
        // Last node has no successor
        assert_eq!(n[11].source_handle, HandleSide::Right);
    }

    #[test]
    fn test_last_node_at_row_end_has_no_bottom_handle() {
        let graph = layout(leaves(5), &LayoutConfig::default()).unwrap();
        assert_eq!(graph.nodes[4].source_handle, HandleSide::Right);
    }

    #[test]
    fn test_edges_follow_source_error() {
        let nodes = vec![leaf("t1", false), leaf("t2", true), leaf("t3", false)];
        let graph = layout(nodes, &LayoutConfig::default()).unwrap();

        assert_eq!(graph.edges.len(), 2);
        assert!(!graph.edges[0].has_error);
        assert!(graph.edges[1].has_error);
        assert_eq!(graph.edges[1].source_id, "t2_1");
        assert_eq!(graph.edges[1].target_id, "t3_2");
        assert_eq!(graph.error_count(), 1);
        assert!(graph.node("t2_1").is_some());
        assert!(graph.node("missing").is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let graph = layout(leaves(2), &LayoutConfig::default()).unwrap();
        let value = serde_json::to_value(&graph).unwrap();

        assert_eq!(value["nodes"][0]["sourceHandle"], "right");
        assert_eq!(value["nodes"][0]["groupedNode"]["kind"], "leaf");
        assert_eq!(value["edges"][0]["targetHandle"], "left");
        assert_eq!(value["edges"][0]["hasError"], false);
    }

    proptest! {
        #[test]
        fn prop_consecutive_nodes_are_adjacent(count in 1usize..60, columns in 1usize..9) {
            let config = LayoutConfig { columns, ..Default::default() };
            let graph = layout(leaves(count), &config).unwrap();

            prop_assert_eq!(graph.nodes.len(), count);
            prop_assert_eq!(graph.edges.len(), count - 1);

            for i in 1..count {
                let (r0, c0) = config.cell(i - 1);
                let (r1, c1) = config.cell(i);
                let manhattan = r0.abs_diff(r1) + c0.abs_diff(c1);
                prop_assert_eq!(manhattan, 1, "nodes {} and {} not adjacent", i - 1, i);
                prop_assert!(c1 < columns);
            }
        }

        #[test]
        fn prop_edge_handles_match_endpoints(count in 2usize..40, columns in 1usize..7) {
            let config = LayoutConfig { columns, ..Default::default() };
            let graph = layout(leaves(count), &config).unwrap();

            for (i, edge) in graph.edges.iter().enumerate() {
                prop_assert_eq!(edge.source_handle, graph.nodes[i].source_handle);
                prop_assert_eq!(edge.target_handle, graph.nodes[i + 1].target_handle);
                prop_assert_eq!(&edge.source_id, &graph.nodes[i].id);
            }
        }
    }
}
