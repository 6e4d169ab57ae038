use serde::Serialize;
use std::collections::HashSet;

use crate::graph::connection::ConnectionMap;
use crate::graph::resolver::related_segments;
use crate::model::study::Study;

// ---------------------------------------------------------------------------
// GraphView: node and edge lists for a rendering surface
// ---------------------------------------------------------------------------

/// Visual state of a node or edge relative to the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    Selected,
    Related,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub study_id: String,
    pub study_date: String,
    pub volume: Option<f64>,
    pub axial_diameter: Option<f64>,
    pub highlight: Highlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// Both endpoints are the selection or related to it.
    pub highlighted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphView {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Lay the segments and their connections out as plain nodes and edges.
///
/// Nodes follow study order, then document order; the first occurrence of a
/// duplicated id wins. An edge is emitted only when both endpoints are nodes.
pub fn graph_view(studies: &[Study], selected: Option<&str>, map: &ConnectionMap) -> GraphView {
    let related = related_segments(selected, map);
    let highlight_of = |id: &str| {
        if selected == Some(id) {
            Highlight::Selected
        } else if related.contains(id) {
            Highlight::Related
        } else {
            Highlight::None
        }
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut nodes = Vec::new();
    for study in studies {
        for segment in study.segments() {
            if !segment.has_id() || !seen.insert(segment.id.as_str()) {
                continue;
            }
            nodes.push(GraphNode {
                id: segment.id.clone(),
                label: segment.label.clone(),
                study_id: study.study_id.clone(),
                study_date: study.study_date.clone(),
                volume: segment.volume,
                axial_diameter: segment.axial_diameter,
                highlight: highlight_of(&segment.id),
            });
        }
    }

    let edges = map
        .edges()
        .filter(|(parent, child)| seen.contains(parent) && seen.contains(child))
        .map(|(parent, child)| GraphEdge {
            source: parent.to_string(),
            target: child.to_string(),
            highlighted: highlight_of(parent) != Highlight::None
                && highlight_of(child) != Highlight::None,
        })
        .collect();

    GraphView { nodes, edges }
}
