pub mod connection;
pub mod groups;
pub mod resolver;
pub mod trajectory;
pub mod view;

use std::collections::{BTreeMap, BTreeSet};

pub use connection::{build_connection_map, ConnectionMap};
pub use groups::{classification_groups, GroupedSegment};
pub use resolver::{ancestors, descendants, related_segments};
pub use trajectory::{
    find_baseline, find_baselines, lesion_trajectory, measurement_history, LesionControl,
    SegmentWithStudy, StudyGroup,
};
pub use view::{graph_view, GraphEdge, GraphNode, GraphView, Highlight};

// ---------------------------------------------------------------------------
// LineageGraph trait: the adjacency interface every traversal runs against
// ---------------------------------------------------------------------------

/// Directed parent → child adjacency over segment ids.
///
/// Both lookups return ids in ascending order so traversals are
/// deterministic regardless of the backing store.
pub trait LineageGraph {
    /// Direct children of `id` (segments that list `id` as a parent).
    fn children_of(&self, id: &str) -> Vec<&str>;

    /// Direct parents of `id`.
    fn parents_of(&self, id: &str) -> Vec<&str>;

    fn has_parents(&self, id: &str) -> bool {
        !self.parents_of(id).is_empty()
    }
}

/// The bare forward map. Parent lookup scans every entry, O(E) per call.
impl LineageGraph for BTreeMap<String, BTreeSet<String>> {
    fn children_of(&self, id: &str) -> Vec<&str> {
        self.get(id)
            .map(|children| children.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn parents_of(&self, id: &str) -> Vec<&str> {
        self.iter()
            .filter(|(_, children)| children.contains(id))
            .map(|(parent, _)| parent.as_str())
            .collect()
    }
}
