use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

use crate::graph::LineageGraph;
use crate::model::segment::SegmentId;
use crate::model::study::Study;

// ---------------------------------------------------------------------------
// ConnectionMap: parent -> children adjacency with a reverse index
// ---------------------------------------------------------------------------

/// Directed adjacency derived from the `lesion_segments` back-references of
/// every segment. Only ids with at least one child are keys of the forward
/// map; the reverse index holds only ids with at least one parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionMap {
    children: BTreeMap<SegmentId, BTreeSet<SegmentId>>,
    parents: BTreeMap<SegmentId, BTreeSet<SegmentId>>,
}

impl ConnectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build directly from `(parent, child)` pairs, without checking that
    /// either id exists as a segment.
    pub fn from_edges<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut map = Self::new();
        for (parent_id, child_id) in edges {
            map.add_connection(parent_id, child_id);
        }
        map
    }

    /// Record `parent_id -> child_id`. Re-adding an existing edge is a no-op.
    pub fn add_connection(&mut self, parent_id: &str, child_id: &str) {
        self.children
            .entry(parent_id.to_string())
            .or_default()
            .insert(child_id.to_string());
        self.parents
            .entry(child_id.to_string())
            .or_default()
            .insert(parent_id.to_string());
    }

    /// Children of `id`, if it has any.
    pub fn children(&self, id: &str) -> Option<&BTreeSet<SegmentId>> {
        self.children.get(id)
    }

    /// Parents of `id`, if it has any.
    pub fn parents(&self, id: &str) -> Option<&BTreeSet<SegmentId>> {
        self.parents.get(id)
    }

    /// Whether `id` has at least one child.
    pub fn contains(&self, id: &str) -> bool {
        self.children.contains_key(id)
    }

    /// Number of parent ids with children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.children.values().map(BTreeSet::len).sum()
    }

    /// Parent ids and their children, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&SegmentId, &BTreeSet<SegmentId>)> {
        self.children.iter()
    }

    /// Every `(parent, child)` edge, in id order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.children.iter().flat_map(|(parent, children)| {
            children
                .iter()
                .map(move |child| (parent.as_str(), child.as_str()))
        })
    }

    /// The forward map alone.
    pub fn as_map(&self) -> &BTreeMap<SegmentId, BTreeSet<SegmentId>> {
        &self.children
    }
}

impl From<ConnectionMap> for BTreeMap<SegmentId, BTreeSet<SegmentId>> {
    fn from(map: ConnectionMap) -> Self {
        map.children
    }
}

impl LineageGraph for ConnectionMap {
    fn children_of(&self, id: &str) -> Vec<&str> {
        self.children
            .get(id)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn parents_of(&self, id: &str) -> Vec<&str> {
        self.parents
            .get(id)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn has_parents(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build the parent -> children map for a set of studies.
///
/// Every segment declares its own parents; this inverts those declarations so
/// each parent knows its children. Study order is irrelevant. Segments with
/// no id contribute no edges, and a parent id that names no segment in
/// `studies` is dropped, so a dangling reference leaves its child parent-less.
pub fn build_connection_map(studies: &[Study]) -> ConnectionMap {
    let known: HashSet<&str> = studies
        .iter()
        .flat_map(|study| study.segments())
        .filter(|segment| segment.has_id())
        .map(|segment| segment.id.as_str())
        .collect();

    let mut map = ConnectionMap::new();
    let mut skipped = 0usize;
    let mut dangling = 0usize;

    for study in studies {
        for segment in study.segments() {
            if !segment.has_id() {
                skipped += 1;
                continue;
            }
            for parent_id in segment.parent_ids() {
                if known.contains(parent_id) {
                    map.add_connection(parent_id, &segment.id);
                } else {
                    dangling += 1;
                }
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "segments without an id were left out of the connection map");
    }
    if dangling > 0 {
        debug!(dangling, "ignored references to unknown parent segments");
    }
    debug!(
        studies = studies.len(),
        parents = map.len(),
        edges = map.edge_count(),
        "built connection map"
    );

    map
}
