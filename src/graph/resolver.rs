use std::collections::{BTreeSet, HashSet};

use crate::graph::LineageGraph;
use crate::model::segment::SegmentId;

// ---------------------------------------------------------------------------
// Relationship resolution: connected component, ancestors, descendants
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
    Both,
}

/// All segments connected to `segment_id` through any chain of parent or
/// child edges, not including `segment_id` itself.
///
/// Returns an empty set when nothing is selected or the segment has no
/// connections. Safe on cyclic input.
pub fn related_segments<G>(segment_id: Option<&str>, graph: &G) -> BTreeSet<SegmentId>
where
    G: LineageGraph + ?Sized,
{
    match segment_id {
        Some(id) if !id.is_empty() => closure(id, graph, Direction::Both),
        _ => BTreeSet::new(),
    }
}

/// Every segment `segment_id` descends from, transitively.
pub fn ancestors<G>(segment_id: &str, graph: &G) -> BTreeSet<SegmentId>
where
    G: LineageGraph + ?Sized,
{
    closure(segment_id, graph, Direction::Backward)
}

/// Every segment descending from `segment_id`, transitively.
pub fn descendants<G>(segment_id: &str, graph: &G) -> BTreeSet<SegmentId>
where
    G: LineageGraph + ?Sized,
{
    closure(segment_id, graph, Direction::Forward)
}

/// Work-list traversal shared by the public resolvers. No recursion, so long
/// chains cost heap rather than stack.
fn closure<G>(start: &str, graph: &G, direction: Direction) -> BTreeSet<SegmentId>
where
    G: LineageGraph + ?Sized,
{
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![start];
    visited.insert(start);

    while let Some(current) = stack.pop() {
        if matches!(direction, Direction::Forward | Direction::Both) {
            for child in graph.children_of(current) {
                if visited.insert(child) {
                    stack.push(child);
                }
            }
        }
        if matches!(direction, Direction::Backward | Direction::Both) {
            for parent in graph.parents_of(current) {
                if visited.insert(parent) {
                    stack.push(parent);
                }
            }
        }
    }

    visited
        .into_iter()
        .filter(|id| *id != start)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn plain(edges: &[(&str, &str)]) -> BTreeMap<String, BTreeSet<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (parent, child) in edges {
            map.entry(parent.to_string())
                .or_default()
                .insert(child.to_string());
        }
        map
    }

    fn ids(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_related_crosses_both_directions() {
        // a -> b -> c, and d -> b (merge), c -> e
        let map = plain(&[("a", "b"), ("b", "c"), ("d", "b"), ("c", "e")]);
        let related = related_segments(Some("c"), &map);
        assert_eq!(ids(&related), vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn test_related_excludes_other_components() {
        let map = plain(&[("a", "b"), ("x", "y")]);
        let related = related_segments(Some("a"), &map);
        assert_eq!(ids(&related), vec!["b"]);
    }

    #[test]
    fn test_empty_selection() {
        let map = plain(&[("a", "b")]);
        assert!(related_segments(None, &map).is_empty());
        assert!(related_segments(Some(""), &map).is_empty());
        assert!(related_segments(Some("unconnected"), &map).is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let map = plain(&[("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(ids(&related_segments(Some("a"), &map)), vec!["b", "c"]);
        assert_eq!(ids(&ancestors("a", &map)), vec!["b", "c"]);
    }

    #[test]
    fn test_self_loop_not_reported() {
        let map = plain(&[("a", "a"), ("a", "b")]);
        assert_eq!(ids(&related_segments(Some("a"), &map)), vec!["b"]);
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let map = plain(&[("a", "b"), ("b", "c"), ("b", "d"), ("z", "c")]);
        assert_eq!(ids(&ancestors("c", &map)), vec!["a", "b", "z"]);
        assert_eq!(ids(&descendants("a", &map)), vec!["b", "c", "d"]);
        assert!(descendants("d", &map).is_empty());
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let names: Vec<String> = (0..50_000).map(|i| format!("s{}", i)).collect();
        let edges: Vec<(&str, &str)> = names
            .windows(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
            .collect();
        let map = crate::graph::ConnectionMap::from_edges(edges);

        assert_eq!(related_segments(Some("s0"), &map).len(), 49_999);
    }
}
