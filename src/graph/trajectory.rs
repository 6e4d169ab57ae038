use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::graph::LineageGraph;
use crate::model::segment::{Segment, SegmentId};
use crate::model::study::Study;

// ---------------------------------------------------------------------------
// Trajectory types
// ---------------------------------------------------------------------------

/// One segment of a trajectory, tagged with the study it was found in.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentWithStudy<'a> {
    pub segment: &'a Segment,
    #[serde(skip)]
    pub study: &'a Study,
    /// The segment has more than one child in the lineage.
    pub is_split: bool,
    /// The segment has more than one parent in the lineage.
    pub is_merge: bool,
    pub is_selected: bool,
}

/// The trajectory segments found in one study.
#[derive(Debug, Clone, Serialize)]
pub struct StudyGroup<'a> {
    #[serde(serialize_with = "study_header")]
    pub study: &'a Study,
    pub segments: Vec<SegmentWithStudy<'a>>,
    /// Sum of segment volumes, missing volumes counted as zero.
    pub total_volume: f64,
    pub has_split: bool,
    pub has_merge: bool,
}

impl<'a> StudyGroup<'a> {
    pub fn segment_ids(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.segment.id.as_str())
    }

    /// Summed axial diameter, or `None` if no segment in the group has one.
    pub fn total_axial_diameter(&self) -> Option<f64> {
        self.segments
            .iter()
            .filter_map(|s| s.segment.axial_diameter)
            .fold(None, |acc, d| Some(acc.unwrap_or(0.0) + d))
    }
}

/// Serialize only the identifying fields of a study; the segments are
/// already listed by the group.
fn study_header<S>(study: &&Study, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeStruct;
    let mut state = serializer.serialize_struct("Study", 3)?;
    state.serialize_field("study_id", &study.study_id)?;
    state.serialize_field("study_date", &study.study_date)?;
    state.serialize_field("is_basal", &study.is_basal)?;
    state.end()
}

// ---------------------------------------------------------------------------
// Step 1: baselines
// ---------------------------------------------------------------------------

/// Every parent-less ancestor of `segment_id`, in discovery order.
///
/// Parents are explored depth-first in ascending id order. A segment with no
/// parents is its own baseline. When the ancestry contains no parent-less
/// node (cyclic input), the segment itself is returned.
pub fn find_baselines<G>(segment_id: &str, graph: &G) -> Vec<SegmentId>
where
    G: LineageGraph + ?Sized,
{
    let mut roots: Vec<SegmentId> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![segment_id];
    visited.insert(segment_id);

    while let Some(current) = stack.pop() {
        let parents = graph.parents_of(current);
        if parents.is_empty() {
            roots.push(current.to_string());
            continue;
        }
        for parent in parents.into_iter().rev() {
            if visited.insert(parent) {
                stack.push(parent);
            }
        }
    }

    if roots.is_empty() {
        debug!(segment_id, "no parent-less ancestor, lineage is cyclic");
        roots.push(segment_id.to_string());
    }
    roots
}

/// The primary baseline: the first one [`find_baselines`] discovers.
pub fn find_baseline<G>(segment_id: &str, graph: &G) -> SegmentId
where
    G: LineageGraph + ?Sized,
{
    find_baselines(segment_id, graph)
        .into_iter()
        .next()
        .unwrap_or_else(|| segment_id.to_string())
}

// ---------------------------------------------------------------------------
// Step 2: lineage reachable from the baselines
// ---------------------------------------------------------------------------

/// The sub-map of the connection graph reachable from a set of roots: each
/// reached node with children maps to its direct children.
struct Lineage<'g> {
    children: BTreeMap<&'g str, Vec<&'g str>>,
    members: HashSet<&'g str>,
    parent_counts: HashMap<&'g str, usize>,
}

impl<'g> Lineage<'g> {
    fn collect<G>(roots: &'g [SegmentId], graph: &'g G) -> Self
    where
        G: LineageGraph + ?Sized,
    {
        let mut children: BTreeMap<&'g str, Vec<&'g str>> = BTreeMap::new();
        let mut members: HashSet<&'g str> = HashSet::new();
        let mut visited: HashSet<&'g str> = HashSet::new();
        let mut stack: Vec<&'g str> = Vec::new();

        for root in roots {
            members.insert(root.as_str());
            if visited.insert(root.as_str()) {
                stack.push(root.as_str());
            }
        }

        while let Some(current) = stack.pop() {
            let direct = graph.children_of(current);
            if direct.is_empty() {
                continue;
            }
            for &child in &direct {
                members.insert(child);
                if visited.insert(child) {
                    stack.push(child);
                }
            }
            children.insert(current, direct);
        }

        let mut parent_counts: HashMap<&'g str, usize> = HashMap::new();
        for direct in children.values() {
            for &child in direct {
                *parent_counts.entry(child).or_default() += 1;
            }
        }

        Self {
            children,
            members,
            parent_counts,
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    fn child_count(&self, id: &str) -> usize {
        self.children.get(id).map_or(0, Vec::len)
    }

    fn parent_count(&self, id: &str) -> usize {
        self.parent_counts.get(id).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Step 3: group by study
// ---------------------------------------------------------------------------

/// Studies in ascending date order. The sort is stable; studies whose date
/// cannot be parsed keep their relative order after every dated study.
pub fn sort_studies_by_date(studies: &[Study]) -> Vec<&Study> {
    let mut ordered: Vec<&Study> = studies.iter().collect();
    ordered.sort_by_cached_key(|study| {
        let ts = study.timestamp();
        (ts.is_none(), ts)
    });
    ordered
}

/// The longitudinal trajectory of the selected segment.
///
/// The trajectory is rooted at every baseline of the selection's ancestry,
/// so merged lesions show all of their origins. Each study contributes the
/// trajectory segments it contains, in document order; a segment id claimed
/// by an earlier study is not repeated. Studies with no trajectory segment
/// are omitted.
pub fn lesion_trajectory<'a, G>(
    studies: &'a [Study],
    selected_segment_id: Option<&str>,
    graph: &G,
) -> Vec<StudyGroup<'a>>
where
    G: LineageGraph + ?Sized,
{
    let selected = match selected_segment_id {
        Some(id) if !id.is_empty() => id,
        _ => return Vec::new(),
    };

    let baselines = find_baselines(selected, graph);
    let lineage = Lineage::collect(&baselines, graph);

    let mut trajectory: Vec<StudyGroup<'a>> = Vec::new();
    let mut processed: HashSet<&str> = HashSet::new();

    for study in sort_studies_by_date(studies) {
        let mut group = StudyGroup {
            study,
            segments: Vec::new(),
            total_volume: 0.0,
            has_split: false,
            has_merge: false,
        };

        for segment in study.segments() {
            if !segment.has_id() || !lineage.contains(&segment.id) {
                continue;
            }
            if !processed.insert(segment.id.as_str()) {
                continue;
            }

            let is_split = lineage.child_count(&segment.id) > 1;
            let is_merge = lineage.parent_count(&segment.id) > 1;

            group.total_volume += segment.volume_or_zero();
            group.has_split |= is_split;
            group.has_merge |= is_merge;
            group.segments.push(SegmentWithStudy {
                segment,
                study,
                is_split,
                is_merge,
                is_selected: segment.id == selected,
            });
        }

        if !group.segments.is_empty() {
            trajectory.push(group);
        }
    }

    debug!(
        selected,
        baselines = baselines.len(),
        groups = trajectory.len(),
        "built lesion trajectory"
    );
    trajectory
}

// ---------------------------------------------------------------------------
// Measurement history
// ---------------------------------------------------------------------------

/// One row of the measurement table derived from a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LesionControl {
    /// "Control 1", "Control 2", ...
    pub control: String,
    pub study_id: String,
    pub date: String,
    pub volume: f64,
    pub axial_diameter: Option<f64>,
    /// Percent change against the previous control.
    pub volume_change: Option<f64>,
    pub axial_diameter_change: Option<f64>,
}

/// Turn study groups into measurement rows, one per group, with percentage
/// changes relative to the previous row.
pub fn measurement_history(groups: &[StudyGroup<'_>]) -> Vec<LesionControl> {
    let mut rows: Vec<LesionControl> = Vec::with_capacity(groups.len());

    for (index, group) in groups.iter().enumerate() {
        let volume = group.total_volume;
        let axial_diameter = group.total_axial_diameter();
        let previous = rows.last();

        let volume_change = previous.and_then(|p| percent_change(Some(p.volume), Some(volume)));
        let axial_diameter_change =
            previous.and_then(|p| percent_change(p.axial_diameter, axial_diameter));

        rows.push(LesionControl {
            control: format!("Control {}", index + 1),
            study_id: group.study.study_id.clone(),
            date: group.study.study_date.clone(),
            volume,
            axial_diameter,
            volume_change,
            axial_diameter_change,
        });
    }

    rows
}

fn percent_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (previous, current) {
        (Some(prev), Some(cur)) if prev > 0.0 => Some((cur - prev) / prev * 100.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_connection_map, ConnectionMap};

    fn ids<'a>(groups: &'a [StudyGroup<'a>]) -> Vec<Vec<&'a str>> {
        groups.iter().map(|g| g.segment_ids().collect()).collect()
    }

    #[test]
    fn test_baseline_of_root_is_itself() {
        let map = ConnectionMap::from_edges([("a", "b")]);
        assert_eq!(find_baseline("a", &map), "a");
        assert_eq!(find_baseline("unknown", &map), "unknown");
    }

    #[test]
    fn test_baselines_of_merge() {
        // a1 -> b, a2 -> b, r -> a2
        let map = ConnectionMap::from_edges([("a1", "b"), ("a2", "b"), ("r", "a2")]);
        assert_eq!(find_baselines("b", &map), vec!["a1", "r"]);
        assert_eq!(find_baseline("b", &map), "a1");
    }

    #[test]
    fn test_baseline_of_pure_cycle_is_selection() {
        let map = ConnectionMap::from_edges([("a", "b"), ("b", "a")]);
        assert_eq!(find_baselines("a", &map), vec!["a"]);
    }

    #[test]
    fn test_diamond_flags() {
        let studies = vec![
            Study::new("s1", "2021-01-01")
                .with_segments("x", vec![Segment::new("a", "A").with_volume(10.0)]),
            Study::new("s2", "2021-02-01").with_segments(
                "y",
                vec![
                    Segment::new("b", "B").with_parent("a").with_volume(4.0),
                    Segment::new("c", "C").with_parent("a").with_volume(5.0),
                ],
            ),
            Study::new("s3", "2021-03-01").with_segments(
                "z",
                vec![Segment::new("d", "D")
                    .with_parent("b")
                    .with_parent("c")
                    .with_volume(12.0)],
            ),
        ];
        let map = build_connection_map(&studies);
        let groups = lesion_trajectory(&studies, Some("c"), &map);

        assert_eq!(ids(&groups), vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
        assert!(groups[0].segments[0].is_split);
        assert!(groups[0].has_split);
        assert!(!groups[1].has_split && !groups[1].has_merge);
        assert!(groups[1].segments[1].is_selected);
        assert!(groups[2].segments[0].is_merge);
        assert_eq!(groups[1].total_volume, 9.0);
    }

    #[test]
    fn test_studies_sorted_by_date_with_undated_last() {
        let studies = vec![
            Study::new("late", "2022-05-01")
                .with_segments("x", vec![Segment::new("c", "C").with_parent("b")]),
            Study::new("undated", "someday")
                .with_segments("y", vec![Segment::new("d", "D").with_parent("c")]),
            Study::new("early", "2021-01-01T00:00:00Z")
                .with_segments("z", vec![Segment::new("a", "A")]),
            Study::new("mid", "2021-06-01")
                .with_segments("w", vec![Segment::new("b", "B").with_parent("a")]),
        ];
        let map = build_connection_map(&studies);
        let groups = lesion_trajectory(&studies, Some("a"), &map);

        let order: Vec<&str> = groups.iter().map(|g| g.study.study_id.as_str()).collect();
        assert_eq!(order, vec!["early", "mid", "late", "undated"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let studies = vec![
            Study::new("first", "2021-01-01").with_segments("x", vec![Segment::new("a", "A")]),
            Study::new("second", "2021-01-01")
                .with_segments("y", vec![Segment::new("b", "B").with_parent("a")]),
        ];
        let order: Vec<&str> = sort_studies_by_date(&studies)
            .iter()
            .map(|s| s.study_id.as_str())
            .collect();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_segment_claimed_once() {
        let shared = Segment::new("b", "B").with_parent("a").with_volume(3.0);
        let studies = vec![
            Study::new("s1", "2021-01-01").with_segments("x", vec![Segment::new("a", "A")]),
            Study::new("s2", "2021-02-01")
                .with_segments("y", vec![shared.clone()])
                .with_segments("y-dup", vec![shared.clone()]),
            Study::new("s3", "2021-03-01").with_segments("z", vec![shared]),
        ];
        let map = build_connection_map(&studies);
        let groups = lesion_trajectory(&studies, Some("b"), &map);

        assert_eq!(ids(&groups), vec![vec!["a"], vec!["b"]]);
        assert_eq!(groups[1].total_volume, 3.0);
    }

    #[test]
    fn test_no_selection() {
        let studies = vec![Study::new("s1", "2021-01-01")
            .with_segments("x", vec![Segment::new("a", "A")])];
        let map = build_connection_map(&studies);
        assert!(lesion_trajectory(&studies, None, &map).is_empty());
        assert!(lesion_trajectory(&studies, Some(""), &map).is_empty());
    }

    #[test]
    fn test_cyclic_input_terminates() {
        let studies = vec![
            Study::new("s1", "2021-01-01")
                .with_segments("x", vec![Segment::new("a", "A").with_parent("b")]),
            Study::new("s2", "2021-02-01")
                .with_segments("y", vec![Segment::new("b", "B").with_parent("a")]),
        ];
        let map = build_connection_map(&studies);
        let groups = lesion_trajectory(&studies, Some("a"), &map);
        assert_eq!(ids(&groups), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_measurement_history_changes() {
        let studies = vec![
            Study::new("s1", "2021-01-01").with_segments(
                "x",
                vec![Segment::new("a", "A")
                    .with_volume(100.0)
                    .with_axial_diameter(10.0)],
            ),
            Study::new("s2", "2021-02-01").with_segments(
                "y",
                vec![Segment::new("b", "B").with_parent("a").with_volume(150.0)],
            ),
        ];
        let map = build_connection_map(&studies);
        let groups = lesion_trajectory(&studies, Some("b"), &map);
        let rows = measurement_history(&groups);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].control, "Control 1");
        assert_eq!(rows[0].volume_change, None);
        assert_eq!(rows[0].axial_diameter, Some(10.0));
        assert_eq!(rows[1].volume_change, Some(50.0));
        assert_eq!(rows[1].axial_diameter, None);
        assert_eq!(rows[1].axial_diameter_change, None);
    }

    #[test]
    fn test_percent_change_from_zero_is_undefined() {
        assert_eq!(percent_change(Some(0.0), Some(5.0)), None);
        assert_eq!(percent_change(Some(4.0), Some(2.0)), Some(-50.0));
    }
}
