use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::graph::resolver::ancestors;
use crate::graph::LineageGraph;
use crate::model::segment::{Classification, Segment, SegmentId};
use crate::model::study::Study;

/// A segment placed in its classification bucket, with every segment it
/// descends from.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedSegment<'a> {
    pub segment: &'a Segment,
    pub ancestors: BTreeSet<SegmentId>,
}

/// Bucket every segment by classification. Unclassified segments land in
/// `default_classification`. Within a bucket segments keep study then
/// document order.
pub fn classification_groups<'a, G>(
    studies: &'a [Study],
    graph: &G,
    default_classification: Classification,
) -> BTreeMap<Classification, Vec<GroupedSegment<'a>>>
where
    G: LineageGraph + ?Sized,
{
    let mut groups: BTreeMap<Classification, Vec<GroupedSegment<'a>>> = BTreeMap::new();

    for segment in studies.iter().flat_map(|study| study.segments()) {
        if !segment.has_id() {
            continue;
        }
        let classification = segment.classification.unwrap_or(default_classification);
        groups.entry(classification).or_default().push(GroupedSegment {
            segment,
            ancestors: ancestors(&segment.id, graph),
        });
    }

    groups
}
