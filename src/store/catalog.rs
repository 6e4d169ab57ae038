use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{LesionError, LesionResult};
use crate::graph::{
    build_connection_map, classification_groups, graph_view, lesion_trajectory, related_segments,
    ConnectionMap, GraphView, GroupedSegment, StudyGroup,
};
use crate::model::segment::{Classification, Segment, SegmentId};
use crate::model::study::Study;

// ---------------------------------------------------------------------------
// Catalog: the loaded study set and everything derived from it
// ---------------------------------------------------------------------------

/// Position of a segment inside the catalog's study list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SegmentLocation {
    study: usize,
    series: usize,
    segmentation: usize,
    segment: usize,
}

/// Measurements surfaced next to a segment in a viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentStats {
    pub volume: Option<f64>,
    pub diameter: Option<f64>,
    pub affected_organs: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogSummary {
    pub studies: usize,
    pub series: usize,
    pub segments: usize,
    pub connections: usize,
    pub baseline_study_id: Option<String>,
    pub generation: u64,
}

/// Accepted shapes of a study-set document.
#[derive(Deserialize)]
#[serde(untagged)]
enum StudySet {
    List(Vec<Study>),
    Wrapped { studies: Vec<Study> },
}

/// Owned study set with its derived connection map.
///
/// Every load bumps the generation and rebuilds the map and lookup indexes;
/// the related-segment set for the current selection is cached against
/// `(generation, selection)`.
#[derive(Debug, Default)]
pub struct Catalog {
    studies: Vec<Study>,
    study_index: HashMap<String, usize>,
    segment_index: HashMap<SegmentId, SegmentLocation>,
    label_index: HashMap<String, HashMap<String, SegmentLocation>>,
    baseline_study_id: Option<String>,
    connections: ConnectionMap,
    generation: u64,
    selection: Option<SegmentId>,
    related_cache: Option<RelatedCache>,
}

#[derive(Debug)]
struct RelatedCache {
    generation: u64,
    selection: Option<SegmentId>,
    related: BTreeSet<SegmentId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of studies, or an object with a `studies` array.
    pub fn from_json_str(raw: &str) -> LesionResult<Self> {
        let studies = match serde_json::from_str::<StudySet>(raw)? {
            StudySet::List(studies) => studies,
            StudySet::Wrapped { studies } => studies,
        };
        let mut catalog = Self::new();
        catalog.set_studies(studies);
        Ok(catalog)
    }

    pub fn from_json_file(path: &Path) -> LesionResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            studies = catalog.studies.len(),
            "loaded study set"
        );
        Ok(catalog)
    }

    /// Merge a batch of studies into the catalog.
    ///
    /// Studies are keyed by `study_id`: a known id is replaced in place, a new
    /// one is appended. The last basal study of the batch becomes the
    /// baseline; without one the previous baseline is kept, unless the batch
    /// replaces it with a study that is no longer basal.
    pub fn set_studies(&mut self, studies: Vec<Study>) {
        let incoming = studies.len();
        for study in studies {
            if study.timestamp().is_none() {
                warn!(
                    study_id = %study.study_id,
                    study_date = %study.study_date,
                    "unparseable study date, study will be ordered last"
                );
            }
            if study.is_basal {
                self.baseline_study_id = Some(study.study_id.clone());
            } else if self.baseline_study_id.as_deref() == Some(study.study_id.as_str()) {
                self.baseline_study_id = None;
            }
            match self.study_index.get(&study.study_id) {
                Some(&index) => self.studies[index] = study,
                None => {
                    self.study_index
                        .insert(study.study_id.clone(), self.studies.len());
                    self.studies.push(study);
                }
            }
        }

        self.reindex();
        self.connections = build_connection_map(&self.studies);
        self.generation += 1;

        info!(
            incoming,
            studies = self.studies.len(),
            segments = self.segment_index.len(),
            edges = self.connections.edge_count(),
            generation = self.generation,
            "study set updated"
        );
    }

    /// Drop every study and derived view.
    pub fn clear(&mut self) {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    fn reindex(&mut self) {
        self.segment_index.clear();
        self.label_index.clear();

        for (si, study) in self.studies.iter().enumerate() {
            for (ri, series) in study.series.iter().enumerate() {
                // A reloaded series starts from an empty label index.
                let labels = self
                    .label_index
                    .entry(series.series_instance_uid.clone())
                    .or_default();
                labels.clear();
                for (gi, segmentation) in series.segmentations.iter().enumerate() {
                    for (ki, segment) in segmentation.segments.iter().enumerate() {
                        let location = SegmentLocation {
                            study: si,
                            series: ri,
                            segmentation: gi,
                            segment: ki,
                        };
                        labels.insert(segment.label.clone(), location);
                        if segment.has_id() {
                            self.segment_index
                                .entry(segment.id.clone())
                                .or_insert(location);
                        }
                    }
                }
            }
        }
    }

    fn locate(&self, location: SegmentLocation) -> Option<&Segment> {
        self.studies
            .get(location.study)?
            .series
            .get(location.series)?
            .segmentations
            .get(location.segmentation)?
            .segments
            .get(location.segment)
    }

    // -- lookups ------------------------------------------------------------

    /// Studies in load order.
    pub fn studies(&self) -> &[Study] {
        &self.studies
    }

    pub fn study(&self, study_id: &str) -> Option<&Study> {
        self.study_index
            .get(study_id)
            .and_then(|&index| self.studies.get(index))
    }

    pub fn require_study(&self, study_id: &str) -> LesionResult<&Study> {
        self.study(study_id)
            .ok_or_else(|| LesionError::StudyNotFound(study_id.to_string()))
    }

    pub fn baseline_study(&self) -> Option<&Study> {
        self.baseline_study_id
            .as_deref()
            .and_then(|id| self.study(id))
    }

    /// First segment loaded with this id.
    pub fn segment(&self, segment_id: &str) -> Option<&Segment> {
        self.segment_index
            .get(segment_id)
            .and_then(|&location| self.locate(location))
    }

    /// Like [`Catalog::segment`], failing with `SegmentNotFound`.
    pub fn require_segment(&self, segment_id: &str) -> LesionResult<&Segment> {
        self.segment(segment_id)
            .ok_or_else(|| LesionError::SegmentNotFound(segment_id.to_string()))
    }

    /// The segment labelled `label` in a series. With duplicate labels the
    /// last one loaded wins.
    pub fn segment_by_series_and_label(&self, series_uid: &str, label: &str) -> Option<&Segment> {
        self.label_index
            .get(series_uid)?
            .get(label)
            .and_then(|&location| self.locate(location))
    }

    pub fn segment_stats(&self, series_uid: &str, label: &str) -> Option<SegmentStats> {
        self.segment_by_series_and_label(series_uid, label)
            .map(|segment| SegmentStats {
                volume: segment.volume,
                diameter: segment.axial_diameter,
                affected_organs: segment.affected_organs.clone(),
            })
    }

    pub fn connections(&self) -> &ConnectionMap {
        &self.connections
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            studies: self.studies.len(),
            series: self.studies.iter().map(|s| s.series.len()).sum(),
            segments: self.segment_index.len(),
            connections: self.connections.edge_count(),
            baseline_study_id: self.baseline_study().map(|s| s.study_id.clone()),
            generation: self.generation,
        }
    }

    // -- selection and derived views ------------------------------------------

    pub fn select(&mut self, segment_id: Option<&str>) {
        self.selection = segment_id.filter(|id| !id.is_empty()).map(str::to_string);
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Segments related to the current selection, recomputed only when the
    /// study set or the selection changed since the last call.
    pub fn related(&mut self) -> &BTreeSet<SegmentId> {
        let stale = match &self.related_cache {
            Some(cache) => {
                cache.generation != self.generation || cache.selection != self.selection
            }
            None => true,
        };

        if stale {
            self.related_cache = None;
        }

        let generation = self.generation;
        let selection = &self.selection;
        let connections = &self.connections;
        let cache = self.related_cache.get_or_insert_with(|| {
            debug!(generation, selection = ?selection, "recomputing related segments");
            RelatedCache {
                generation,
                selection: selection.clone(),
                related: related_segments(selection.as_deref(), connections),
            }
        });
        &cache.related
    }

    pub fn trajectory(&self) -> Vec<StudyGroup<'_>> {
        lesion_trajectory(&self.studies, self.selection.as_deref(), &self.connections)
    }

    pub fn graph_view(&self) -> GraphView {
        graph_view(&self.studies, self.selection.as_deref(), &self.connections)
    }

    pub fn classification_groups(
        &self,
        default_classification: Classification,
    ) -> BTreeMap<Classification, Vec<GroupedSegment<'_>>> {
        classification_groups(&self.studies, &self.connections, default_classification)
    }
}
