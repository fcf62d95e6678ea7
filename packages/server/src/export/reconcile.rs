//! Rebuilds the labeled dataset from live image rows.
//!
//! A cluster's exported label is the majority `current_label` of its reviewed
//! images, not the stored `person_name`: relabeling outliers after a batch
//! annotation can move the majority.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::FromQueryResult;
use uuid::Uuid;

use super::paths::export_path;
use crate::entity::split_annotation;
use crate::models::export::{
    ClusterExport, Confidence, ExportStatistics, OutlierExport, SplitExport,
};

/// Outlier share at or above which a cluster's confidence is `low`.
pub const LOW_CONFIDENCE_RATIO: f64 = 0.2;

pub const UNLABELED: &str = "unlabeled";
pub const NOT_HUMAN: &str = "not_human";

/// The columns of an `annotated` or `outlier` image that reconciliation reads.
#[derive(Debug, Clone, Default, FromQueryResult)]
pub struct ReviewedImage {
    pub cluster_id: Uuid,
    pub file_path: String,
    pub current_label: Option<String>,
    pub is_custom_label: bool,
    pub quality_attributes: Vec<String>,
    pub annotated_at: Option<DateTime<Utc>>,
}

impl ReviewedImage {
    fn label(&self) -> Option<&str> {
        self.current_label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// Case-folded label; the vote and the partition compare these.
    fn label_key(&self) -> Option<String> {
        self.label().map(str::to_lowercase)
    }
}

/// A completed cluster with its reviewed images in identifier order.
#[derive(Debug, Default)]
pub struct ClusterInput {
    pub cluster_name: String,
    pub person_name: Option<String>,
    pub images: Vec<ReviewedImage>,
    pub splits: Vec<split_annotation::Model>,
}

/// Majority split of a cluster's reviewed images.
#[derive(Debug)]
pub struct Partition<'a> {
    /// Lowercased when voted; a `person_name` fallback keeps its case.
    pub label: String,
    pub main: Vec<&'a ReviewedImage>,
    pub outliers: Vec<&'a ReviewedImage>,
}

/// Most frequent label, compared case-insensitively and returned lowercased.
/// Ties go to the label seen first.
pub fn dominant_label(images: &[ReviewedImage]) -> Option<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, key) in images.iter().filter_map(|i| i.label_key()).enumerate() {
        counts.entry(key).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(label, _)| label)
}

/// Split images into the majority group and everything else.
///
/// Unlabeled images join the majority only when nothing in the cluster has a
/// label; the label then falls back to `person_name`, then `unlabeled`.
pub fn partition<'a>(images: &'a [ReviewedImage], person_name: Option<&str>) -> Partition<'a> {
    match dominant_label(images) {
        Some(label) => {
            let (main, outliers): (Vec<_>, Vec<_>) = images
                .iter()
                .partition(|i| i.label_key().as_deref() == Some(label.as_str()));
            Partition {
                label,
                main,
                outliers,
            }
        }
        None => Partition {
            label: person_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(UNLABELED)
                .to_string(),
            main: images.iter().collect(),
            outliers: Vec::new(),
        },
    }
}

pub fn confidence(outliers: usize, total: usize) -> Confidence {
    if outliers == 0 || total == 0 {
        return Confidence::High;
    }
    if (outliers as f64) / (total as f64) < LOW_CONFIDENCE_RATIO {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Accumulates exported clusters and episode-wide statistics.
#[derive(Debug, Default)]
pub struct Reconciler {
    pub clusters: BTreeMap<String, ClusterExport>,
    pub splits: BTreeMap<String, SplitExport>,
    pub statistics: ExportStatistics,
    counted_paths: HashSet<String>,
}

impl Reconciler {
    pub fn new(total_clusters: usize) -> Self {
        Self {
            statistics: ExportStatistics {
                total_clusters,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Fold one completed cluster in. Clusters with nothing to export are skipped.
    pub fn add_cluster(&mut self, input: &ClusterInput) {
        if input.images.is_empty() && input.splits.is_empty() {
            return;
        }

        let partition = partition(&input.images, input.person_name.as_deref());
        let label = partition.label.to_lowercase();

        let mut image_paths = Vec::with_capacity(partition.main.len());
        for image in &partition.main {
            if let Some(path) = export_path(&image.file_path) {
                self.counted_paths.insert(path.clone());
                image_paths.push(path);
            }
        }

        let mut outliers = Vec::with_capacity(partition.outliers.len());
        for image in &partition.outliers {
            let outlier_label = image.label().unwrap_or(UNLABELED).to_lowercase();
            *self
                .statistics
                .character_distribution
                .entry(outlier_label.clone())
                .or_default() += 1;
            if let Some(path) = export_path(&image.file_path) {
                self.counted_paths.insert(path.clone());
                outliers.push(OutlierExport {
                    image_path: path,
                    label: outlier_label,
                    is_custom_label: image.is_custom_label,
                    quality: image.quality_attributes.clone(),
                });
            }
        }

        let main_count = partition.main.len() as u64;
        let outlier_count = partition.outliers.len() as u64;
        if main_count > 0 {
            *self
                .statistics
                .character_distribution
                .entry(label.clone())
                .or_default() += main_count;
        }
        self.statistics.total_faces += main_count + outlier_count;
        self.statistics.outliers_found += outlier_count;

        let split_annotations: Vec<SplitExport> = input
            .splits
            .iter()
            .map(|split| self.add_split(split))
            .collect();

        if label == NOT_HUMAN {
            self.statistics.not_human_clusters += 1;
        }

        let export = ClusterExport {
            is_custom_label: partition.main.iter().any(|i| i.is_custom_label),
            confidence: confidence(partition.outliers.len(), input.images.len()),
            image_count: partition.main.len(),
            image_paths,
            outliers,
            split_annotations,
            label,
        };
        let key = unique_key(&self.clusters, &input.cluster_name);
        self.clusters.insert(key, export);
        self.statistics.annotated_clusters = self.clusters.len();
    }

    fn add_split(&mut self, split: &split_annotation::Model) -> SplitExport {
        let label = split.person_name.trim().to_lowercase();
        let image_paths: Vec<String> = split
            .image_paths
            .iter()
            .filter_map(|p| export_path(p))
            .filter(|p| self.counted_paths.insert(p.clone()))
            .collect();

        let count = image_paths.len() as u64;
        if count > 0 {
            *self
                .statistics
                .character_distribution
                .entry(label.clone())
                .or_default() += count;
        }
        self.statistics.total_faces += count;

        let export = SplitExport {
            scene_track_pattern: split.scene_track_pattern.clone(),
            label,
            image_count: image_paths.len(),
            image_paths,
        };
        let key = unique_key(&self.splits, &split.scene_track_pattern);
        self.splits.insert(key, export.clone());
        export
    }
}

/// `name`, or `name__2`, `name__3`, ... if already taken.
fn unique_key<V>(map: &BTreeMap<String, V>, name: &str) -> String {
    if !map.contains_key(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{name}__{n}"))
        .find(|candidate| !map.contains_key(candidate))
        .unwrap_or_else(|| name.to_string())
}
