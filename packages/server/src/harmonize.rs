//! Cross-cluster "piles": labeled images of an episode grouped by label.
//!
//! Derived on every request from image rows; nothing is stored.

use std::collections::BTreeMap;

use sea_orm::FromQueryResult;
use uuid::Uuid;

use crate::models::episode::PileResponse;

#[derive(Debug, Clone, FromQueryResult)]
pub struct LabeledImage {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub current_label: Option<String>,
}

/// Group images by trimmed, lowercased label. Unlabeled images are left out.
///
/// Piles come back sorted by label; ids keep their input order.
pub fn piles(images: &[LabeledImage]) -> Vec<PileResponse> {
    let mut by_label: BTreeMap<String, PileResponse> = BTreeMap::new();
    for img in images {
        let Some(label) = img
            .current_label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
        else {
            continue;
        };
        let label = label.to_lowercase();
        let pile = by_label.entry(label.clone()).or_insert_with(|| PileResponse {
            label,
            image_count: 0,
            cluster_ids: Vec::new(),
            image_ids: Vec::new(),
        });
        pile.image_count += 1;
        pile.image_ids.push(img.id);
        if !pile.cluster_ids.contains(&img.cluster_id) {
            pile.cluster_ids.push(img.cluster_id);
        }
    }
    by_label.into_values().collect()
}
