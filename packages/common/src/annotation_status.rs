#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workflow status of an uploaded episode.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")
)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    /// No cluster has been annotated yet.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Some, but not all, clusters are annotated.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "in_progress"))]
    InProgress,
    /// Labels are being reconciled across clusters before export.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "ready_for_harmonization"))]
    ReadyForHarmonization,
    /// Every cluster is annotated.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "completed"))]
    Completed,
}

impl EpisodeStatus {
    pub const ALL: &'static [EpisodeStatus] = &[
        Self::Pending,
        Self::InProgress,
        Self::ReadyForHarmonization,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::ReadyForHarmonization => "ready_for_harmonization",
            Self::Completed => "completed",
        }
    }

    /// Status implied by the annotated/total cluster counters.
    pub fn from_progress(annotated: i32, total: i32) -> Self {
        if total > 0 && annotated >= total {
            Self::Completed
        } else if annotated > 0 {
            Self::InProgress
        } else {
            Self::Pending
        }
    }
}

/// Annotation status of a cluster.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")
)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Outliers are being reviewed, or the cluster awaits split annotations.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "in_progress"))]
    InProgress,
    /// Terminal. Counted once toward the episode's annotated clusters.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "completed"))]
    Completed,
}

impl ClusterStatus {
    pub const ALL: &'static [ClusterStatus] = &[Self::Pending, Self::InProgress, Self::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// Annotation status of a single face image.
///
/// `pending <-> outlier`, then either one moves to `annotated`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")
)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Awaiting review or batch labeling.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Flagged as not belonging to the cluster's person.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "outlier"))]
    Outlier,
    /// Carries a person label.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "annotated"))]
    Annotated,
}

impl ImageStatus {
    pub const ALL: &'static [ImageStatus] = &[Self::Pending, Self::Outlier, Self::Annotated];

    /// Statuses shown in the review pager.
    pub const REVIEWABLE: &'static [ImageStatus] = &[Self::Pending, Self::Outlier];

    /// Statuses whose labels are exported.
    pub const EXPORTABLE: &'static [ImageStatus] = &[Self::Outlier, Self::Annotated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Outlier => "outlier",
            Self::Annotated => "annotated",
        }
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    kind: &'static str,
    invalid: String,
    valid: Vec<&'static str>,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid {} status '{}'. Valid values: {}",
            self.kind,
            self.invalid,
            self.valid.join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

macro_rules! impl_status_text {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|status| status.as_str() == s)
                    .ok_or_else(|| ParseStatusError {
                        kind: $kind,
                        invalid: s.to_string(),
                        valid: Self::ALL.iter().map(|status| status.as_str()).collect(),
                    })
            }
        }
    };
}

impl_status_text!(EpisodeStatus, "episode");
impl_status_text!(ClusterStatus, "cluster");
impl_status_text!(ImageStatus, "image");
