//! Percentage insights per cluster.
//!
//! A 1..5 average is rescaled onto 0..100 and banded at 80 and 60. This is a
//! different banding from [`compass_core::scoring::band_average`], which works
//! on the raw average and is what gets stored with a result.

use std::fmt;

use compass_core::model::ScoreMap;
use compass_core::scoring::round2;
use serde::{Deserialize, Serialize};

/// Band of a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsightBand {
    High,
    Medium,
    Low,
}

impl InsightBand {
    pub fn for_percentage(percentage: u32) -> Self {
        if percentage >= 80 {
            InsightBand::High
        } else if percentage >= 60 {
            InsightBand::Medium
        } else {
            InsightBand::Low
        }
    }
}

impl fmt::Display for InsightBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightBand::High => write!(f, "High"),
            InsightBand::Medium => write!(f, "Medium"),
            InsightBand::Low => write!(f, "Low"),
        }
    }
}

/// One cluster's average as a percentage with its band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInsight {
    pub name: String,
    pub average: f64,
    pub percentage: u32,
    pub band: InsightBand,
}

/// `round(100 * clamp(average - 1, 0, 4) / 4)`
pub fn percentage_for(average: f64) -> u32 {
    let scaled = (average - 1.0).clamp(0.0, 4.0);
    (100.0 * scaled / 4.0).round() as u32
}

/// Insights for every cluster, in stored order.
///
/// The percentage comes from the unrounded average; only the displayed
/// average is rounded.
pub fn compute_insights(cluster_scores: &ScoreMap) -> Vec<ClusterInsight> {
    cluster_scores
        .iter()
        .map(|(name, score)| {
            let average = score.average();
            let percentage = percentage_for(average);
            ClusterInsight {
                name: name.clone(),
                average: round2(average),
                percentage,
                band: InsightBand::for_percentage(percentage),
            }
        })
        .collect()
}
