//! Radar-chart dataset for JSON consumers (Chart.js shape).

use serde::{Deserialize, Serialize};

use compass_core::model::ScoreMap;
use compass_core::scoring::round2;

const FILL: &str = "rgba(54, 162, 235, 0.2)";
const LINE: &str = "rgba(54, 162, 235, 1)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
    pub background_color: String,
    pub border_color: String,
    pub border_width: u32,
    pub point_background_color: String,
    pub point_border_color: String,
    pub point_hover_background_color: String,
    pub point_hover_border_color: String,
}

impl ChartDataset {
    fn cluster_scores(data: Vec<f64>) -> Self {
        Self {
            label: "Cluster Scores".into(),
            data,
            background_color: FILL.into(),
            border_color: LINE.into(),
            border_width: 2,
            point_background_color: LINE.into(),
            point_border_color: "#fff".into(),
            point_hover_background_color: "#fff".into(),
            point_hover_border_color: LINE.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
    /// Scale maximum; absent when there is no data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

/// Chart dataset of cluster averages.
///
/// The scale stays at 5 unless weighting pushed an average above it.
pub fn compute_chart(cluster_scores: &ScoreMap) -> RadarChartData {
    if cluster_scores.is_empty() {
        return RadarChartData {
            labels: Vec::new(),
            datasets: vec![ChartDataset::cluster_scores(Vec::new())],
            max_value: None,
        };
    }

    let mut labels = Vec::with_capacity(cluster_scores.len());
    let mut data = Vec::with_capacity(cluster_scores.len());
    let mut max = 0.0_f64;
    for (name, score) in cluster_scores {
        let average = score.average();
        labels.push(name.clone());
        data.push(round2(average));
        max = max.max(average);
    }

    let max_value = if max > 5.0 {
        (max + 0.5).ceil()
    } else {
        5.0
    };

    RadarChartData {
        labels,
        datasets: vec![ChartDataset::cluster_scores(data)],
        max_value: Some(max_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::model::{AggregateScore, ScoreBand, StoredScore};

    fn scores(entries: &[(&str, f64)]) -> ScoreMap {
        entries
            .iter()
            .map(|(name, average)| {
                (
                    name.to_string(),
                    StoredScore::from(AggregateScore {
                        total: *average,
                        average: *average,
                        count: 1,
                        category: ScoreBand::Medium,
                    }),
                )
            })
            .collect()
    }

    #[test]
    fn labels_and_rounded_data() {
        let chart = compute_chart(&scores(&[("Drive", 4.256), ("Care", 3.0)]));
        assert_eq!(chart.labels, vec!["Drive", "Care"]);
        assert_eq!(chart.datasets[0].data, vec![4.26, 3.0]);
        assert_eq!(chart.max_value, Some(5.0));
    }

    #[test]
    fn weighted_averages_widen_the_scale() {
        let chart = compute_chart(&scores(&[("Drive", 6.2)]));
        assert_eq!(chart.max_value, Some(7.0));
    }

    #[test]
    fn empty_scores_have_no_maximum() {
        let chart = compute_chart(&ScoreMap::new());
        assert!(chart.labels.is_empty());
        assert!(chart.datasets[0].data.is_empty());
        let json = serde_json::to_value(&chart).unwrap();
        assert!(json.get("maxValue").is_none());
        assert_eq!(json["datasets"][0]["borderWidth"], 2);
        assert_eq!(json["datasets"][0]["pointBorderColor"], "#fff");
    }
}
