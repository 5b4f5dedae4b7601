//! Report documents.
//!
//! [`ReportService`] owns the lazily created report record of a result,
//! gathers everything a rendered report shows into a [`ReportDocument`], and
//! hands it to a [`DocumentRenderer`]. The renderer produces bytes; the
//! service writes them and records where they went.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use compass_core::model::{Cluster, ResultStatus, ScoreBand, TestReport};
use compass_core::scoring::{band_average, disambiguated_key};
use compass_core::traits::{ResultStore, StoreResult, TaxonomyStore};
use compass_core::CompassError;

use crate::chart::{compute_chart, RadarChartData};
use crate::insights::{compute_insights, ClusterInsight};
use crate::radar::{compute_radar, RadarGeometry, RadarLayout};

/// One cluster of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSection {
    pub insight: ClusterInsight,
    /// Band stored with the result.
    pub band: ScoreBand,
    pub description: Option<String>,
    /// Behaviour text matching `band`.
    pub behaviour: Option<String>,
}

/// One construct line of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructLine {
    pub name: String,
    pub average: f64,
    pub band: ScoreBand,
}

/// Everything a rendered report shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub result_id: u64,
    pub test_title: String,
    pub user_id: u64,
    pub status: ResultStatus,
    pub total_score: f64,
    pub average_score: f64,
    pub overall_category: ScoreBand,
    pub sdb_flag: bool,
    pub clusters: Vec<ClusterSection>,
    pub constructs: Vec<ConstructLine>,
    pub radar: Option<RadarGeometry>,
    pub chart: RadarChartData,
    pub summary: Option<String>,
    pub recommendations: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Turns a report document into a file's contents.
pub trait DocumentRenderer: Send + Sync {
    /// File extension of the output, without the dot.
    fn extension(&self) -> &'static str;

    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>>;
}

/// Renders the document as pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl DocumentRenderer for JsonRenderer {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(document).context("failed to serialize report")
    }
}

fn behaviour_for(cluster: &Cluster, band: ScoreBand) -> Option<String> {
    match band {
        ScoreBand::High => cluster.high_behaviour.clone(),
        ScoreBand::Medium => cluster.medium_behaviour.clone(),
        ScoreBand::Low => cluster.low_behaviour.clone(),
    }
}

/// Report records and rendering for results.
pub struct ReportService {
    taxonomy: Arc<dyn TaxonomyStore>,
    results: Arc<dyn ResultStore>,
    layout: RadarLayout,
}

impl ReportService {
    pub fn new(
        taxonomy: Arc<dyn TaxonomyStore>,
        results: Arc<dyn ResultStore>,
        layout: RadarLayout,
    ) -> Self {
        Self {
            taxonomy,
            results,
            layout,
        }
    }

    /// The report of a result, created on first access.
    pub async fn report(&self, result_id: u64) -> StoreResult<TestReport> {
        if let Some(report) = self.results.report_for_result(result_id).await? {
            return Ok(report);
        }
        let report = self.results.create_report(result_id).await?;
        tracing::info!(result_id, report_id = report.id, "report created");
        Ok(report)
    }

    /// Set the summary and/or recommendations; `None` leaves a field as is.
    pub async fn update_text(
        &self,
        result_id: u64,
        summary: Option<String>,
        recommendations: Option<String>,
    ) -> StoreResult<TestReport> {
        let mut report = self.report(result_id).await?;
        if summary.is_some() {
            report.report_summary = summary;
        }
        if recommendations.is_some() {
            report.recommendations = recommendations;
        }
        self.results.update_report(report).await
    }

    /// Gather the document of a result.
    pub async fn build_document(&self, result_id: u64) -> StoreResult<ReportDocument> {
        let result = self
            .results
            .result(result_id)
            .await?
            .ok_or(CompassError::ResultNotFound(result_id))?;
        let test = self
            .taxonomy
            .test(result.test_id)
            .await?
            .ok_or(CompassError::TestNotFound(result.test_id))?;
        let report = self.report(result_id).await?;

        // Scores outlive quota changes, so every cluster is a candidate.
        // Attached clusters win a plain name shared with a detached one.
        let all = self.taxonomy.clusters().await?;
        let attached = |c: &Cluster| test.clusters.iter().any(|q| q.cluster_id == c.id);
        let mut clusters_by_name: HashMap<String, &Cluster> = HashMap::new();
        let (current, detached): (Vec<&Cluster>, Vec<&Cluster>) =
            all.iter().partition(|c| attached(c));
        for cluster in current.into_iter().chain(detached) {
            clusters_by_name
                .entry(cluster.name.clone())
                .or_insert(cluster);
            clusters_by_name.insert(disambiguated_key(&cluster.name, cluster.id), cluster);
        }

        let insights = compute_insights(&result.cluster_scores);
        let clusters = insights
            .iter()
            .map(|insight| {
                let band = result
                    .cluster_scores
                    .get(&insight.name)
                    .and_then(|s| s.as_aggregate().map(|a| a.category))
                    .unwrap_or_else(|| band_average(insight.average));
                let cluster = clusters_by_name.get(&insight.name);
                ClusterSection {
                    insight: insight.clone(),
                    band,
                    description: cluster.and_then(|c| c.description.clone()),
                    behaviour: cluster.and_then(|c| behaviour_for(c, band)),
                }
            })
            .collect();

        let constructs = result
            .construct_scores
            .iter()
            .map(|(name, score)| {
                let average = score.average();
                ConstructLine {
                    name: name.clone(),
                    average,
                    band: score
                        .as_aggregate()
                        .map(|a| a.category)
                        .unwrap_or_else(|| band_average(average)),
                }
            })
            .collect();

        Ok(ReportDocument {
            result_id,
            test_title: test.title,
            user_id: result.user_id,
            status: result.status,
            total_score: result.total_score,
            average_score: result.average_score,
            overall_category: result.overall_band(),
            sdb_flag: result.sdb_flag,
            clusters,
            constructs,
            radar: compute_radar(&insights, &self.layout),
            chart: compute_chart(&result.cluster_scores),
            summary: report.report_summary,
            recommendations: report.recommendations,
            generated_at: Utc::now(),
        })
    }

    /// Render a result's report into `out_dir` and record the file on it.
    pub async fn render(
        &self,
        result_id: u64,
        renderer: &dyn DocumentRenderer,
        out_dir: &Path,
    ) -> Result<(TestReport, PathBuf)> {
        let document = self.build_document(result_id).await?;
        let bytes = renderer.render(&document)?;

        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let path = out_dir.join(format!(
            "report-{result_id}.{}",
            renderer.extension()
        ));
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write report to {}", path.display()))?;

        let mut report = self.report(result_id).await?;
        report.report_file = Some(path.display().to_string());
        report.radar_data = Some(serde_json::to_value(&document.chart)?);
        report.generated_at = Some(document.generated_at);
        let report = self.results.update_report(report).await?;

        tracing::info!(result_id, path = %path.display(), "report rendered");
        Ok((report, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::assembler::TestAssembler;
    use compass_core::parser::parse_bank_str;
    use compass_core::scoring::{AnswerInput, ScoringConfig, ScoringEngine};
    use compass_core::store::InMemoryStore;

    const BANK: &str = r#"
[bank]
name = "Report"

[[clusters]]
id = 1
name = "Drive"
description = "How hard you push"
high_behaviour = "Pushes through setbacks"
low_behaviour = "Needs external structure"

[[clusters.constructs]]
id = 10
name = "Grit"

[[clusters.constructs.questions]]
id = 100
text = "I finish what I start."
category = "P"

[[clusters.constructs.questions]]
id = 101
text = "I give up easily."
category = "R"

[[clusters]]
id = 2
name = "Care"

[[clusters.constructs]]
id = 20
name = "Empathy"

[[clusters.constructs.questions]]
id = 200
text = "I notice when others are upset."
category = "P"

[[tests]]
id = 1
title = "Compass"
clusters = [{ cluster_id = 1 }, { cluster_id = 2 }]
"#;

    async fn scored_result() -> (Arc<InMemoryStore>, ReportService, u64) {
        let bank = parse_bank_str(BANK, Path::new("bank.toml")).unwrap();
        let store = Arc::new(InMemoryStore::from_snapshot(bank.into_snapshot()).unwrap());
        TestAssembler::new(store.clone(), store.clone())
            .assemble(1)
            .await
            .unwrap();
        let engine = ScoringEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            ScoringConfig::default(),
        );
        let submission = engine
            .submit(
                1,
                3,
                &[
                    AnswerInput { question_id: 100, value: 5 },
                    AnswerInput { question_id: 101, value: 1 },
                    AnswerInput { question_id: 200, value: 2 },
                ],
            )
            .await
            .unwrap();
        let service = ReportService::new(store.clone(), store.clone(), RadarLayout::default());
        (store, service, submission.result.id)
    }

    #[tokio::test]
    async fn report_is_created_lazily_once() {
        let (store, service, result_id) = scored_result().await;
        assert!(store.report_for_result(result_id).await.unwrap().is_none());
        let first = service.report(result_id).await.unwrap();
        let second = service.report(result_id).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn text_updates_keep_unset_fields() {
        let (_, service, result_id) = scored_result().await;
        service
            .update_text(result_id, Some("Strong drive".into()), None)
            .await
            .unwrap();
        let report = service
            .update_text(result_id, None, Some("Delegate more".into()))
            .await
            .unwrap();
        assert_eq!(report.report_summary.as_deref(), Some("Strong drive"));
        assert_eq!(report.recommendations.as_deref(), Some("Delegate more"));
    }

    #[tokio::test]
    async fn document_collects_bands_and_behaviour() {
        let (_, service, result_id) = scored_result().await;
        let document = service.build_document(result_id).await.unwrap();

        assert_eq!(document.test_title, "Compass");
        assert_eq!(document.clusters.len(), 2);
        let drive = &document.clusters[0];
        assert_eq!(drive.insight.name, "Drive");
        assert_eq!(drive.insight.percentage, 100);
        assert_eq!(drive.band, ScoreBand::High);
        assert_eq!(drive.behaviour.as_deref(), Some("Pushes through setbacks"));
        let care = &document.clusters[1];
        assert_eq!(care.band, ScoreBand::Low);
        assert_eq!(care.behaviour, None);
        assert_eq!(document.radar.as_ref().unwrap().axes.len(), 2);
        assert_eq!(document.chart.labels, vec!["Drive", "Care"]);
    }

    #[tokio::test]
    async fn detached_cluster_keeps_its_text() {
        let (store, service, result_id) = scored_result().await;
        store.detach_clusters(1, &[1]).await.unwrap();

        let document = service.build_document(result_id).await.unwrap();
        let drive = &document.clusters[0];
        assert_eq!(drive.insight.name, "Drive");
        assert_eq!(drive.description.as_deref(), Some("How hard you push"));
        assert_eq!(drive.behaviour.as_deref(), Some("Pushes through setbacks"));
    }

    #[tokio::test]
    async fn render_records_file_on_report() {
        let (store, service, result_id) = scored_result().await;
        let dir = tempfile::tempdir().unwrap();
        let (report, path) = service
            .render(result_id, &JsonRenderer, dir.path())
            .await
            .unwrap();

        assert!(path.exists());
        assert_eq!(report.report_file, Some(path.display().to_string()));
        assert!(report.generated_at.is_some());
        assert!(report.radar_data.is_some());

        let written: ReportDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.result_id, result_id);

        let stored = store.report_for_result(result_id).await.unwrap().unwrap();
        assert_eq!(stored, report);
    }

    #[tokio::test]
    async fn unknown_result_is_rejected() {
        let (_, service, _) = scored_result().await;
        let err = service.build_document(99).await.unwrap_err();
        assert!(matches!(err, CompassError::ResultNotFound(99)));
    }
}
