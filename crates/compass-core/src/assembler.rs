//! Test assembly.
//!
//! Turns a test's per-cluster category quotas into a concrete, shuffled,
//! de-duplicated question list and stores it as the test's materialized
//! list. Selection itself is a pure function of the gathered pools and a
//! random source, so a seeded [`StdRng`] makes assembly reproducible.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CompassError;
use crate::model::{Category, ClusterQuota, MaterializedList, Question, Test, TestQuestion};
use crate::traits::{NewTest, StoreResult, TaxonomyStore, TestInstanceStore};

/// Outcome of one assembly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub test_id: u64,
    /// Questions in the new materialized list.
    pub selected_count: usize,
    /// Candidates gathered across clusters before de-duplication.
    pub total_requested: usize,
    /// Shortfall notes, one per (cluster, category) that came up short.
    pub warnings: Vec<String>,
    /// Version of the materialized list that was stored.
    pub version: Uuid,
}

/// The active questions of one attached cluster together with its quota.
#[derive(Debug, Clone)]
pub struct ClusterPool {
    pub cluster_id: u64,
    pub name: String,
    pub quota: ClusterQuota,
    pub questions: Vec<Question>,
}

/// Result of [`select_questions`], before it is stored.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub entries: Vec<TestQuestion>,
    pub total_requested: usize,
    pub warnings: Vec<String>,
}

/// Select, de-duplicate, shuffle and number questions from the given pools.
pub fn select_questions<R: Rng + ?Sized>(pools: &[ClusterPool], rng: &mut R) -> Selection {
    let mut candidates: Vec<(u64, u64)> = Vec::new();
    let mut warnings = Vec::new();

    for pool in pools {
        if pool.quota.is_unrestricted() {
            candidates.extend(pool.questions.iter().map(|q| (q.id, pool.cluster_id)));
            continue;
        }

        for category in Category::ALL {
            let requested = pool.quota.count_for(category) as usize;
            if requested == 0 {
                continue;
            }
            let available: Vec<&Question> = pool
                .questions
                .iter()
                .filter(|q| q.category == category)
                .collect();

            if available.len() < requested {
                let warning = format!(
                    "Cluster '{}': only {} {} questions available, requested {}",
                    pool.name,
                    available.len(),
                    category,
                    requested
                );
                tracing::warn!(cluster_id = pool.cluster_id, "{warning}");
                warnings.push(warning);
                candidates.extend(available.iter().map(|q| (q.id, pool.cluster_id)));
            } else {
                candidates.extend(
                    available
                        .choose_multiple(rng, requested)
                        .map(|q| (q.id, pool.cluster_id)),
                );
            }
        }
    }

    let total_requested = candidates.len();
    let mut seen = HashSet::new();
    candidates.retain(|(question_id, _)| seen.insert(*question_id));
    candidates.shuffle(rng);

    let entries = candidates
        .into_iter()
        .enumerate()
        .map(|(i, (question_id, cluster_id))| TestQuestion {
            question_id,
            cluster_id,
            order_no: i as u32 + 1,
        })
        .collect();

    Selection {
        entries,
        total_requested,
        warnings,
    }
}

/// Assembles tests against a taxonomy and stores the result.
pub struct TestAssembler {
    taxonomy: Arc<dyn TaxonomyStore>,
    instances: Arc<dyn TestInstanceStore>,
    seed: Option<u64>,
}

impl TestAssembler {
    pub fn new(taxonomy: Arc<dyn TaxonomyStore>, instances: Arc<dyn TestInstanceStore>) -> Self {
        Self {
            taxonomy,
            instances,
            seed: None,
        }
    }

    /// Use a fixed seed instead of OS entropy.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Assemble a test and replace its materialized list.
    pub async fn assemble(&self, test_id: u64) -> StoreResult<AssemblyReport> {
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        self.assemble_with(test_id, &mut rng).await
    }

    /// Assemble a test drawing randomness from `rng`.
    pub async fn assemble_with<R: Rng + Send + ?Sized>(
        &self,
        test_id: u64,
        rng: &mut R,
    ) -> StoreResult<AssemblyReport> {
        let test = self
            .taxonomy
            .test(test_id)
            .await?
            .ok_or(CompassError::TestNotFound(test_id))?;

        tracing::info!(test_id, clusters = test.clusters.len(), "assembling test");

        let pools = self.gather_pools(&test).await?;
        let selection = select_questions(&pools, rng);

        let list = MaterializedList {
            test_id,
            version: Uuid::new_v4(),
            generated_at: Utc::now(),
            entries: selection.entries,
        };
        let report = AssemblyReport {
            test_id,
            selected_count: list.len(),
            total_requested: selection.total_requested,
            warnings: selection.warnings,
            version: list.version,
        };
        self.instances.replace_materialized(list).await?;

        tracing::info!(
            test_id,
            selected = report.selected_count,
            requested = report.total_requested,
            warnings = report.warnings.len(),
            "test assembled"
        );
        Ok(report)
    }

    /// Create a test and, when it has clusters attached, assemble it.
    pub async fn on_test_created(
        &self,
        new_test: NewTest,
    ) -> StoreResult<(Test, Option<AssemblyReport>)> {
        let test = self.taxonomy.create_test(new_test).await?;
        if test.clusters.is_empty() {
            return Ok((test, None));
        }
        let report = self.assemble(test.id).await?;
        Ok((test, Some(report)))
    }

    async fn gather_pools(&self, test: &Test) -> StoreResult<Vec<ClusterPool>> {
        let mut pools = Vec::with_capacity(test.clusters.len());
        for quota in &test.clusters {
            let cluster = self
                .taxonomy
                .cluster(quota.cluster_id)
                .await?
                .ok_or(CompassError::ClusterNotFound(quota.cluster_id))?;
            let questions = self.taxonomy.active_cluster_questions(cluster.id).await?;
            pools.push(ClusterPool {
                cluster_id: cluster.id,
                name: cluster.name,
                quota: *quota,
                questions,
            });
        }
        Ok(pools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_bank_str;
    use crate::store::InMemoryStore;
    use std::path::PathBuf;

    fn question(id: u64, category: Category) -> Question {
        Question {
            id,
            construct_id: 1,
            text: format!("question {id}"),
            category,
            order_no: 0,
            is_active: true,
        }
    }

    fn pool(cluster_id: u64, quota: ClusterQuota, questions: Vec<Question>) -> ClusterPool {
        ClusterPool {
            cluster_id,
            name: format!("Cluster {cluster_id}"),
            quota,
            questions,
        }
    }

    fn mixed_pool(cluster_id: u64, quota: ClusterQuota) -> ClusterPool {
        let base = cluster_id * 100;
        let mut questions = Vec::new();
        for i in 0..5 {
            questions.push(question(base + i, Category::Positive));
        }
        for i in 5..8 {
            questions.push(question(base + i, Category::Reverse));
        }
        for i in 8..10 {
            questions.push(question(base + i, Category::SocialDesirabilityBias));
        }
        pool(cluster_id, quota, questions)
    }

    fn assert_order_is_permutation(entries: &[TestQuestion]) {
        let mut orders: Vec<u32> = entries.iter().map(|e| e.order_no).collect();
        orders.sort_unstable();
        let expected: Vec<u32> = (1..=entries.len() as u32).collect();
        assert_eq!(orders, expected);
    }

    #[test]
    fn unrestricted_quota_takes_every_question() {
        let pools = vec![mixed_pool(1, ClusterQuota::unrestricted(1))];
        let selection = select_questions(&pools, &mut StdRng::seed_from_u64(7));
        assert_eq!(selection.entries.len(), 10);
        assert_eq!(selection.total_requested, 10);
        assert!(selection.warnings.is_empty());
        let mut ids: Vec<u64> = selection.entries.iter().map(|e| e.question_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (100..110).collect::<Vec<_>>());
        assert_order_is_permutation(&selection.entries);
    }

    #[test]
    fn quota_takes_exact_counts_per_category() {
        let pools = vec![
            mixed_pool(1, ClusterQuota::new(1, 3, 2, 1)),
            mixed_pool(2, ClusterQuota::new(2, 1, 0, 2)),
        ];
        let selection = select_questions(&pools, &mut StdRng::seed_from_u64(11));
        assert_eq!(selection.entries.len(), 9);
        assert!(selection.warnings.is_empty());

        let count = |cluster: u64, range: std::ops::Range<u64>| {
            selection
                .entries
                .iter()
                .filter(|e| e.cluster_id == cluster && range.contains(&(e.question_id % 100)))
                .count()
        };
        assert_eq!(count(1, 0..5), 3);
        assert_eq!(count(1, 5..8), 2);
        assert_eq!(count(1, 8..10), 1);
        assert_eq!(count(2, 0..5), 1);
        assert_eq!(count(2, 5..8), 0);
        assert_eq!(count(2, 8..10), 2);
        assert_order_is_permutation(&selection.entries);
    }

    #[test]
    fn shortfall_takes_all_and_warns() {
        let pools = vec![mixed_pool(1, ClusterQuota::new(1, 0, 4, 0))];
        let selection = select_questions(&pools, &mut StdRng::seed_from_u64(3));
        assert_eq!(selection.entries.len(), 3);
        assert_eq!(
            selection.warnings,
            vec!["Cluster 'Cluster 1': only 3 R questions available, requested 4"]
        );
    }

    #[test]
    fn all_zero_quota_contributes_nothing() {
        let pools = vec![mixed_pool(1, ClusterQuota::new(1, 0, 0, 0))];
        let selection = select_questions(&pools, &mut StdRng::seed_from_u64(3));
        assert!(selection.entries.is_empty());
        assert_eq!(selection.total_requested, 0);
    }

    #[test]
    fn duplicates_across_clusters_keep_first() {
        let shared = vec![question(1, Category::Positive), question(2, Category::Positive)];
        let pools = vec![
            pool(1, ClusterQuota::unrestricted(1), shared.clone()),
            pool(2, ClusterQuota::unrestricted(2), shared),
        ];
        let selection = select_questions(&pools, &mut StdRng::seed_from_u64(5));
        assert_eq!(selection.total_requested, 4);
        assert_eq!(selection.entries.len(), 2);
        assert!(selection.entries.iter().all(|e| e.cluster_id == 1));
    }

    #[test]
    fn same_seed_same_selection() {
        let pools = vec![mixed_pool(1, ClusterQuota::new(1, 2, 2, 1))];
        let a = select_questions(&pools, &mut StdRng::seed_from_u64(42));
        let b = select_questions(&pools, &mut StdRng::seed_from_u64(42));
        assert_eq!(a.entries, b.entries);
    }

    const BANK: &str = r#"
[bank]
name = "Assembly"

[[clusters]]
id = 1
name = "Drive"

[[clusters.constructs]]
id = 10
name = "Grit"

[[clusters.constructs.questions]]
id = 100
text = "I finish what I start."
category = "P"

[[clusters.constructs.questions]]
id = 101
text = "I keep going after failure."
category = "P"

[[clusters.constructs.questions]]
id = 102
text = "I give up easily."
category = "R"

[[clusters.constructs.questions]]
id = 103
text = "Retired item."
category = "P"
active = false

[[tests]]
id = 1
title = "Drive check"
clusters = [{ cluster_id = 1 }]

[[tests]]
id = 2
title = "Empty"
"#;

    fn store() -> Arc<InMemoryStore> {
        let bank = parse_bank_str(BANK, &PathBuf::from("bank.toml")).unwrap();
        Arc::new(InMemoryStore::from_snapshot(bank.into_snapshot()).unwrap())
    }

    fn assembler(store: &Arc<InMemoryStore>) -> TestAssembler {
        TestAssembler::new(store.clone(), store.clone()).with_seed(Some(9))
    }

    #[tokio::test]
    async fn assemble_stores_active_questions_only() {
        let store = store();
        let report = assembler(&store).assemble(1).await.unwrap();
        assert_eq!(report.selected_count, 3);
        assert_eq!(report.total_requested, 3);

        let list = store.materialized(1).await.unwrap().unwrap();
        assert_eq!(list.version, report.version);
        assert!(!list.contains(103));
        assert_order_is_permutation(&list.entries);
    }

    #[tokio::test]
    async fn regenerate_replaces_previous_list() {
        let store = store();
        let assembler = assembler(&store);
        let first = assembler.assemble(1).await.unwrap();

        store
            .set_cluster_quota(1, ClusterQuota::new(1, 1, 0, 0))
            .await
            .unwrap();
        let second = assembler.assemble(1).await.unwrap();
        assert_ne!(first.version, second.version);

        let list = store.materialized(1).await.unwrap().unwrap();
        assert_eq!(list.version, second.version);
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn no_clusters_assembles_empty() {
        let store = store();
        let report = assembler(&store).assemble(2).await.unwrap();
        assert_eq!(report.selected_count, 0);
        assert_eq!(report.total_requested, 0);
        assert!(report.warnings.is_empty());
        assert!(store.materialized(2).await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_test_is_rejected() {
        let store = store();
        let err = assembler(&store).assemble(99).await.unwrap_err();
        assert!(matches!(err, CompassError::TestNotFound(99)));
    }

    #[tokio::test]
    async fn creating_a_test_with_clusters_assembles_it() {
        let store = store();
        let assembler = assembler(&store);
        let (test, report) = assembler
            .on_test_created(NewTest {
                title: "Fresh".into(),
                description: None,
                is_active: true,
                clusters: vec![ClusterQuota::new(1, 2, 1, 0)],
            })
            .await
            .unwrap();
        assert_eq!(test.id, 3);
        assert_eq!(report.unwrap().selected_count, 3);

        let (bare, report) = assembler
            .on_test_created(NewTest {
                title: "Bare".into(),
                description: None,
                is_active: true,
                clusters: vec![],
            })
            .await
            .unwrap();
        assert!(report.is_none());
        assert!(store.materialized(bare.id).await.unwrap().is_none());
    }
}
