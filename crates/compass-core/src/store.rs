//! In-memory store with JSON snapshot persistence.
//!
//! Every trait operation takes the state lock once and validates before it
//! mutates, so each call is all-or-nothing.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CompassError;
use crate::model::{
    Category, Cluster, ClusterQuota, Construct, MaterializedList, Question, ResultStatus,
    ScoringRule, Test, TestReport, TestResult, UserAnswer,
};
use crate::traits::{
    NewTest, NewTestResult, NewUserAnswer, ResultStore, StoreResult, TaxonomyStore,
    TestInstanceStore,
};

/// Serializable image of a whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub constructs: Vec<Construct>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub scoring_rules: Vec<ScoringRule>,
    #[serde(default)]
    pub tests: Vec<Test>,
    #[serde(default)]
    pub materialized: Vec<MaterializedList>,
    #[serde(default)]
    pub results: Vec<TestResult>,
    #[serde(default)]
    pub answers: Vec<UserAnswer>,
    #[serde(default)]
    pub reports: Vec<TestReport>,
}

impl Snapshot {
    /// Save the snapshot as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize state")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write state to {}", path.display()))?;
        Ok(())
    }

    /// Load a snapshot from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state from {}", path.display()))?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).context("failed to parse state JSON")?;
        Ok(snapshot)
    }
}

#[derive(Debug, Default)]
struct State {
    clusters: BTreeMap<u64, Cluster>,
    constructs: BTreeMap<u64, Construct>,
    questions: BTreeMap<u64, Question>,
    rules: BTreeMap<u64, ScoringRule>,
    tests: BTreeMap<u64, Test>,
    materialized: BTreeMap<u64, MaterializedList>,
    results: BTreeMap<u64, TestResult>,
    answers: BTreeMap<u64, UserAnswer>,
    reports: BTreeMap<u64, TestReport>,
}

fn next_id<V>(map: &BTreeMap<u64, V>) -> u64 {
    map.keys().next_back().map_or(1, |k| k + 1)
}

/// Later rows never shadow earlier ones.
fn insert_unique<V>(
    map: &mut BTreeMap<u64, V>,
    kind: &'static str,
    id: u64,
    value: V,
) -> Result<(), CompassError> {
    if map.contains_key(&id) {
        return Err(CompassError::DuplicateId { kind, id });
    }
    map.insert(id, value);
    Ok(())
}

impl State {
    fn from_snapshot(snapshot: Snapshot) -> Result<Self, CompassError> {
        let mut state = State::default();
        for c in snapshot.clusters {
            insert_unique(&mut state.clusters, "cluster", c.id, c)?;
        }
        for c in snapshot.constructs {
            if !state.clusters.contains_key(&c.cluster_id) {
                return Err(CompassError::ClusterNotFound(c.cluster_id));
            }
            insert_unique(&mut state.constructs, "construct", c.id, c)?;
        }
        for q in snapshot.questions {
            if !state.constructs.contains_key(&q.construct_id) {
                return Err(CompassError::ConstructNotFound(q.construct_id));
            }
            insert_unique(&mut state.questions, "question", q.id, q)?;
        }
        for r in snapshot.scoring_rules {
            if !state.questions.contains_key(&r.question_id) {
                return Err(CompassError::QuestionNotFound(r.question_id));
            }
            insert_unique(&mut state.rules, "scoring rule", r.question_id, r)?;
        }
        for t in snapshot.tests {
            state.check_quotas(&t.clusters)?;
            insert_unique(&mut state.tests, "test", t.id, t)?;
        }
        for m in snapshot.materialized {
            if !state.tests.contains_key(&m.test_id) {
                return Err(CompassError::TestNotFound(m.test_id));
            }
            insert_unique(&mut state.materialized, "materialized list", m.test_id, m)?;
        }
        for r in snapshot.results {
            insert_unique(&mut state.results, "test result", r.id, r)?;
        }
        for a in snapshot.answers {
            if !state.results.contains_key(&a.test_result_id) {
                return Err(CompassError::ResultNotFound(a.test_result_id));
            }
            insert_unique(&mut state.answers, "answer", a.id, a)?;
        }
        for r in snapshot.reports {
            insert_unique(&mut state.reports, "report", r.id, r)?;
        }
        Ok(state)
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            clusters: self.clusters.values().cloned().collect(),
            constructs: self.constructs.values().cloned().collect(),
            questions: self.questions.values().cloned().collect(),
            scoring_rules: self.rules.values().cloned().collect(),
            tests: self.tests.values().cloned().collect(),
            materialized: self.materialized.values().cloned().collect(),
            results: self.results.values().cloned().collect(),
            answers: self.answers.values().cloned().collect(),
            reports: self.reports.values().cloned().collect(),
        }
    }

    fn check_quotas(&self, quotas: &[ClusterQuota]) -> Result<(), CompassError> {
        let mut seen = HashSet::new();
        for q in quotas {
            if !self.clusters.contains_key(&q.cluster_id) {
                return Err(CompassError::ClusterNotFound(q.cluster_id));
            }
            if !seen.insert(q.cluster_id) {
                return Err(CompassError::InvalidQuota {
                    cluster_id: q.cluster_id,
                    message: "cluster listed more than once".into(),
                });
            }
        }
        Ok(())
    }

    fn test_mut(&mut self, test_id: u64) -> Result<&mut Test, CompassError> {
        self.tests
            .get_mut(&test_id)
            .ok_or(CompassError::TestNotFound(test_id))
    }

    fn sorted_results(&self, keep: impl Fn(&TestResult) -> bool) -> Vec<TestResult> {
        let mut results: Vec<TestResult> =
            self.results.values().filter(|r| keep(r)).cloned().collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        results
    }
}

/// A store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot, rejecting dangling references.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, CompassError> {
        Ok(Self {
            state: RwLock::new(State::from_snapshot(snapshot)?),
        })
    }

    /// Copy the current state out.
    pub fn snapshot(&self) -> Result<Snapshot, CompassError> {
        Ok(self.read()?.to_snapshot())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, CompassError> {
        self.state
            .read()
            .map_err(|_| CompassError::Storage("state lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, CompassError> {
        self.state
            .write()
            .map_err(|_| CompassError::Storage("state lock poisoned".into()))
    }
}

#[async_trait]
impl TaxonomyStore for InMemoryStore {
    async fn test(&self, test_id: u64) -> StoreResult<Option<Test>> {
        Ok(self.read()?.tests.get(&test_id).cloned())
    }

    async fn cluster(&self, cluster_id: u64) -> StoreResult<Option<Cluster>> {
        Ok(self.read()?.clusters.get(&cluster_id).cloned())
    }

    async fn clusters(&self) -> StoreResult<Vec<Cluster>> {
        Ok(self.read()?.clusters.values().cloned().collect())
    }

    async fn construct(&self, construct_id: u64) -> StoreResult<Option<Construct>> {
        Ok(self.read()?.constructs.get(&construct_id).cloned())
    }

    async fn question(&self, question_id: u64) -> StoreResult<Option<Question>> {
        Ok(self.read()?.questions.get(&question_id).cloned())
    }

    async fn constructs_in_cluster(&self, cluster_id: u64) -> StoreResult<Vec<Construct>> {
        let state = self.read()?;
        let mut constructs: Vec<Construct> = state
            .constructs
            .values()
            .filter(|c| c.cluster_id == cluster_id)
            .cloned()
            .collect();
        constructs.sort_by_key(|c| (c.display_order.unwrap_or(i32::MAX), c.id));
        Ok(constructs)
    }

    async fn active_questions(
        &self,
        construct_id: u64,
        category: Option<Category>,
    ) -> StoreResult<Vec<Question>> {
        Ok(self
            .read()?
            .questions
            .values()
            .filter(|q| q.construct_id == construct_id && q.is_active)
            .filter(|q| category.map_or(true, |c| q.category == c))
            .cloned()
            .collect())
    }

    async fn scoring_rule(&self, question_id: u64) -> StoreResult<Option<ScoringRule>> {
        Ok(self.read()?.rules.get(&question_id).cloned())
    }

    async fn create_test(&self, new_test: NewTest) -> StoreResult<Test> {
        let mut state = self.write()?;
        state.check_quotas(&new_test.clusters)?;
        let test = Test {
            id: next_id(&state.tests),
            title: new_test.title,
            description: new_test.description,
            is_active: new_test.is_active,
            clusters: new_test.clusters,
        };
        state.tests.insert(test.id, test.clone());
        Ok(test)
    }

    async fn attach_cluster(&self, test_id: u64, quota: ClusterQuota) -> StoreResult<Test> {
        let mut state = self.write()?;
        if !state.clusters.contains_key(&quota.cluster_id) {
            return Err(CompassError::ClusterNotFound(quota.cluster_id));
        }
        let test = state.test_mut(test_id)?;
        if test.quota_for(quota.cluster_id).is_none() {
            test.clusters.push(quota);
        }
        Ok(test.clone())
    }

    async fn set_cluster_quota(&self, test_id: u64, quota: ClusterQuota) -> StoreResult<Test> {
        let mut state = self.write()?;
        if !state.clusters.contains_key(&quota.cluster_id) {
            return Err(CompassError::ClusterNotFound(quota.cluster_id));
        }
        let test = state.test_mut(test_id)?;
        let slot = test
            .clusters
            .iter_mut()
            .find(|q| q.cluster_id == quota.cluster_id)
            .ok_or(CompassError::ClusterNotAttached {
                test_id,
                cluster_id: quota.cluster_id,
            })?;
        *slot = quota;
        Ok(test.clone())
    }

    async fn detach_clusters(&self, test_id: u64, cluster_ids: &[u64]) -> StoreResult<Test> {
        let mut state = self.write()?;
        let test = state.test_mut(test_id)?;
        test.clusters.retain(|q| !cluster_ids.contains(&q.cluster_id));
        Ok(test.clone())
    }
}

#[async_trait]
impl TestInstanceStore for InMemoryStore {
    async fn materialized(&self, test_id: u64) -> StoreResult<Option<MaterializedList>> {
        Ok(self.read()?.materialized.get(&test_id).cloned())
    }

    async fn replace_materialized(&self, list: MaterializedList) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.tests.contains_key(&list.test_id) {
            return Err(CompassError::TestNotFound(list.test_id));
        }
        state.materialized.insert(list.test_id, list);
        Ok(())
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn commit_submission(
        &self,
        result: NewTestResult,
        answers: Vec<NewUserAnswer>,
    ) -> StoreResult<(TestResult, Vec<UserAnswer>)> {
        let mut state = self.write()?;
        if !state.tests.contains_key(&result.test_id) {
            return Err(CompassError::TestNotFound(result.test_id));
        }
        let mut seen = HashSet::new();
        for a in &answers {
            if !seen.insert(a.question_id) {
                return Err(CompassError::DuplicateAnswer(a.question_id));
            }
            if !state.questions.contains_key(&a.question_id) {
                return Err(CompassError::QuestionNotFound(a.question_id));
            }
        }

        let stored = TestResult {
            id: next_id(&state.results),
            user_id: result.user_id,
            test_id: result.test_id,
            status: ResultStatus::Completed,
            total_score: result.total_score,
            average_score: result.average_score,
            overall_category: Some(result.overall_category),
            cluster_scores: result.cluster_scores,
            construct_scores: result.construct_scores,
            sdb_flag: result.sdb_flag,
            expert_id: None,
            created_at: Utc::now(),
        };
        let first_answer_id = next_id(&state.answers);
        let stored_answers: Vec<UserAnswer> = answers
            .into_iter()
            .enumerate()
            .map(|(i, a)| UserAnswer {
                id: first_answer_id + i as u64,
                test_result_id: stored.id,
                question_id: a.question_id,
                answer_value: a.answer_value,
                final_score: a.final_score,
            })
            .collect();

        state.results.insert(stored.id, stored.clone());
        for a in &stored_answers {
            state.answers.insert(a.id, a.clone());
        }
        Ok((stored, stored_answers))
    }

    async fn result(&self, result_id: u64) -> StoreResult<Option<TestResult>> {
        Ok(self.read()?.results.get(&result_id).cloned())
    }

    async fn results_for_user(&self, user_id: u64) -> StoreResult<Vec<TestResult>> {
        Ok(self.read()?.sorted_results(|r| r.user_id == user_id))
    }

    async fn results_for_test(&self, test_id: u64) -> StoreResult<Vec<TestResult>> {
        Ok(self.read()?.sorted_results(|r| r.test_id == test_id))
    }

    async fn answers(&self, result_id: u64) -> StoreResult<Vec<UserAnswer>> {
        Ok(self
            .read()?
            .answers
            .values()
            .filter(|a| a.test_result_id == result_id)
            .cloned()
            .collect())
    }

    async fn mark_reviewed(&self, result_id: u64, expert_id: u64) -> StoreResult<TestResult> {
        let mut state = self.write()?;
        let result = state
            .results
            .get_mut(&result_id)
            .ok_or(CompassError::ResultNotFound(result_id))?;
        result.status = ResultStatus::Reviewed;
        result.expert_id = Some(expert_id);
        Ok(result.clone())
    }

    async fn report_for_result(&self, result_id: u64) -> StoreResult<Option<TestReport>> {
        Ok(self
            .read()?
            .reports
            .values()
            .find(|r| r.test_result_id == result_id)
            .cloned())
    }

    async fn create_report(&self, result_id: u64) -> StoreResult<TestReport> {
        let mut state = self.write()?;
        if !state.results.contains_key(&result_id) {
            return Err(CompassError::ResultNotFound(result_id));
        }
        if let Some(existing) = state
            .reports
            .values()
            .find(|r| r.test_result_id == result_id)
        {
            return Ok(existing.clone());
        }
        let report = TestReport {
            id: next_id(&state.reports),
            test_result_id: result_id,
            report_summary: None,
            recommendations: None,
            report_file: None,
            radar_data: None,
            generated_at: Some(Utc::now()),
        };
        state.reports.insert(report.id, report.clone());
        Ok(report)
    }

    async fn update_report(&self, report: TestReport) -> StoreResult<TestReport> {
        let mut state = self.write()?;
        if !state.reports.contains_key(&report.id) {
            return Err(CompassError::Storage(format!(
                "report {} does not exist",
                report.id
            )));
        }
        state.reports.insert(report.id, report.clone());
        Ok(report)
    }
}
