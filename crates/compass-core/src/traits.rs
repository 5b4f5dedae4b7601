//! Store traits the engines read and write through.
//!
//! Persistence is out of scope for the engines: they only see these async
//! traits. [`InMemoryStore`](crate::store::InMemoryStore) implements all three.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompassError;
use crate::model::{
    Category, Cluster, ClusterQuota, Construct, MaterializedList, Question, ScoreBand, ScoreMap,
    ScoringRule, Test, TestReport, TestResult, UserAnswer,
};

pub type StoreResult<T> = Result<T, CompassError>;

// ---------------------------------------------------------------------------
// Taxonomy and question pool
// ---------------------------------------------------------------------------

/// Read access to the taxonomy, question pool and scoring rules, plus the
/// test/cluster join.
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    async fn test(&self, test_id: u64) -> StoreResult<Option<Test>>;

    async fn cluster(&self, cluster_id: u64) -> StoreResult<Option<Cluster>>;

    /// Every cluster, by id.
    async fn clusters(&self) -> StoreResult<Vec<Cluster>>;

    async fn construct(&self, construct_id: u64) -> StoreResult<Option<Construct>>;

    async fn question(&self, question_id: u64) -> StoreResult<Option<Question>>;

    /// Constructs of a cluster ordered by display order, then id.
    async fn constructs_in_cluster(&self, cluster_id: u64) -> StoreResult<Vec<Construct>>;

    /// Active questions of a construct, optionally restricted to a category.
    async fn active_questions(
        &self,
        construct_id: u64,
        category: Option<Category>,
    ) -> StoreResult<Vec<Question>>;

    async fn scoring_rule(&self, question_id: u64) -> StoreResult<Option<ScoringRule>>;

    /// Create a test with its initial cluster quotas.
    async fn create_test(&self, new_test: NewTest) -> StoreResult<Test>;

    /// Attach a cluster. Already attached clusters are left as they are.
    async fn attach_cluster(&self, test_id: u64, quota: ClusterQuota) -> StoreResult<Test>;

    /// Overwrite the quota of an attached cluster.
    async fn set_cluster_quota(&self, test_id: u64, quota: ClusterQuota) -> StoreResult<Test>;

    async fn detach_clusters(&self, test_id: u64, cluster_ids: &[u64]) -> StoreResult<Test>;

    /// Quota of one (test, cluster) pair.
    async fn quota(&self, test_id: u64, cluster_id: u64) -> StoreResult<Option<ClusterQuota>> {
        Ok(self
            .test(test_id)
            .await?
            .and_then(|t| t.quota_for(cluster_id).copied()))
    }

    /// Every active question reachable from a cluster, construct by construct.
    async fn active_cluster_questions(&self, cluster_id: u64) -> StoreResult<Vec<Question>> {
        let mut questions = Vec::new();
        for construct in self.constructs_in_cluster(cluster_id).await? {
            questions.extend(self.active_questions(construct.id, None).await?);
        }
        Ok(questions)
    }
}

/// Input for [`TaxonomyStore::create_test`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub clusters: Vec<ClusterQuota>,
}

// ---------------------------------------------------------------------------
// Materialized test instances
// ---------------------------------------------------------------------------

/// Storage of each test's current materialized question list.
#[async_trait]
pub trait TestInstanceStore: Send + Sync {
    async fn materialized(&self, test_id: u64) -> StoreResult<Option<MaterializedList>>;

    /// Swap in a new list. Readers see either the old list or the new one,
    /// never an empty intermediate.
    async fn replace_materialized(&self, list: MaterializedList) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// Results and reports
// ---------------------------------------------------------------------------

/// Storage of submissions, their answers and reports.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist a result and all of its answers in one transaction.
    ///
    /// A duplicate question in `answers` aborts the whole commit.
    async fn commit_submission(
        &self,
        result: NewTestResult,
        answers: Vec<NewUserAnswer>,
    ) -> StoreResult<(TestResult, Vec<UserAnswer>)>;

    async fn result(&self, result_id: u64) -> StoreResult<Option<TestResult>>;

    /// Results of a user, newest first.
    async fn results_for_user(&self, user_id: u64) -> StoreResult<Vec<TestResult>>;

    /// Results of a test, newest first.
    async fn results_for_test(&self, test_id: u64) -> StoreResult<Vec<TestResult>>;

    async fn answers(&self, result_id: u64) -> StoreResult<Vec<UserAnswer>>;

    /// Mark a result reviewed by an expert.
    async fn mark_reviewed(&self, result_id: u64, expert_id: u64) -> StoreResult<TestResult>;

    async fn report_for_result(&self, result_id: u64) -> StoreResult<Option<TestReport>>;

    /// Create the (empty) report of a result.
    async fn create_report(&self, result_id: u64) -> StoreResult<TestReport>;

    async fn update_report(&self, report: TestReport) -> StoreResult<TestReport>;
}

/// Scores of a submission about to be persisted.
#[derive(Debug, Clone)]
pub struct NewTestResult {
    pub user_id: u64,
    pub test_id: u64,
    pub total_score: f64,
    pub average_score: f64,
    pub overall_category: ScoreBand,
    pub cluster_scores: ScoreMap,
    pub construct_scores: ScoreMap,
    pub sdb_flag: bool,
}

/// One scored answer about to be persisted.
#[derive(Debug, Clone, Copy)]
pub struct NewUserAnswer {
    pub question_id: u64,
    pub answer_value: u8,
    pub final_score: f64,
}

fn default_true() -> bool {
    true
}
