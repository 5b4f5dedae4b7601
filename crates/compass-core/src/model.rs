//! Core data model types for compass.
//!
//! The taxonomy (clusters, constructs, questions), per-question scoring rules,
//! tests with their cluster quotas and materialized question lists, and the
//! write-once results of a test-taking session.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// Top-level trait grouping, e.g. a personality domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub short_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Behaviour typically shown by someone scoring high in this cluster.
    #[serde(default)]
    pub high_behaviour: Option<String>,
    #[serde(default)]
    pub medium_behaviour: Option<String>,
    #[serde(default)]
    pub low_behaviour: Option<String>,
}

/// A specific trait within a cluster, measured by several questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Construct {
    pub id: u64,
    pub cluster_id: u64,
    pub name: String,
    #[serde(default)]
    pub short_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub high_behavior: Option<String>,
    #[serde(default)]
    pub medium_behavior: Option<String>,
    #[serde(default)]
    pub low_behavior: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub risks: Option<String>,
    #[serde(default)]
    pub coaching_applications: Option<String>,
    #[serde(default)]
    pub case_example: Option<String>,
    #[serde(default)]
    pub display_order: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Question category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Higher raw value means more of the trait.
    #[serde(rename = "P")]
    Positive,
    /// Reverse-keyed; scored inverted.
    #[serde(rename = "R")]
    Reverse,
    /// Social desirability bias check item.
    #[serde(rename = "SDB")]
    SocialDesirabilityBias,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Positive,
        Category::Reverse,
        Category::SocialDesirabilityBias,
    ];

    /// Short code used in storage and warnings.
    pub fn code(self) -> &'static str {
        match self {
            Category::Positive => "P",
            Category::Reverse => "R",
            Category::SocialDesirabilityBias => "SDB",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "p" | "positive" => Ok(Category::Positive),
            "r" | "reverse" => Ok(Category::Reverse),
            "sdb" | "social_desirability_bias" | "social-desirability-bias" => {
                Ok(Category::SocialDesirabilityBias)
            }
            other => Err(format!(
                "invalid category: {other}. Must be P, R, or SDB"
            )),
        }
    }
}

/// A single Likert item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub construct_id: u64,
    pub text: String,
    pub category: Category,
    /// Authoring order; unrelated to the shuffled order of a test instance.
    #[serde(default)]
    pub order_no: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Per-question override of the question's scoring defaults.
///
/// Every field is optional; an unset field falls back to the question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub question_id: u64,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub reverse_score: Option<bool>,
    /// Conventionally `false` for SDB items.
    #[serde(default)]
    pub include_in_construct: Option<bool>,
    #[serde(default)]
    pub weight: Option<f64>,
}

// ---------------------------------------------------------------------------
// Tests and their materialized instances
// ---------------------------------------------------------------------------

/// Requested number of questions per category drawn from one cluster.
///
/// All three unset means "every active question of the cluster".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterQuota {
    pub cluster_id: u64,
    #[serde(default)]
    pub p_count: Option<u32>,
    #[serde(default)]
    pub r_count: Option<u32>,
    #[serde(default)]
    pub sdb_count: Option<u32>,
}

impl ClusterQuota {
    /// A quota with no counts set.
    pub fn unrestricted(cluster_id: u64) -> Self {
        Self {
            cluster_id,
            p_count: None,
            r_count: None,
            sdb_count: None,
        }
    }

    pub fn new(cluster_id: u64, p: u32, r: u32, sdb: u32) -> Self {
        Self {
            cluster_id,
            p_count: Some(p),
            r_count: Some(r),
            sdb_count: Some(sdb),
        }
    }

    /// `true` when no category count is set at all.
    pub fn is_unrestricted(&self) -> bool {
        self.p_count.is_none() && self.r_count.is_none() && self.sdb_count.is_none()
    }

    /// Requested count for a category, unset counting as zero.
    pub fn count_for(&self, category: Category) -> u32 {
        match category {
            Category::Positive => self.p_count,
            Category::Reverse => self.r_count,
            Category::SocialDesirabilityBias => self.sdb_count,
        }
        .unwrap_or(0)
    }
}

/// An assessment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Attached clusters with their quotas, in attach order.
    #[serde(default)]
    pub clusters: Vec<ClusterQuota>,
}

impl Test {
    pub fn quota_for(&self, cluster_id: u64) -> Option<&ClusterQuota> {
        self.clusters.iter().find(|q| q.cluster_id == cluster_id)
    }
}

/// One row of a materialized test instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestQuestion {
    pub question_id: u64,
    /// The cluster whose quota selected this question.
    pub cluster_id: u64,
    /// Position in the shuffled test, 1-based.
    pub order_no: u32,
}

/// The concrete, shuffled question list of a test.
///
/// Each assembly produces a new version that replaces the previous one whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedList {
    pub test_id: u64,
    pub version: Uuid,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<TestQuestion>,
}

impl MaterializedList {
    pub fn contains(&self, question_id: u64) -> bool {
        self.entries.iter().any(|e| e.question_id == question_id)
    }

    pub fn order_of(&self, question_id: u64) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.question_id == question_id)
            .map(|e| e.order_no)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Lifecycle of a test result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Completed,
    Reviewed,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Pending => write!(f, "pending"),
            ResultStatus::Completed => write!(f, "completed"),
            ResultStatus::Reviewed => write!(f, "reviewed"),
        }
    }
}

/// Three-way band of a raw 1..5 average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Low,
    Medium,
    High,
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreBand::Low => write!(f, "low"),
            ScoreBand::Medium => write!(f, "medium"),
            ScoreBand::High => write!(f, "high"),
        }
    }
}

/// Aggregate of one construct or cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateScore {
    pub total: f64,
    pub average: f64,
    pub count: u32,
    pub category: ScoreBand,
}

/// A persisted construct/cluster score.
///
/// Current rows hold the full aggregate. Older rows may only carry an
/// average, a total with a count, or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredScore {
    Aggregate(AggregateScore),
    Partial(PartialScore),
    Flat(f64),
}

/// Legacy object shape with some aggregate fields missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl StoredScore {
    /// The average, derived from total/count when it was not stored.
    pub fn average(&self) -> f64 {
        match self {
            StoredScore::Aggregate(a) => a.average,
            StoredScore::Partial(p) => match (p.average, p.total, p.count) {
                (Some(avg), _, _) => avg,
                (None, Some(total), Some(count)) if count > 0 => total / f64::from(count),
                _ => 0.0,
            },
            StoredScore::Flat(v) => *v,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregateScore> {
        match self {
            StoredScore::Aggregate(a) => Some(a),
            _ => None,
        }
    }
}

impl From<AggregateScore> for StoredScore {
    fn from(score: AggregateScore) -> Self {
        StoredScore::Aggregate(score)
    }
}

/// Name-keyed scores, in first-seen order.
pub type ScoreMap = IndexMap<String, StoredScore>;

/// The scored outcome of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: u64,
    pub user_id: u64,
    pub test_id: u64,
    pub status: ResultStatus,
    pub total_score: f64,
    pub average_score: f64,
    /// Missing on rows written before the band was stored.
    #[serde(default)]
    pub overall_category: Option<ScoreBand>,
    #[serde(default)]
    pub cluster_scores: ScoreMap,
    #[serde(default)]
    pub construct_scores: ScoreMap,
    #[serde(default)]
    pub sdb_flag: bool,
    #[serde(default)]
    pub expert_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl TestResult {
    /// The stored overall band, or one derived from the average.
    pub fn overall_band(&self) -> ScoreBand {
        self.overall_category
            .unwrap_or_else(|| crate::scoring::band_average(self.average_score))
    }
}

/// One answered question of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAnswer {
    pub id: u64,
    pub test_result_id: u64,
    pub question_id: u64,
    /// Raw Likert value, 1..=5.
    pub answer_value: u8,
    /// Adjusted for reverse keying and weight.
    pub final_score: f64,
}

/// Narrative report attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub id: u64,
    pub test_result_id: u64,
    #[serde(default)]
    pub report_summary: Option<String>,
    #[serde(default)]
    pub recommendations: Option<String>,
    /// Path of the last rendered artifact.
    #[serde(default)]
    pub report_file: Option<String>,
    #[serde(default)]
    pub radar_data: Option<serde_json::Value>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Answer options
// ---------------------------------------------------------------------------

/// One point of the answer scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub value: u8,
    pub label: &'static str,
}

/// The five-point scale shared by every question.
pub const LIKERT_OPTIONS: [AnswerOption; 5] = [
    AnswerOption {
        value: 1,
        label: "Strongly Disagree",
    },
    AnswerOption {
        value: 2,
        label: "Disagree",
    },
    AnswerOption {
        value: 3,
        label: "Neutral",
    },
    AnswerOption {
        value: 4,
        label: "Agree",
    },
    AnswerOption {
        value: 5,
        label: "Strongly Agree",
    },
];

/// Label of a raw answer value.
pub fn option_label(value: u8) -> Option<&'static str> {
    LIKERT_OPTIONS
        .iter()
        .find(|o| o.value == value)
        .map(|o| o.label)
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_display_and_parse() {
        assert_eq!(Category::Positive.to_string(), "P");
        assert_eq!(Category::SocialDesirabilityBias.to_string(), "SDB");
        assert_eq!("r".parse::<Category>().unwrap(), Category::Reverse);
        assert_eq!(" sdb ".parse::<Category>().unwrap(), Category::SocialDesirabilityBias);
        assert_eq!("Positive".parse::<Category>().unwrap(), Category::Positive);
        assert!("X".parse::<Category>().is_err());
    }

    #[test]
    fn category_serializes_as_code() {
        let json = serde_json::to_string(&Category::SocialDesirabilityBias).unwrap();
        assert_eq!(json, "\"SDB\"");
        let back: Category = serde_json::from_str("\"R\"").unwrap();
        assert_eq!(back, Category::Reverse);
    }

    #[test]
    fn quota_unset_counts_as_zero() {
        let quota = ClusterQuota {
            cluster_id: 1,
            p_count: Some(3),
            r_count: None,
            sdb_count: None,
        };
        assert!(!quota.is_unrestricted());
        assert_eq!(quota.count_for(Category::Positive), 3);
        assert_eq!(quota.count_for(Category::Reverse), 0);
        assert!(ClusterQuota::unrestricted(1).is_unrestricted());
    }

    #[test]
    fn stored_score_reads_every_shape() {
        let map: ScoreMap = serde_json::from_str(
            r#"{
                "Drive": {"total": 8.0, "average": 4.0, "count": 2, "category": "high"},
                "Care": {"average": 3.5},
                "Focus": {"total": 9.0, "count": 3},
                "Legacy": 2.75
            }"#,
        )
        .unwrap();
        assert!(matches!(map["Drive"], StoredScore::Aggregate(_)));
        assert_eq!(map["Care"].average(), 3.5);
        assert_eq!(map["Focus"].average(), 3.0);
        assert_eq!(map["Legacy"].average(), 2.75);
        let order: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["Drive", "Care", "Focus", "Legacy"]);
    }

    #[test]
    fn aggregate_score_map_roundtrip() {
        let mut map = ScoreMap::new();
        map.insert(
            "Caring & Connection".into(),
            AggregateScore {
                total: 12.5,
                average: 4.17,
                count: 3,
                category: ScoreBand::High,
            }
            .into(),
        );
        let json = serde_json::to_string(&map).unwrap();
        let back: ScoreMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
        let agg = back["Caring & Connection"].as_aggregate().unwrap();
        assert_eq!(agg.average, 4.17);
        assert_eq!(agg.count, 3);
        assert_eq!(agg.category, ScoreBand::High);
    }

    #[test]
    fn option_labels() {
        assert_eq!(option_label(1), Some("Strongly Disagree"));
        assert_eq!(option_label(5), Some("Strongly Agree"));
        assert_eq!(option_label(0), None);
    }
}
