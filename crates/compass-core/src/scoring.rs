//! Scoring engine.
//!
//! Validates a submission against the test's materialized list, scores each
//! answer with its effective attributes, aggregates construct, cluster and
//! overall scores, and persists the result and its answers in one commit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CompassError;
use crate::model::{
    AggregateScore, Category, Cluster, Construct, Question, ScoreBand, ScoreMap, ScoringRule,
    TestResult, UserAnswer,
};
use crate::traits::{
    NewTestResult, NewUserAnswer, ResultStore, StoreResult, TaxonomyStore, TestInstanceStore,
};

/// Lowest and highest answer on the Likert scale.
pub const MIN_VALUE: u8 = 1;
pub const MAX_VALUE: u8 = 5;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Band a raw 1..5 average: `<= 2` low, `3` medium, anything else high.
///
/// The average is rounded to two places first, so `3.001` is medium while
/// `2.5` falls through to high. Insights use a separate percentage banding.
pub fn band_average(average: f64) -> ScoreBand {
    let average = round2(average);
    if average <= 2.0 {
        ScoreBand::Low
    } else if average == 3.0 {
        ScoreBand::Medium
    } else {
        ScoreBand::High
    }
}

/// How one question is scored once its rule has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveAttributes {
    pub category: Category,
    pub reverse: bool,
    pub weight: f64,
    pub include: bool,
}

impl EffectiveAttributes {
    /// Rule fields win over the question's defaults.
    pub fn resolve(question: &Question, rule: Option<&ScoringRule>) -> Self {
        let category = rule.and_then(|r| r.category).unwrap_or(question.category);
        Self {
            category,
            reverse: rule
                .and_then(|r| r.reverse_score)
                .unwrap_or(category == Category::Reverse),
            weight: rule.and_then(|r| r.weight).unwrap_or(1.0),
            include: rule.and_then(|r| r.include_in_construct).unwrap_or(true),
        }
    }
}

/// Final score of one raw answer.
pub fn score_value(value: u8, reverse: bool, weight: f64) -> f64 {
    let base = if reverse {
        f64::from(MAX_VALUE + MIN_VALUE) - f64::from(value)
    } else {
        f64::from(value)
    };
    round2(base * weight)
}

/// Thresholds of the social desirability check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Raw values at or above this count as "high".
    #[serde(default = "default_sdb_high_value")]
    pub sdb_high_value: u8,
    /// Flag when the share of high SDB answers is strictly above this.
    #[serde(default = "default_sdb_flag_ratio")]
    pub sdb_flag_ratio: f64,
}

fn default_sdb_high_value() -> u8 {
    4
}

fn default_sdb_flag_ratio() -> f64 {
    0.7
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            sdb_high_value: default_sdb_high_value(),
            sdb_flag_ratio: default_sdb_flag_ratio(),
        }
    }
}

/// Whether the raw values of the SDB answers look inflated.
pub fn sdb_flag(values: &[u8], config: &ScoringConfig) -> bool {
    if values.is_empty() {
        return false;
    }
    let high = values
        .iter()
        .filter(|&&v| v >= config.sdb_high_value)
        .count();
    high as f64 > values.len() as f64 * config.sdb_flag_ratio
}

/// One raw answer of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: u64,
    pub value: i64,
}

/// A validated answer with everything needed to aggregate it.
#[derive(Debug, Clone)]
pub struct ScoredAnswer {
    pub question_id: u64,
    pub value: u8,
    pub attributes: EffectiveAttributes,
    pub final_score: f64,
    pub construct_id: u64,
    pub construct: String,
    pub cluster_id: u64,
    pub cluster: String,
}

/// Aggregated scores of one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub total: f64,
    pub average: f64,
    pub category: ScoreBand,
    pub cluster_scores: ScoreMap,
    pub construct_scores: ScoreMap,
    pub sdb_flag: bool,
    /// Answers that counted towards the aggregates.
    pub contributing: usize,
}

#[derive(Default)]
struct Accumulator {
    total: f64,
    count: u32,
}

impl Accumulator {
    fn add(&mut self, score: f64) {
        self.total += score;
        self.count += 1;
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / f64::from(self.count)
        }
    }

    fn finish(&self) -> AggregateScore {
        let average = round2(self.average());
        AggregateScore {
            total: round2(self.total),
            average,
            count: self.count,
            category: band_average(average),
        }
    }
}

/// Score map key of a construct or cluster whose name is shared by another
/// one in the same submission.
pub fn disambiguated_key(name: &str, id: u64) -> String {
    format!("{name} #{id}")
}

/// Groups are accumulated by id and keyed by name; a name shared by several
/// ids gets one `"{name} #{id}"` entry per id instead of a merged one.
fn finish_all(groups: IndexMap<u64, (String, Accumulator)>) -> ScoreMap {
    let mut uses: HashMap<&str, usize> = HashMap::new();
    for (name, _) in groups.values() {
        *uses.entry(name.as_str()).or_default() += 1;
    }
    groups
        .iter()
        .map(|(&id, (name, acc))| {
            let key = if uses[name.as_str()] > 1 {
                disambiguated_key(name, id)
            } else {
                name.clone()
            };
            (key, acc.finish().into())
        })
        .collect()
}

/// Aggregate scored answers into construct, cluster and overall scores.
pub fn compute_scorecard(answers: &[ScoredAnswer], config: &ScoringConfig) -> Scorecard {
    let mut overall = Accumulator::default();
    let mut constructs: IndexMap<u64, (String, Accumulator)> = IndexMap::new();
    let mut clusters: IndexMap<u64, (String, Accumulator)> = IndexMap::new();
    let mut sdb_values = Vec::new();

    for answer in answers {
        if answer.attributes.category == Category::SocialDesirabilityBias {
            sdb_values.push(answer.value);
        }
        if !answer.attributes.include {
            continue;
        }
        overall.add(answer.final_score);
        constructs
            .entry(answer.construct_id)
            .or_insert_with(|| (answer.construct.clone(), Accumulator::default()))
            .1
            .add(answer.final_score);
        clusters
            .entry(answer.cluster_id)
            .or_insert_with(|| (answer.cluster.clone(), Accumulator::default()))
            .1
            .add(answer.final_score);
    }

    let overall = overall.finish();
    Scorecard {
        total: overall.total,
        average: overall.average,
        category: overall.category,
        cluster_scores: finish_all(clusters),
        construct_scores: finish_all(constructs),
        sdb_flag: sdb_flag(&sdb_values, config),
        contributing: overall.count as usize,
    }
}

/// A persisted submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub result: TestResult,
    pub answers: Vec<UserAnswer>,
    pub scorecard: Scorecard,
}

/// Scores submissions and is the only writer of results and answers.
pub struct ScoringEngine {
    taxonomy: Arc<dyn TaxonomyStore>,
    instances: Arc<dyn TestInstanceStore>,
    results: Arc<dyn ResultStore>,
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(
        taxonomy: Arc<dyn TaxonomyStore>,
        instances: Arc<dyn TestInstanceStore>,
        results: Arc<dyn ResultStore>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            taxonomy,
            instances,
            results,
            config,
        }
    }

    /// Validate, score and persist one submission.
    ///
    /// Any invalid answer rejects the whole submission; nothing is stored.
    pub async fn submit(
        &self,
        test_id: u64,
        user_id: u64,
        answers: &[AnswerInput],
    ) -> StoreResult<Submission> {
        let scored = match self.score_answers(test_id, answers).await {
            Ok(scored) => scored,
            Err(e) => {
                tracing::warn!(test_id, user_id, field = e.field(), "submission rejected: {e}");
                return Err(e);
            }
        };

        let scorecard = compute_scorecard(&scored, &self.config);
        let new_result = NewTestResult {
            user_id,
            test_id,
            total_score: scorecard.total,
            average_score: scorecard.average,
            overall_category: scorecard.category,
            cluster_scores: scorecard.cluster_scores.clone(),
            construct_scores: scorecard.construct_scores.clone(),
            sdb_flag: scorecard.sdb_flag,
        };
        let new_answers = scored
            .iter()
            .map(|a| NewUserAnswer {
                question_id: a.question_id,
                answer_value: a.value,
                final_score: a.final_score,
            })
            .collect();

        let (result, answers) = self
            .results
            .commit_submission(new_result, new_answers)
            .await?;

        tracing::info!(
            result_id = result.id,
            test_id,
            user_id,
            average = result.average_score,
            band = %scorecard.category,
            sdb_flag = result.sdb_flag,
            "submission scored"
        );
        Ok(Submission {
            result,
            answers,
            scorecard,
        })
    }

    async fn score_answers(
        &self,
        test_id: u64,
        answers: &[AnswerInput],
    ) -> StoreResult<Vec<ScoredAnswer>> {
        self.taxonomy
            .test(test_id)
            .await?
            .ok_or(CompassError::TestNotFound(test_id))?;
        if answers.is_empty() {
            return Err(CompassError::EmptySubmission);
        }

        let list = self.instances.materialized(test_id).await?;
        let mut seen = HashSet::new();
        for answer in answers {
            if !(i64::from(MIN_VALUE)..=i64::from(MAX_VALUE)).contains(&answer.value) {
                return Err(CompassError::AnswerOutOfRange {
                    question_id: answer.question_id,
                    value: answer.value,
                });
            }
            if !list.as_ref().is_some_and(|l| l.contains(answer.question_id)) {
                return Err(CompassError::QuestionNotInTest {
                    test_id,
                    question_id: answer.question_id,
                });
            }
            if !seen.insert(answer.question_id) {
                return Err(CompassError::DuplicateAnswer(answer.question_id));
            }
        }

        let mut constructs: HashMap<u64, Construct> = HashMap::new();
        let mut clusters: HashMap<u64, Cluster> = HashMap::new();
        let mut scored = Vec::with_capacity(answers.len());

        for answer in answers {
            let question = self
                .taxonomy
                .question(answer.question_id)
                .await?
                .ok_or(CompassError::QuestionNotFound(answer.question_id))?;
            let rule = self.taxonomy.scoring_rule(question.id).await?;

            if !constructs.contains_key(&question.construct_id) {
                let construct = self
                    .taxonomy
                    .construct(question.construct_id)
                    .await?
                    .ok_or(CompassError::ConstructNotFound(question.construct_id))?;
                constructs.insert(construct.id, construct);
            }
            let construct = &constructs[&question.construct_id];

            if !clusters.contains_key(&construct.cluster_id) {
                let cluster = self
                    .taxonomy
                    .cluster(construct.cluster_id)
                    .await?
                    .ok_or(CompassError::ClusterNotFound(construct.cluster_id))?;
                clusters.insert(cluster.id, cluster);
            }
            let cluster = &clusters[&construct.cluster_id];

            // Range checked above.
            let value = answer.value as u8;
            let attributes = EffectiveAttributes::resolve(&question, rule.as_ref());
            scored.push(ScoredAnswer {
                question_id: question.id,
                value,
                attributes,
                final_score: score_value(value, attributes.reverse, attributes.weight),
                construct_id: construct.id,
                construct: construct.name.clone(),
                cluster_id: cluster.id,
                cluster: cluster.name.clone(),
            });
        }

        Ok(scored)
    }
}
