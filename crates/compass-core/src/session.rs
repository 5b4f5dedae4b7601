//! Test-taking views: the question sheet handed to a user and the answered
//! sheet shown with a result.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::CompassError;
use crate::model::{option_label, AnswerOption, LIKERT_OPTIONS};
use crate::traits::{ResultStore, StoreResult, TaxonomyStore, TestInstanceStore};

/// A question as presented to a test taker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionQuestion {
    pub order_no: u32,
    pub question_id: u64,
    pub text: String,
    pub construct: String,
    pub cluster: String,
}

/// Everything needed to take a test.
#[derive(Debug, Clone, Serialize)]
pub struct TestSession {
    pub test_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<SessionQuestion>,
    pub options: Vec<AnswerOption>,
}

/// Names of a question's construct and cluster, cached per construct.
struct NameCache<'a> {
    taxonomy: &'a dyn TaxonomyStore,
    constructs: HashMap<u64, (String, String)>,
}

impl<'a> NameCache<'a> {
    fn new(taxonomy: &'a dyn TaxonomyStore) -> Self {
        Self {
            taxonomy,
            constructs: HashMap::new(),
        }
    }

    async fn names(&mut self, construct_id: u64) -> StoreResult<(String, String)> {
        if let Some(names) = self.constructs.get(&construct_id) {
            return Ok(names.clone());
        }
        let construct = self
            .taxonomy
            .construct(construct_id)
            .await?
            .ok_or(CompassError::ConstructNotFound(construct_id))?;
        let cluster = self
            .taxonomy
            .cluster(construct.cluster_id)
            .await?
            .ok_or(CompassError::ClusterNotFound(construct.cluster_id))?;
        let names = (construct.name, cluster.name);
        self.constructs.insert(construct_id, names.clone());
        Ok(names)
    }
}

/// The materialized questions of an active test in `order_no` order, plus the
/// answer scale.
pub async fn take_test(
    taxonomy: &dyn TaxonomyStore,
    instances: &dyn TestInstanceStore,
    test_id: u64,
) -> StoreResult<TestSession> {
    let test = taxonomy
        .test(test_id)
        .await?
        .ok_or(CompassError::TestNotFound(test_id))?;
    if !test.is_active {
        return Err(CompassError::TestInactive(test_id));
    }

    let mut entries = instances
        .materialized(test_id)
        .await?
        .map(|l| l.entries)
        .unwrap_or_default();
    entries.sort_by_key(|e| e.order_no);

    let mut names = NameCache::new(taxonomy);
    let mut questions = Vec::with_capacity(entries.len());
    for entry in entries {
        let question = taxonomy
            .question(entry.question_id)
            .await?
            .ok_or(CompassError::QuestionNotFound(entry.question_id))?;
        let (construct, cluster) = names.names(question.construct_id).await?;
        questions.push(SessionQuestion {
            order_no: entry.order_no,
            question_id: question.id,
            text: question.text,
            construct,
            cluster,
        });
    }

    Ok(TestSession {
        test_id,
        title: test.title,
        description: test.description,
        questions,
        options: LIKERT_OPTIONS.to_vec(),
    })
}

/// One stored answer joined with its question and option label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnsweredQuestion {
    /// Position in the test's current list; `None` once regenerated away.
    pub order_no: Option<u32>,
    pub question_id: u64,
    pub text: String,
    pub construct: String,
    pub cluster: String,
    pub answer_value: u8,
    pub label: Option<&'static str>,
    pub final_score: f64,
}

/// Answers of a result ordered by the test's `order_no`.
pub async fn answers_for_result(
    taxonomy: &dyn TaxonomyStore,
    instances: &dyn TestInstanceStore,
    results: &dyn ResultStore,
    result_id: u64,
) -> StoreResult<Vec<AnsweredQuestion>> {
    let result = results
        .result(result_id)
        .await?
        .ok_or(CompassError::ResultNotFound(result_id))?;
    let list = instances.materialized(result.test_id).await?;

    let mut names = NameCache::new(taxonomy);
    let mut answered = Vec::new();
    for answer in results.answers(result_id).await? {
        let question = taxonomy
            .question(answer.question_id)
            .await?
            .ok_or(CompassError::QuestionNotFound(answer.question_id))?;
        let (construct, cluster) = names.names(question.construct_id).await?;
        answered.push(AnsweredQuestion {
            order_no: list.as_ref().and_then(|l| l.order_of(question.id)),
            question_id: question.id,
            text: question.text,
            construct,
            cluster,
            answer_value: answer.answer_value,
            label: option_label(answer.answer_value),
            final_score: answer.final_score,
        });
    }
    answered.sort_by_key(|a| (a.order_no.unwrap_or(u32::MAX), a.question_id));
    Ok(answered)
}
