//! Engine error types.
//!
//! Every rejection the assembler, scoring engine or store can produce. Shortfall
//! while assembling is not an error: it is reported as a warning on the
//! [`AssemblyReport`](crate::assembler::AssemblyReport).

use thiserror::Error;

/// Errors raised by the compass engines and stores.
#[derive(Debug, Error)]
pub enum CompassError {
    /// No test with this id exists.
    #[error("test not found: {0}")]
    TestNotFound(u64),

    /// The test exists but is switched off.
    #[error("test {0} is not active")]
    TestInactive(u64),

    /// No cluster with this id exists.
    #[error("cluster not found: {0}")]
    ClusterNotFound(u64),

    /// No construct with this id exists.
    #[error("construct not found: {0}")]
    ConstructNotFound(u64),

    /// No question with this id exists.
    #[error("question not found: {0}")]
    QuestionNotFound(u64),

    /// No test result with this id exists.
    #[error("test result not found: {0}")]
    ResultNotFound(u64),

    /// A quota was set for a cluster that is not attached to the test.
    #[error("cluster {cluster_id} is not attached to test {test_id}")]
    ClusterNotAttached { test_id: u64, cluster_id: u64 },

    /// A quota list is malformed (e.g. the same cluster listed twice).
    #[error("invalid quota for cluster {cluster_id}: {message}")]
    InvalidQuota { cluster_id: u64, message: String },

    /// Two rows of the same kind share an id.
    #[error("duplicate {kind} ID: {id}")]
    DuplicateId { kind: &'static str, id: u64 },

    /// The submission carried no answers at all.
    #[error("submission contains no answers")]
    EmptySubmission,

    /// An answer value outside the 1..=5 Likert range.
    #[error("answer value {value} for question {question_id} is out of range 1..=5")]
    AnswerOutOfRange { question_id: u64, value: i64 },

    /// The answered question is not in the test's materialized list.
    #[error("the question ID {question_id} is not part of test {test_id}")]
    QuestionNotInTest { test_id: u64, question_id: u64 },

    /// The same question was answered more than once in one submission.
    #[error("question {0} answered more than once")]
    DuplicateAnswer(u64),

    /// The backing store failed; the operation was rolled back.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CompassError {
    /// The request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            CompassError::TestNotFound(_) | CompassError::TestInactive(_) => "test_id",
            CompassError::ClusterNotFound(_)
            | CompassError::ClusterNotAttached { .. }
            | CompassError::InvalidQuota { .. } => "cluster_id",
            CompassError::ConstructNotFound(_) => "construct_id",
            CompassError::QuestionNotFound(_)
            | CompassError::QuestionNotInTest { .. }
            | CompassError::DuplicateAnswer(_) => "answers.*.question_id",
            CompassError::ResultNotFound(_) => "test_result_id",
            CompassError::DuplicateId { .. } => "id",
            CompassError::EmptySubmission => "answers",
            CompassError::AnswerOutOfRange { .. } => "answers.*.answer_value",
            CompassError::Storage(_) => "storage",
        }
    }

    /// Returns `true` for malformed input or unknown references.
    pub fn is_validation(&self) -> bool {
        !self.is_consistency() && !matches!(self, CompassError::Storage(_))
    }

    /// Returns `true` when the submission contradicts the test instance.
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            CompassError::QuestionNotInTest { .. } | CompassError::DuplicateAnswer(_)
        )
    }
}
