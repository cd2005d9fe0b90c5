use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::exam::Exam;
use crate::model::ids::{OptionId, QuestionId};

/// One answered question as sent to the submission store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: QuestionId,
    pub option_id: OptionId,
}

/// A learner's chosen option per question, built up while taking an exam.
///
/// Choosing again for the same question replaces the earlier choice, so the
/// map always holds at most one option per question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    choices: BTreeMap<QuestionId, OptionId>,
}

impl Submission {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn choose(&mut self, question_id: QuestionId, option_id: OptionId) {
        self.choices.insert(question_id, option_id);
    }

    pub fn clear(&mut self, question_id: QuestionId) {
        self.choices.remove(&question_id);
    }

    #[must_use]
    pub fn choice(&self, question_id: QuestionId) -> Option<OptionId> {
        self.choices.get(&question_id).copied()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.choices.len()
    }

    /// Questions of `exam` that still have no valid choice.
    #[must_use]
    pub fn unanswered(&self, exam: &Exam) -> Vec<QuestionId> {
        exam.questions()
            .iter()
            .filter(|q| !self.choice(q.id).is_some_and(|opt| q.has_option(opt)))
            .map(|q| q.id)
            .collect()
    }

    /// The "all answered" gate: every question of `exam` has exactly one chosen
    /// option that belongs to it.
    #[must_use]
    pub fn is_complete_for(&self, exam: &Exam) -> bool {
        self.unanswered(exam).is_empty()
    }

    /// Answers in exam question order, restricted to the exam's questions.
    #[must_use]
    pub fn answers_for(&self, exam: &Exam) -> Vec<Answer> {
        exam.questions()
            .iter()
            .filter_map(|q| {
                self.choice(q.id).map(|option_id| Answer {
                    question_id: q.id,
                    option_id,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn from_answers(answers: &[Answer]) -> Self {
        let mut submission = Self::new();
        for answer in answers {
            submission.choose(answer.question_id, answer.option_id);
        }
        submission
    }
}
