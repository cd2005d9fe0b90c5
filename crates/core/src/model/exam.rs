use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExamId, ModuleId, OptionId, QuestionId};

//
// ─── QUESTION KIND ─────────────────────────────────────────────────────────────
//

/// Fixed label of the affirmative option of a true/false question.
pub const TRUE_LABEL: &str = "Verdadero";
/// Fixed label of the negative option of a true/false question.
pub const FALSE_LABEL: &str = "Falso";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::TrueFalse => "true_false",
        }
    }

    /// Parses the persisted representation.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::UnknownQuestionKind` for any other value.
    pub fn parse(value: &str) -> Result<Self, ExamError> {
        match value {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "true_false" => Ok(Self::TrueFalse),
            other => Err(ExamError::UnknownQuestionKind(other.to_owned())),
        }
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("unknown question kind: {0}")]
    UnknownQuestionKind(String),

    #[error("question {question} has {count} options")]
    InvalidOptionCount { question: QuestionId, count: usize },
}

//
// ─── PERSISTED EXAM ────────────────────────────────────────────────────────────
//

/// An answer choice as stored by the exam store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// Returns true when `option_id` is one of the options marked correct.
    #[must_use]
    pub fn is_correct_choice(&self, option_id: OptionId) -> bool {
        self.options
            .iter()
            .any(|option| option.id == option_id && option.is_correct)
    }

    #[must_use]
    pub fn has_option(&self, option_id: OptionId) -> bool {
        self.options.iter().any(|option| option.id == option_id)
    }

    pub fn correct_options(&self) -> impl Iterator<Item = &AnswerOption> {
        self.options.iter().filter(|option| option.is_correct)
    }
}

/// Assessment bound to exactly one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exam {
    id: ExamId,
    module_id: ModuleId,
    title: String,
    questions: Vec<Question>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Exam {
    /// Rehydrate an exam from the exam store.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::InvalidOptionCount` when a question carries fewer than
    /// two options, which no authoring path can produce.
    pub fn from_persisted(
        id: ExamId,
        module_id: ModuleId,
        title: impl Into<String>,
        questions: Vec<Question>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ExamError> {
        if let Some(question) = questions.iter().find(|q| q.options.len() < 2) {
            return Err(ExamError::InvalidOptionCount {
                question: question.id,
                count: question.options.len(),
            });
        }

        Ok(Self {
            id,
            module_id,
            title: title.into(),
            questions,
            created_at,
            updated_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> ExamId {
        self.id
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::time::fixed_now;

    /// Builds a persisted exam where question `n` (1-based) has options
    /// `n * 10 + 1 ..= n * 10 + 4` and the first one is correct.
    pub(crate) fn sample_exam(question_count: u64) -> Exam {
        let questions = (1..=question_count)
            .map(|n| Question {
                id: QuestionId::new(n),
                text: format!("Question {n}"),
                kind: QuestionKind::MultipleChoice,
                options: (1..=4)
                    .map(|o| AnswerOption {
                        id: OptionId::new(n * 10 + o),
                        text: format!("Option {o}"),
                        is_correct: o == 1,
                    })
                    .collect(),
            })
            .collect();

        Exam::from_persisted(
            ExamId::new(1),
            ModuleId::new(1),
            "Sample",
            questions,
            fixed_now(),
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn kind_round_trips_through_storage_text() {
        for kind in [QuestionKind::MultipleChoice, QuestionKind::TrueFalse] {
            assert_eq!(QuestionKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(QuestionKind::parse("essay").is_err());
    }

    #[test]
    fn correct_choice_lookup() {
        let exam = sample_exam(2);
        let question = exam.question(QuestionId::new(2)).unwrap();
        assert!(question.is_correct_choice(OptionId::new(21)));
        assert!(!question.is_correct_choice(OptionId::new(22)));
        assert!(!question.is_correct_choice(OptionId::new(11)));
        assert_eq!(question.correct_options().count(), 1);
    }

    #[test]
    fn from_persisted_rejects_single_option_question() {
        let question = Question {
            id: QuestionId::new(5),
            text: "Q".into(),
            kind: QuestionKind::MultipleChoice,
            options: vec![AnswerOption {
                id: OptionId::new(1),
                text: "only".into(),
                is_correct: true,
            }],
        };
        let err = Exam::from_persisted(
            ExamId::new(1),
            ModuleId::new(1),
            "T",
            vec![question],
            fixed_now(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ExamError::InvalidOptionCount {
                question: QuestionId::new(5),
                count: 1
            }
        );
    }
}
