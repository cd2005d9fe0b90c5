use thiserror::Error;

use crate::model::exam::{Exam, FALSE_LABEL, QuestionKind, TRUE_LABEL};

/// Fewest options a question may hold.
pub const MIN_OPTIONS: usize = 2;
/// Most options a multiple-choice question may hold.
pub const MAX_OPTIONS: usize = 6;
/// Blank options a fresh multiple-choice question starts with.
pub const DEFAULT_CHOICE_COUNT: usize = 4;

const TRUE_FALSE_LABELS: [&str; 2] = [TRUE_LABEL, FALSE_LABEL];

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// First validity rule an exam draft breaks. Indices are zero-based.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamDraftError {
    #[error("exam title cannot be empty")]
    EmptyTitle,

    #[error("exam must contain at least one question")]
    NoQuestions,

    #[error("question {question} has no text")]
    EmptyQuestionText { question: usize },

    #[error("option {option} of question {question} has no text")]
    EmptyOptionText { question: usize, option: usize },

    #[error("question {question} has no option marked correct")]
    MissingCorrectOption { question: usize },

    #[error("question {question} has {count} options")]
    InvalidOptionCount { question: usize, count: usize },
}

//
// ─── ANSWER CHOICES ────────────────────────────────────────────────────────────
//

/// Options of a question draft, shaped by its kind.
///
/// The correct answer is a single index, so a draft can never hold two
/// correct options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerChoices {
    MultipleChoice {
        options: Vec<String>,
        correct: Option<usize>,
    },
    TrueFalse {
        correct: Option<usize>,
    },
}

impl AnswerChoices {
    /// Default choice set for a kind: four blank options or the fixed
    /// true/false pair, none marked correct.
    #[must_use]
    pub fn reset(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::MultipleChoice => Self::MultipleChoice {
                options: vec![String::new(); DEFAULT_CHOICE_COUNT],
                correct: None,
            },
            QuestionKind::TrueFalse => Self::TrueFalse { correct: None },
        }
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        match self {
            Self::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            Self::TrueFalse { .. } => QuestionKind::TrueFalse,
        }
    }

    fn correct(&self) -> Option<usize> {
        match self {
            Self::MultipleChoice { correct, .. } | Self::TrueFalse { correct } => *correct,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::MultipleChoice { options, .. } => options.len(),
            Self::TrueFalse { .. } => TRUE_FALSE_LABELS.len(),
        }
    }

    fn text(&self, index: usize) -> Option<&str> {
        match self {
            Self::MultipleChoice { options, .. } => options.get(index).map(String::as_str),
            Self::TrueFalse { .. } => TRUE_FALSE_LABELS.get(index).copied(),
        }
    }
}

/// Read-only view of one option of a question draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftOption<'a> {
    pub index: usize,
    pub text: &'a str,
    pub is_correct: bool,
}

//
// ─── QUESTION DRAFT ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    text: String,
    choices: AnswerChoices,
}

impl Default for QuestionDraft {
    fn default() -> Self {
        Self::new(QuestionKind::MultipleChoice)
    }
}

impl QuestionDraft {
    #[must_use]
    pub fn new(kind: QuestionKind) -> Self {
        Self {
            text: String::new(),
            choices: AnswerChoices::reset(kind),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.choices.kind()
    }

    #[must_use]
    pub fn choices(&self) -> &AnswerChoices {
        &self.choices
    }

    /// Switch the question to another kind.
    ///
    /// Switching discards every option and correctness mark and installs the
    /// default set of the new kind. Selecting the current kind changes nothing.
    pub fn set_kind(&mut self, kind: QuestionKind) {
        if self.kind() != kind {
            self.choices = AnswerChoices::reset(kind);
        }
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.choices.len()
    }

    #[must_use]
    pub fn options(&self) -> Vec<DraftOption<'_>> {
        let correct = self.choices.correct();
        (0..self.choices.len())
            .filter_map(|index| {
                self.choices.text(index).map(|text| DraftOption {
                    index,
                    text,
                    is_correct: correct == Some(index),
                })
            })
            .collect()
    }

    #[must_use]
    pub fn correct_index(&self) -> Option<usize> {
        self.choices.correct()
    }

    /// Edit the text of a multiple-choice option. True/false labels are fixed,
    /// and out-of-range indices are ignored.
    pub fn set_option_text(&mut self, index: usize, text: impl Into<String>) {
        if let AnswerChoices::MultipleChoice { options, .. } = &mut self.choices {
            if let Some(slot) = options.get_mut(index) {
                *slot = text.into();
            }
        }
    }

    /// Mark one option correct, clearing whichever option was correct before.
    pub fn mark_correct(&mut self, index: usize) {
        let len = self.choices.len();
        if index >= len {
            return;
        }
        match &mut self.choices {
            AnswerChoices::MultipleChoice { correct, .. } | AnswerChoices::TrueFalse { correct } => {
                *correct = Some(index);
            }
        }
    }

    #[must_use]
    pub fn can_add_option(&self) -> bool {
        matches!(&self.choices, AnswerChoices::MultipleChoice { options, .. } if options.len() < MAX_OPTIONS)
    }

    #[must_use]
    pub fn can_remove_option(&self) -> bool {
        matches!(&self.choices, AnswerChoices::MultipleChoice { options, .. } if options.len() > MIN_OPTIONS)
    }

    /// Append a blank option. Returns false (and changes nothing) once the
    /// question already holds the maximum, or for true/false questions.
    pub fn add_option(&mut self) -> bool {
        if !self.can_add_option() {
            return false;
        }
        if let AnswerChoices::MultipleChoice { options, .. } = &mut self.choices {
            options.push(String::new());
        }
        true
    }

    /// Remove the option at `index`. Returns false (and changes nothing) when
    /// the question is at the minimum, the index is out of range, or the
    /// question is true/false.
    pub fn remove_option(&mut self, index: usize) -> bool {
        if !self.can_remove_option() {
            return false;
        }
        let AnswerChoices::MultipleChoice { options, correct } = &mut self.choices else {
            return false;
        };
        if index >= options.len() {
            return false;
        }
        options.remove(index);
        *correct = match *correct {
            Some(c) if c == index => None,
            Some(c) if c > index => Some(c - 1),
            other => other,
        };
        true
    }

    fn check(&self, question: usize) -> Result<(), ExamDraftError> {
        if self.text.trim().is_empty() {
            return Err(ExamDraftError::EmptyQuestionText { question });
        }
        if let AnswerChoices::MultipleChoice { options, .. } = &self.choices {
            if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
                return Err(ExamDraftError::InvalidOptionCount {
                    question,
                    count: options.len(),
                });
            }
            if let Some(option) = options.iter().position(|o| o.trim().is_empty()) {
                return Err(ExamDraftError::EmptyOptionText { question, option });
            }
        }
        if self.choices.correct().is_none() {
            return Err(ExamDraftError::MissingCorrectOption { question });
        }
        Ok(())
    }
}

//
// ─── EXAM DRAFT ────────────────────────────────────────────────────────────────
//

/// In-progress exam being authored. Edits are unrestricted; `validate` gates
/// what may reach the exam store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExamDraft {
    title: String,
    questions: Vec<QuestionDraft>,
}

impl ExamDraft {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            questions: Vec::new(),
        }
    }

    /// Seed an edit draft from a persisted exam.
    #[must_use]
    pub fn from_exam(exam: &Exam) -> Self {
        let questions = exam
            .questions()
            .iter()
            .map(|question| {
                let correct = question.options.iter().position(|o| o.is_correct);
                let choices = match question.kind {
                    QuestionKind::MultipleChoice => AnswerChoices::MultipleChoice {
                        options: question.options.iter().map(|o| o.text.clone()).collect(),
                        correct,
                    },
                    QuestionKind::TrueFalse => AnswerChoices::TrueFalse {
                        correct: correct.filter(|c| *c < TRUE_FALSE_LABELS.len()),
                    },
                };
                QuestionDraft {
                    text: question.text.clone(),
                    choices,
                }
            })
            .collect();

        Self {
            title: exam.title().to_owned(),
            questions,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    #[must_use]
    pub fn questions(&self) -> &[QuestionDraft] {
        &self.questions
    }

    /// Append a blank question of the given kind and return its index.
    pub fn add_question(&mut self, kind: QuestionKind) -> usize {
        self.questions.push(QuestionDraft::new(kind));
        self.questions.len() - 1
    }

    pub fn push_question(&mut self, question: QuestionDraft) {
        self.questions.push(question);
    }

    pub fn remove_question(&mut self, index: usize) -> Option<QuestionDraft> {
        (index < self.questions.len()).then(|| self.questions.remove(index))
    }

    pub fn question_mut(&mut self, index: usize) -> Option<&mut QuestionDraft> {
        self.questions.get_mut(index)
    }

    /// Check every validity rule, reporting the first one broken.
    ///
    /// # Errors
    ///
    /// Returns the `ExamDraftError` describing the first failing rule.
    pub fn check(&self) -> Result<(), ExamDraftError> {
        if self.title.trim().is_empty() {
            return Err(ExamDraftError::EmptyTitle);
        }
        if self.questions.is_empty() {
            return Err(ExamDraftError::NoQuestions);
        }
        for (index, question) in self.questions.iter().enumerate() {
            question.check(index)?;
        }
        Ok(())
    }

    /// Whether the draft may be submitted.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    /// Produce the normalized (trimmed) exam handed to the exam store.
    ///
    /// # Errors
    ///
    /// Returns the `ExamDraftError` of the first failing rule.
    pub fn validate(&self) -> Result<ValidatedExam, ExamDraftError> {
        self.check()?;

        let questions = self
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let correct = question
                    .correct_index()
                    .ok_or(ExamDraftError::MissingCorrectOption { question: index })?;
                let options = (0..question.choices.len())
                    .filter_map(|i| question.choices.text(i))
                    .map(|text| text.trim().to_owned())
                    .collect();
                Ok(ValidatedQuestion {
                    text: question.text.trim().to_owned(),
                    kind: question.kind(),
                    options,
                    correct,
                })
            })
            .collect::<Result<Vec<_>, ExamDraftError>>()?;

        Ok(ValidatedExam {
            title: self.title.trim().to_owned(),
            questions,
        })
    }
}

/// Normalized question ready for persistence; `correct` indexes `options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub text: String,
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub correct: usize,
}

impl ValidatedQuestion {
    /// Options paired with their correctness flag, in display order.
    pub fn flagged_options(&self) -> impl Iterator<Item = (&str, bool)> {
        self.options
            .iter()
            .enumerate()
            .map(|(i, text)| (text.as_str(), i == self.correct))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedExam {
    pub title: String,
    pub questions: Vec<ValidatedQuestion>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
