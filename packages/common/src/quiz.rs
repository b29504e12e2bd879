use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Every quiz question offers exactly this many options.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// A rule violated by a question definition. `serial` is the 1-based position of the
/// question in the quiz.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionError {
    #[error("Question {serial}: prompt must not be empty")]
    EmptyPrompt { serial: usize },
    #[error("Question {serial}: exactly 4 options are required, got {count}")]
    OptionCount { serial: usize, count: usize },
    #[error("Question {serial}: options must not be empty")]
    EmptyOption { serial: usize },
    #[error("Question {serial}: option '{option}' appears more than once")]
    DuplicateOption { serial: usize, option: String },
    #[error("Question {serial}: correct answer must be one of the options")]
    AnswerNotInOptions { serial: usize },
}

/// Check a single question definition.
///
/// Options are compared exactly, so `"A"` and `"a"` are distinct options and a correct
/// answer of `"a"` does not match an option `"A"`.
pub fn check_question(
    serial: usize,
    prompt: &str,
    options: &[String],
    correct_answer: &str,
) -> Result<(), QuestionError> {
    if prompt.trim().is_empty() {
        return Err(QuestionError::EmptyPrompt { serial });
    }
    if options.len() != OPTIONS_PER_QUESTION {
        return Err(QuestionError::OptionCount {
            serial,
            count: options.len(),
        });
    }
    let mut seen = HashSet::new();
    for option in options {
        if option.trim().is_empty() {
            return Err(QuestionError::EmptyOption { serial });
        }
        if !seen.insert(option.as_str()) {
            return Err(QuestionError::DuplicateOption {
                serial,
                option: option.clone(),
            });
        }
    }
    if !options.iter().any(|o| o == correct_answer) {
        return Err(QuestionError::AnswerNotInOptions { serial });
    }
    Ok(())
}

/// Whether a submitted answer earns the point: both sides trimmed, case-sensitive.
pub fn answers_match(submitted: &str, correct: &str) -> bool {
    submitted.trim() == correct.trim()
}

/// Outcome for one question of a graded quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedQuestion<K> {
    pub question_id: K,
    /// The student's answer, `None` if the question was left out of the submission.
    pub answer: Option<String>,
    pub is_correct: bool,
}

/// Score of one quiz for one student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizScore<K> {
    pub total_points: u32,
    pub scored_points: u32,
    pub questions: Vec<GradedQuestion<K>>,
}

/// Grade a submission against an answer key.
///
/// `answer_key` yields `(question_id, correct_answer)` in display order; the graded
/// questions come back in the same order. One point per exact match, no partial credit,
/// no negative marking. Answers for ids absent from the key are ignored.
pub fn grade<'a, K, I>(answer_key: I, answers: &HashMap<K, String>) -> QuizScore<K>
where
    K: Eq + Hash + Copy,
    I: IntoIterator<Item = (K, &'a str)>,
{
    let mut total_points = 0;
    let mut scored_points = 0;
    let mut questions = Vec::new();

    for (question_id, correct) in answer_key {
        total_points += 1;
        let answer = answers.get(&question_id).cloned();
        let is_correct = answer
            .as_deref()
            .is_some_and(|submitted| answers_match(submitted, correct));
        if is_correct {
            scored_points += 1;
        }
        questions.push(GradedQuestion {
            question_id,
            answer,
            is_correct,
        });
    }

    QuizScore {
        total_points,
        scored_points,
        questions,
    }
}
