use std::collections::{BTreeSet, HashSet};

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::quiz::{QuestionType, QuizQuestion};
use crate::models::quiz_answer::QuizAnswer;

pub struct GradingService;

impl GradingService {
    /// Exact-match grading. Multiple-select compares as a set of strings so
    /// option order never affects correctness; every other type compares the
    /// raw JSON values.
    pub fn check_answer(question: &QuizQuestion, answer: &JsonValue) -> bool {
        match question.question_type {
            QuestionType::MultipleSelect => {
                match (
                    Self::as_string_set(&question.correct_answer),
                    Self::as_string_set(answer),
                ) {
                    (Some(expected), Some(given)) => expected == given,
                    _ => false,
                }
            }
            _ => answer == &question.correct_answer,
        }
    }

    /// Percentage score over question points plus the pass verdict. A quiz
    /// with no questions (or no points) scores 0 and never passes.
    pub fn score_attempt(
        questions: &[QuizQuestion],
        answers: &[QuizAnswer],
        passing_score: i32,
    ) -> (i32, bool) {
        let total_points: i32 = questions.iter().map(|q| q.points).sum();
        if total_points <= 0 {
            return (0, false);
        }

        let correct_ids: HashSet<Uuid> = answers
            .iter()
            .filter(|a| a.is_correct)
            .map(|a| a.question_id)
            .collect();
        let earned_points: i32 = questions
            .iter()
            .filter(|q| correct_ids.contains(&q.id))
            .map(|q| q.points)
            .sum();

        let score = ((earned_points as f64 / total_points as f64) * 100.0).round() as i32;
        (score, score >= passing_score)
    }

    fn as_string_set(value: &JsonValue) -> Option<BTreeSet<&str>> {
        match value {
            JsonValue::String(s) => Some(BTreeSet::from([s.as_str()])),
            JsonValue::Array(items) => {
                let mut set = BTreeSet::new();
                for item in items {
                    set.insert(item.as_str()?);
                }
                Some(set)
            }
            _ => None,
        }
    }
}
