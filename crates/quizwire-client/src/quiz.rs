//! Read-only snapshots built from engine events

use serde_json::Value;

use quizwire_core::content::{
    AnswerReceipt, FinishText, QuestionEnd, QuestionUpdate, QuizFinish, QuizMetadata,
};

/// The running quiz
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quiz {
    pub name: Option<String>,
    pub quiz_type: Option<String>,
    pub question_count: Option<i64>,
    pub current_question: Option<Question>,
}

impl From<QuizMetadata> for Quiz {
    fn from(meta: QuizMetadata) -> Self {
        Self {
            question_count: meta.question_count(),
            name: meta.quiz_name,
            quiz_type: meta.quiz_type,
            current_question: None,
        }
    }
}

/// A question as announced before it starts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Question {
    pub index: Option<i64>,
    /// Milliseconds until the question opens
    pub time_left: Option<i64>,
    pub block_type: Option<String>,
    pub use_story_blocks: bool,
    /// Mapping from displayed answer slot to choice index
    pub answer_map: Option<Value>,
}

impl Question {
    /// Whether this is the last question of `quiz`
    pub fn is_last(&self, quiz: &Quiz) -> bool {
        match (self.index, quiz.question_count) {
            (Some(index), Some(count)) => index + 1 >= count,
            _ => false,
        }
    }
}

impl From<QuestionUpdate> for Question {
    fn from(update: QuestionUpdate) -> Self {
        Self {
            index: update.question_index,
            time_left: update.time_left,
            block_type: update.game_block_type,
            use_story_blocks: update.can_access_story_blocks.unwrap_or(false),
            answer_map: update.answer_map,
        }
    }
}

/// Outcome of a question for this player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionResult {
    pub question: Option<Question>,
    pub correct_answers: Option<Value>,
    pub correct: bool,
    pub points: i64,
    pub points_data: Option<Value>,
    pub rank: Option<u32>,
    pub nemesis: Option<Value>,
    pub nemesis_is_ghost: bool,
    pub text: Option<String>,
}

impl QuestionResult {
    pub fn new(end: QuestionEnd, question: Option<Question>) -> Self {
        Self {
            question,
            correct_answers: end.correct_answers,
            correct: end.is_correct.unwrap_or(false),
            points: end.points.unwrap_or(0),
            points_data: end.points_data,
            rank: end.rank,
            nemesis: end.nemesis,
            nemesis_is_ghost: end.nemesis_is_ghost.unwrap_or(false),
            text: end.text,
        }
    }
}

/// Server confirmation of a submitted answer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerConfirmation {
    pub question: Option<Question>,
    pub message: Option<String>,
}

impl AnswerConfirmation {
    pub fn new(receipt: AnswerReceipt, question: Option<Question>) -> Self {
        Self {
            question,
            message: receipt.primary_message,
        }
    }
}

/// Final standing for this player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizResult {
    pub player_count: Option<u32>,
    pub quiz_id: Option<String>,
    pub rank: Option<u32>,
    pub correct: u32,
    pub incorrect: u32,
}

impl From<QuizFinish> for QuizResult {
    fn from(finish: QuizFinish) -> Self {
        Self {
            player_count: finish.player_count,
            quiz_id: finish.quiz_id,
            rank: finish.rank,
            correct: finish.correct_count.unwrap_or(0),
            incorrect: finish.incorrect_count.unwrap_or(0),
        }
    }
}

/// Podium text shown when the quiz finishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodiumText {
    pub medal: Option<String>,
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

impl From<FinishText> for PodiumText {
    fn from(text: FinishText) -> Self {
        Self {
            medal: text.podium_medal_type,
            primary: text.primary_message,
            secondary: text.secondary_message,
        }
    }
}
