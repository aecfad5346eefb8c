//! Content kinds and the records carried in a payload's `content` string

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Quiz lifecycle event identified by a payload's numeric id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    QuestionUpdate,
    QuestionStarted,
    QuizFinished,
    AnswerAcknowledged,
    QuestionEnded,
    QuizMetadata,
    QuizEnded,
    FinishText,
    /// Kinds this client does not handle
    Unknown(u32),
}

impl ContentKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ContentKind::QuestionUpdate,
            2 => ContentKind::QuestionStarted,
            3 => ContentKind::QuizFinished,
            7 => ContentKind::AnswerAcknowledged,
            8 => ContentKind::QuestionEnded,
            9 => ContentKind::QuizMetadata,
            10 => ContentKind::QuizEnded,
            13 => ContentKind::FinishText,
            other => ContentKind::Unknown(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            ContentKind::QuestionUpdate => 1,
            ContentKind::QuestionStarted => 2,
            ContentKind::QuizFinished => 3,
            ContentKind::AnswerAcknowledged => 7,
            ContentKind::QuestionEnded => 8,
            ContentKind::QuizMetadata => 9,
            ContentKind::QuizEnded => 10,
            ContentKind::FinishText => 13,
            ContentKind::Unknown(code) => *code,
        }
    }
}

/// Kind 1: the next question is about to be shown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionUpdate {
    pub question_index: Option<i64>,
    pub time_left: Option<i64>,
    pub game_block_type: Option<String>,
    pub can_access_story_blocks: Option<bool>,
    pub answer_map: Option<Value>,
}

/// Kind 3: final standings for this player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizFinish {
    pub player_count: Option<u32>,
    #[serde(rename = "quizID")]
    pub quiz_id: Option<String>,
    pub rank: Option<u32>,
    pub correct_count: Option<u32>,
    pub incorrect_count: Option<u32>,
}

/// Kind 7: the server accepted an answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerReceipt {
    pub primary_message: Option<String>,
}

/// Kind 8: a question closed, with this player's outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionEnd {
    pub correct_answers: Option<Value>,
    pub is_correct: Option<bool>,
    pub points: Option<i64>,
    pub points_data: Option<Value>,
    pub rank: Option<u32>,
    pub nemesis: Option<Value>,
    /// Wire name carries the server's spelling
    #[serde(rename = "nemisisIsGhost")]
    pub nemesis_is_ghost: Option<bool>,
    pub text: Option<String>,
}

/// Kind 9: quiz description, sent before the first question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizMetadata {
    pub quiz_name: Option<String>,
    pub quiz_type: Option<String>,
    pub quiz_question_answers: Vec<Value>,
}

impl QuizMetadata {
    /// Question count, as reported in the first answer-count slot
    pub fn question_count(&self) -> Option<i64> {
        self.quiz_question_answers.first().and_then(Value::as_i64)
    }
}

/// Kind 13: podium text shown at the end
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinishText {
    pub podium_medal_type: Option<String>,
    pub primary_message: Option<String>,
    pub secondary_message: Option<String>,
}

/// Outbound answer submission record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub choice: u32,
    pub meta: SubmissionMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMeta {
    pub lag: u32,
    pub device: DeviceInfo,
}

/// Device description reported with each answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: String,
    pub screen: Screen,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            user_agent: concat!("quizwire/", env!("CARGO_PKG_VERSION")).to_string(),
            screen: Screen {
                width: 1920,
                height: 1050,
            },
        }
    }
}
