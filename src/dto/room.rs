use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_options, validate_player_name},
    },
    state::{Player, Question, Room, RoomStatus},
};

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Study set the questions were generated from.
    #[validate(custom(function = "validate_not_blank"))]
    pub set_id: String,
    /// Name of the creating player, who becomes host.
    #[validate(custom(function = "validate_player_name"))]
    pub host_name: String,
    /// Questions played in order. May be empty, but such a room cannot start.
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

/// Question supplied at room creation.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    pub question: String,
    #[validate(custom(function = "validate_options"))]
    pub options: Vec<String>,
    #[validate(range(max = 3))]
    pub correct_answer: u8,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Payload naming the acting player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub player_name: String,
}

/// Answer to the current question. `selectedOption` is scored by the server
/// and takes precedence over the client-asserted `isCorrect`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_answer_present"))]
pub struct SubmitAnswerRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub player_name: String,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    #[validate(range(max = 3))]
    pub selected_option: Option<u8>,
}

fn validate_answer_present(request: &SubmitAnswerRequest) -> Result<(), ValidationError> {
    if request.is_correct.is_none() && request.selected_option.is_none() {
        let mut err = ValidationError::new("answer_missing");
        err.message = Some("Either isCorrect or selectedOption is required".into());
        return Err(err);
    }
    Ok(())
}

/// Full authoritative room state, as returned by every room endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub code: String,
    pub set_id: String,
    pub host: String,
    pub players: Vec<PlayerDto>,
    pub status: RoomStatus,
    pub current_question_index: usize,
    pub questions: Vec<QuestionDto>,
    pub answered_players: Vec<String>,
    pub show_leaderboard: bool,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 expiry time.
    pub expires_at: String,
    /// Record version; higher means newer.
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlayerDto {
    pub id: Uuid,
    pub name: String,
    pub score: u32,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u8,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Marker returned when the last player left and the room was deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoomDeleted {
    /// Always `true`.
    pub deleted: bool,
}

/// Either the updated room or the deletion marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum LeaveRoomResponse {
    Room(RoomResponse),
    Deleted(RoomDeleted),
}

impl LeaveRoomResponse {
    pub fn deleted() -> Self {
        LeaveRoomResponse::Deleted(RoomDeleted { deleted: true })
    }
}

/// Short projection used by the per-set room listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub code: String,
    pub host: String,
    pub status: RoomStatus,
    pub player_count: usize,
    pub total_questions: usize,
    pub created_at: String,
}

/// Rooms opened for one study set, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomListResponse {
    pub set_id: String,
    pub rooms: Vec<RoomSummary>,
}

impl From<Player> for PlayerDto {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            score: value.score,
        }
    }
}

impl From<Question> for QuestionDto {
    fn from(value: Question) -> Self {
        Self {
            question: value.question,
            options: value.options.into(),
            correct_answer: value.correct_answer,
            explanation: value.explanation,
        }
    }
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            created_at: format_system_time(room.created_at),
            expires_at: format_system_time(room.expires_at),
            code: room.code,
            set_id: room.set_id,
            host: room.host,
            players: room.players.into_iter().map(Into::into).collect(),
            status: room.status,
            current_question_index: room.current_question_index,
            questions: room.questions.into_iter().map(Into::into).collect(),
            answered_players: room.answered_players.into_iter().collect(),
            show_leaderboard: room.show_leaderboard,
            version: room.version,
        }
    }
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            code: room.code.clone(),
            host: room.host.clone(),
            status: room.status,
            player_count: room.players.len(),
            total_questions: room.questions.len(),
            created_at: format_system_time(room.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(body: &str) -> SubmitAnswerRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn answer_requires_correctness_or_option() {
        assert!(answer(r#"{"playerName":"Bob","isCorrect":true}"#).validate().is_ok());
        assert!(answer(r#"{"playerName":"Bob","selectedOption":2}"#).validate().is_ok());
        assert!(answer(r#"{"playerName":"Bob"}"#).validate().is_err());
        assert!(answer(r#"{"playerName":"Bob","selectedOption":4}"#).validate().is_err());
    }

    #[test]
    fn create_request_validates_nested_questions() {
        let request: CreateRoomRequest = serde_json::from_str(
            r#"{
                "setId": "set-1",
                "hostName": "Alice",
                "questions": [
                    {"question": "Q?", "options": ["a", "b", "c"], "correctAnswer": 0}
                ]
            }"#,
        )
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.to_string().contains("options"));
    }

    #[test]
    fn leave_response_serializes_both_shapes() {
        let json = serde_json::to_value(LeaveRoomResponse::deleted()).unwrap();
        assert_eq!(json, serde_json::json!({ "deleted": true }));
    }
}
