use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{PlayerEntity, QuestionEntity, RoomEntity, RoomStatusEntity};

/// Room record as laid out in the `rooms` collection. The room code is the
/// document `_id`, timestamps are BSON dates so the TTL index can evict them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    code: String,
    set_id: String,
    host: String,
    players: Vec<PlayerEntity>,
    status: RoomStatusEntity,
    current_question_index: i64,
    questions: Vec<QuestionEntity>,
    #[serde(default)]
    answered_players: Vec<String>,
    #[serde(default)]
    show_leaderboard: bool,
    created_at: DateTime,
    expires_at: DateTime,
    version: i64,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            code: value.code,
            set_id: value.set_id,
            host: value.host,
            players: value.players,
            status: value.status,
            current_question_index: value.current_question_index as i64,
            questions: value.questions,
            answered_players: value.answered_players,
            show_leaderboard: value.show_leaderboard,
            created_at: DateTime::from_system_time(value.created_at),
            expires_at: DateTime::from_system_time(value.expires_at),
            version: value.version as i64,
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            code: value.code,
            set_id: value.set_id,
            host: value.host,
            players: value.players,
            status: value.status,
            current_question_index: value.current_question_index.max(0) as usize,
            questions: value.questions,
            answered_players: value.answered_players,
            show_leaderboard: value.show_leaderboard,
            created_at: value.created_at.to_system_time(),
            expires_at: value.expires_at.to_system_time(),
            version: value.version.max(0) as u64,
        }
    }
}

/// Filter matching a live room by code.
pub fn live_room(code: &str) -> Document {
    doc! { "_id": code, "expires_at": { "$gt": DateTime::now() } }
}

/// Filter matching a live room by code at a given version.
pub fn live_room_at(code: &str, version: u64) -> Document {
    doc! {
        "_id": code,
        "version": version as i64,
        "expires_at": { "$gt": DateTime::now() },
    }
}
