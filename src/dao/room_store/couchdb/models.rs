use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{PlayerEntity, QuestionEntity, RoomEntity, RoomStatusEntity};

pub const ROOM_PREFIX: &str = "room::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Room record stored as a single CouchDB document. The `_rev` returned by
/// CouchDB is echoed back on writes so the server rejects stale updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub room: RoomBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomBody {
    pub code: String,
    pub set_id: String,
    pub host: String,
    pub players: Vec<PlayerEntity>,
    pub status: RoomStatusEntity,
    pub current_question_index: usize,
    pub questions: Vec<QuestionEntity>,
    #[serde(default)]
    pub answered_players: Vec<String>,
    #[serde(default)]
    pub show_leaderboard: bool,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub version: u64,
}

impl CouchRoomDocument {
    pub fn from_entity(room: RoomEntity, rev: Option<String>) -> Self {
        Self {
            id: room_doc_id(&room.code),
            rev,
            room: RoomBody {
                code: room.code,
                set_id: room.set_id,
                host: room.host,
                players: room.players,
                status: room.status,
                current_question_index: room.current_question_index,
                questions: room.questions,
                answered_players: room.answered_players,
                show_leaderboard: room.show_leaderboard,
                created_at: room.created_at,
                expires_at: room.expires_at,
                version: room.version,
            },
        }
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.room.expires_at <= now
    }

    pub fn into_entity(self) -> RoomEntity {
        let body = self.room;
        RoomEntity {
            code: body.code,
            set_id: body.set_id,
            host: body.host,
            players: body.players,
            status: body.status,
            current_question_index: body.current_question_index,
            questions: body.questions,
            answered_players: body.answered_players,
            show_leaderboard: body.show_leaderboard,
            created_at: body.created_at,
            expires_at: body.expires_at,
            version: body.version,
        }
    }
}

pub fn room_doc_id(code: &str) -> String {
    format!("{ROOM_PREFIX}{code}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn document_keeps_revision_out_of_new_documents() {
        let now = SystemTime::now();
        let entity = RoomEntity {
            code: "ABC234".into(),
            set_id: "set-1".into(),
            host: "Alice".into(),
            players: Vec::new(),
            status: RoomStatusEntity::Waiting,
            current_question_index: 0,
            questions: Vec::new(),
            answered_players: Vec::new(),
            show_leaderboard: false,
            created_at: now,
            expires_at: now + Duration::from_secs(60),
            version: 4,
        };

        let doc = CouchRoomDocument::from_entity(entity.clone(), None);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "room::ABC234");
        assert!(json.get("_rev").is_none());
        assert_eq!(json["version"], 4);

        let parsed: CouchRoomDocument = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.into_entity(), entity);
    }
}
