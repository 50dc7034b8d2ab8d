use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Persisted lifecycle status of a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatusEntity {
    /// Lobby open, players may join.
    Waiting,
    /// Questions are being played.
    Playing,
    /// The last question has been played.
    Finished,
}

/// Player stored inside a room record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Identifier minted at join time.
    pub id: Uuid,
    /// Display name, unique within the room.
    pub name: String,
    /// Accumulated points.
    pub score: u32,
}

/// Quiz question stored inside a room record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Prompt text.
    pub question: String,
    /// Answer options, four entries.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_answer: u8,
    /// Optional rationale shown after answering.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Whole-room record persisted by the storage layer. Writes always replace
/// the full record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key, the shareable room code.
    pub code: String,
    /// Secondary key referencing the originating study set.
    pub set_id: String,
    /// Name of the player holding host authority.
    pub host: String,
    /// Players in join order.
    pub players: Vec<PlayerEntity>,
    /// Lifecycle status.
    pub status: RoomStatusEntity,
    /// Index of the question being played.
    pub current_question_index: usize,
    /// Questions fixed at creation.
    pub questions: Vec<QuestionEntity>,
    /// Names of the players who answered the current question.
    pub answered_players: Vec<String>,
    /// Whether the per-question leaderboard is revealed.
    pub show_leaderboard: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Instant after which the record counts as absent.
    pub expires_at: SystemTime,
    /// Record version, bumped on every successful write.
    pub version: u64,
}

impl RoomEntity {
    /// Whether the record's expiry has elapsed at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at <= now
    }
}
