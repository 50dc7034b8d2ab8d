use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{Room, RoomStatus, scoring};

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: Uuid,
    pub name: String,
    pub score: u32,
}

/// Ranked standings of a room plus progress information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub total_players: usize,
    pub status: RoomStatus,
    pub current_question_index: usize,
    pub total_questions: usize,
}

impl From<&Room> for LeaderboardResponse {
    fn from(room: &Room) -> Self {
        let leaderboard = scoring::leaderboard(&room.players)
            .into_iter()
            .map(|standing| LeaderboardEntry {
                rank: standing.rank,
                id: standing.id,
                name: standing.name,
                score: standing.score,
            })
            .collect();

        Self {
            leaderboard,
            total_players: room.players.len(),
            status: room.status,
            current_question_index: room.current_question_index,
            total_questions: room.questions.len(),
        }
    }
}
