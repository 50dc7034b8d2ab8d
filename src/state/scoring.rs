//! Point awards and the ranked leaderboard view of a room.

use uuid::Uuid;

use crate::state::room::Player;

/// Points awarded for a single answer.
pub fn points_for(correct: bool) -> u32 {
    u32::from(correct)
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// 1-based position.
    pub rank: usize,
    /// Player identifier.
    pub id: Uuid,
    /// Player display name.
    pub name: String,
    /// Accumulated score.
    pub score: u32,
}

/// Rank players by score, highest first. Ties keep join order.
pub fn leaderboard(players: &[Player]) -> Vec<Standing> {
    let mut ordered: Vec<&Player> = players.iter().collect();
    // `sort_by` is stable, so equal scores stay in join order.
    ordered.sort_by(|a, b| b.score.cmp(&a.score));

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, player)| Standing {
            rank: index + 1,
            id: player.id,
            name: player.name.clone(),
            score: player.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, score: u32) -> Player {
        Player {
            id: Uuid::new_v4(),
            name: name.into(),
            score,
        }
    }

    #[test]
    fn correct_answers_are_worth_one_point() {
        assert_eq!(points_for(true), 1);
        assert_eq!(points_for(false), 0);
    }

    #[test]
    fn leaderboard_sorts_by_score_then_join_order() {
        let players = vec![
            player("Alice", 1),
            player("Bob", 3),
            player("Carol", 1),
            player("Dan", 0),
        ];

        let board = leaderboard(&players);
        let names: Vec<_> = board.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, ["Bob", "Alice", "Carol", "Dan"]);

        let ranks: Vec<_> = board.iter().map(|row| row.rank).collect();
        assert_eq!(ranks, [1, 2, 3, 4]);
        assert_eq!(board[0].id, players[1].id);
    }

    #[test]
    fn empty_room_has_empty_leaderboard() {
        assert!(leaderboard(&[]).is_empty());
    }
}
