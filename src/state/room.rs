use std::time::{Duration, SystemTime};

use indexmap::IndexSet;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, QuestionEntity, RoomEntity, RoomStatusEntity},
    state::{
        scoring::points_for,
        state_machine::{RoomEvent, RoomStatus},
    },
};

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

/// Participant of a room, identified by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Identifier minted at join time.
    pub id: Uuid,
    /// Display name, unique within the room (trimmed, case-insensitive).
    pub name: String,
    /// Accumulated points, never decreases.
    pub score: u32,
}

impl Player {
    fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            score: 0,
        }
    }
}

/// Multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Prompt text.
    pub question: String,
    /// The four answer options.
    pub options: [String; OPTION_COUNT],
    /// Index of the correct option.
    pub correct_answer: u8,
    /// Optional rationale.
    pub explanation: Option<String>,
}

impl Question {
    /// Whether `option` is the correct one.
    pub fn is_correct(&self, option: u8) -> bool {
        option == self.correct_answer
    }
}

/// What a player submitted for the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Correctness decided by the client.
    Asserted(bool),
    /// Chosen option, scored against the current question.
    Selected(u8),
}

/// Result of applying an answer to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerReceipt {
    /// `false` when the player had already answered this question.
    pub counted: bool,
    /// Whether the answer was correct.
    pub correct: bool,
    /// Points awarded by this submission.
    pub points: u32,
}

/// Result of a player leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Other players remain; `new_host` is set when host authority moved.
    Remaining {
        /// Name of the player that inherited host authority, if any.
        new_host: Option<String>,
    },
    /// The last player left; the room must be deleted.
    Emptied,
}

/// Domain rule violations raised by room operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// Joining or starting a room that is no longer waiting.
    #[error("game already started")]
    GameAlreadyStarted,
    /// Answering or advancing outside of the playing status.
    #[error("game is not in progress")]
    GameNotInProgress,
    /// Starting a room that has nothing to play.
    #[error("room has no questions")]
    NoQuestions,
    /// Another player already uses this name.
    #[error("player name already taken")]
    NameTaken,
    /// No player with this name is in the room.
    #[error("player not found")]
    PlayerNotFound,
    /// Selected option is outside the question's options.
    #[error("selected option {0} is out of range")]
    InvalidOption(u8),
}

/// A stored record that cannot be turned back into a [`Room`].
#[derive(Debug, Clone, Error)]
#[error("room record `{code}` is corrupt: {reason}")]
pub struct CorruptRoom {
    /// Code of the offending record.
    pub code: String,
    /// What is wrong with it.
    pub reason: String,
}

/// In-memory room aggregate. Every operation validates against the status
/// machine first and only then mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub code: String,
    pub set_id: String,
    pub host: String,
    pub players: Vec<Player>,
    pub status: RoomStatus,
    pub current_question_index: usize,
    pub questions: Vec<Question>,
    pub answered_players: IndexSet<String>,
    pub show_leaderboard: bool,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub version: u64,
}

/// Name comparison used for player identity.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl Room {
    /// Open a new waiting room with the host as its only player.
    pub fn open(
        code: String,
        set_id: String,
        host_name: &str,
        questions: Vec<Question>,
        now: SystemTime,
        ttl: Duration,
    ) -> Self {
        let host = host_name.trim().to_owned();
        Self {
            code,
            set_id,
            players: vec![Player::new(host.clone())],
            host,
            status: RoomStatus::Waiting,
            current_question_index: 0,
            questions,
            answered_players: IndexSet::new(),
            show_leaderboard: false,
            created_at: now,
            expires_at: now + ttl,
            version: 1,
        }
    }

    /// Find a player by name.
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|player| same_name(&player.name, name))
    }

    fn player_index(&self, name: &str) -> Option<usize> {
        self.players
            .iter()
            .position(|player| same_name(&player.name, name))
    }

    /// Question currently being played.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Add a player to a waiting room.
    pub fn join(&mut self, name: &str) -> Result<&Player, RoomError> {
        let next = self
            .status
            .on(RoomEvent::Join)
            .map_err(|_| RoomError::GameAlreadyStarted)?;

        if self.player(name).is_some() {
            return Err(RoomError::NameTaken);
        }

        self.status = next;
        self.players.push(Player::new(name.trim().to_owned()));
        Ok(&self.players[self.players.len() - 1])
    }

    /// Start playing from the first question.
    pub fn start(&mut self) -> Result<(), RoomError> {
        let next = self
            .status
            .on(RoomEvent::Start)
            .map_err(|_| RoomError::GameAlreadyStarted)?;

        if self.questions.is_empty() {
            return Err(RoomError::NoQuestions);
        }

        self.status = next;
        self.current_question_index = 0;
        self.clear_round();
        Ok(())
    }

    /// Record a player's answer to the current question. A second submission
    /// by the same player is accepted but scores nothing.
    pub fn submit_answer(
        &mut self,
        name: &str,
        answer: Answer,
    ) -> Result<AnswerReceipt, RoomError> {
        self.status
            .on(RoomEvent::Answer)
            .map_err(|_| RoomError::GameNotInProgress)?;

        let index = self.player_index(name).ok_or(RoomError::PlayerNotFound)?;

        let correct = match answer {
            Answer::Asserted(correct) => correct,
            Answer::Selected(option) => {
                if usize::from(option) >= OPTION_COUNT {
                    return Err(RoomError::InvalidOption(option));
                }
                self.current_question()
                    .is_some_and(|question| question.is_correct(option))
            }
        };

        let canonical = self.players[index].name.clone();
        let counted = self.answered_players.insert(canonical);
        let points = if counted { points_for(correct) } else { 0 };
        self.players[index].score += points;
        self.refresh_leaderboard();

        Ok(AnswerReceipt {
            counted,
            correct,
            points,
        })
    }

    /// Move to the next question, or finish the room after the last one.
    pub fn advance(&mut self) -> Result<RoomStatus, RoomError> {
        let has_next = self.current_question_index + 1 < self.questions.len();
        let next = self
            .status
            .on(RoomEvent::Advance { has_next })
            .map_err(|_| RoomError::GameNotInProgress)?;

        if has_next {
            self.current_question_index += 1;
        }
        self.status = next;
        self.clear_round();
        Ok(next)
    }

    /// Remove a player. Host authority passes to the earliest remaining joiner.
    pub fn leave(&mut self, name: &str) -> Result<LeaveOutcome, RoomError> {
        let next = self.status.on(RoomEvent::Leave).unwrap_or(self.status);
        let index = self.player_index(name).ok_or(RoomError::PlayerNotFound)?;

        let removed = self.players.remove(index);
        self.answered_players.shift_remove(&removed.name);
        self.status = next;

        let Some(first) = self.players.first() else {
            return Ok(LeaveOutcome::Emptied);
        };

        let new_host = if same_name(&self.host, &removed.name) {
            self.host = first.name.clone();
            Some(self.host.clone())
        } else {
            None
        };

        if self.status == RoomStatus::Playing {
            self.refresh_leaderboard();
        }

        Ok(LeaveOutcome::Remaining { new_host })
    }

    fn clear_round(&mut self) {
        self.answered_players.clear();
        self.show_leaderboard = false;
    }

    fn refresh_leaderboard(&mut self) {
        self.show_leaderboard = self.status == RoomStatus::Playing
            && !self.players.is_empty()
            && self.answered_players.len() >= self.players.len();
    }
}

impl From<RoomStatusEntity> for RoomStatus {
    fn from(value: RoomStatusEntity) -> Self {
        match value {
            RoomStatusEntity::Waiting => RoomStatus::Waiting,
            RoomStatusEntity::Playing => RoomStatus::Playing,
            RoomStatusEntity::Finished => RoomStatus::Finished,
        }
    }
}

impl From<RoomStatus> for RoomStatusEntity {
    fn from(value: RoomStatus) -> Self {
        match value {
            RoomStatus::Waiting => RoomStatusEntity::Waiting,
            RoomStatus::Playing => RoomStatusEntity::Playing,
            RoomStatus::Finished => RoomStatusEntity::Finished,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            score: value.score,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            score: value.score,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            question: value.question,
            options: value.options.into(),
            correct_answer: value.correct_answer,
            explanation: value.explanation,
        }
    }
}

impl TryFrom<QuestionEntity> for Question {
    type Error = String;

    fn try_from(value: QuestionEntity) -> Result<Self, Self::Error> {
        let count = value.options.len();
        let options: [String; OPTION_COUNT] = value
            .options
            .try_into()
            .map_err(|_| format!("question has {count} options"))?;
        if usize::from(value.correct_answer) >= OPTION_COUNT {
            return Err(format!(
                "correct answer {} is out of range",
                value.correct_answer
            ));
        }
        Ok(Self {
            question: value.question,
            options,
            correct_answer: value.correct_answer,
            explanation: value.explanation,
        })
    }
}

impl TryFrom<RoomEntity> for Room {
    type Error = CorruptRoom;

    fn try_from(value: RoomEntity) -> Result<Self, Self::Error> {
        let code = value.code;
        let corrupt = |reason: String| CorruptRoom {
            code: code.clone(),
            reason,
        };

        let questions = value
            .questions
            .into_iter()
            .map(Question::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(corrupt)?;

        if value.players.is_empty() {
            return Err(corrupt("room has no players".into()));
        }

        Ok(Self {
            code: code.clone(),
            set_id: value.set_id,
            host: value.host,
            players: value.players.into_iter().map(Into::into).collect(),
            status: value.status.into(),
            current_question_index: value.current_question_index,
            questions,
            answered_players: value.answered_players.into_iter().collect(),
            show_leaderboard: value.show_leaderboard,
            created_at: value.created_at,
            expires_at: value.expires_at,
            version: value.version,
        })
    }
}

impl From<Room> for RoomEntity {
    fn from(value: Room) -> Self {
        Self {
            code: value.code,
            set_id: value.set_id,
            host: value.host,
            players: value.players.into_iter().map(Into::into).collect(),
            status: value.status.into(),
            current_question_index: value.current_question_index,
            questions: value.questions.into_iter().map(Into::into).collect(),
            answered_players: value.answered_players.into_iter().collect(),
            show_leaderboard: value.show_leaderboard,
            created_at: value.created_at,
            expires_at: value.expires_at,
            version: value.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn question(correct: u8) -> Question {
        Question {
            question: "Which planet is largest?".into(),
            options: [
                "Mars".into(),
                "Jupiter".into(),
                "Venus".into(),
                "Mercury".into(),
            ],
            correct_answer: correct,
            explanation: None,
        }
    }

    fn room_with(count: usize) -> Room {
        let questions = (0..count).map(|_| question(1)).collect();
        Room::open(
            "ABC234".into(),
            "set-1".into(),
            "Alice",
            questions,
            SystemTime::now(),
            DAY,
        )
    }

    fn assert_answered_subset(room: &Room) {
        for name in &room.answered_players {
            assert!(room.player(name).is_some(), "{name} answered but is gone");
        }
    }

    #[test]
    fn open_room_starts_waiting_with_host() {
        let room = room_with(2);
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.players[0].name, "Alice");
        assert_eq!(room.host, "Alice");
        assert_eq!(room.current_question_index, 0);
        assert!(room.answered_players.is_empty());
        assert!(!room.show_leaderboard);
        assert_eq!(room.expires_at, room.created_at + DAY);
    }

    #[test]
    fn full_game_reveals_leaderboard_and_finishes() {
        let mut room = room_with(2);
        room.join("Bob").unwrap();
        room.start().unwrap();

        room.submit_answer("Alice", Answer::Asserted(true)).unwrap();
        assert!(!room.show_leaderboard);
        room.submit_answer("Bob", Answer::Asserted(false)).unwrap();
        assert!(room.show_leaderboard);
        assert_eq!(room.player("Alice").unwrap().score, 1);
        assert_eq!(room.player("Bob").unwrap().score, 0);

        assert_eq!(room.advance().unwrap(), RoomStatus::Playing);
        assert_eq!(room.current_question_index, 1);
        assert!(room.answered_players.is_empty());
        assert!(!room.show_leaderboard);

        assert_eq!(room.advance().unwrap(), RoomStatus::Finished);
        assert_eq!(room.current_question_index, 1);
        assert!(!room.show_leaderboard);
    }

    #[test]
    fn duplicate_answer_scores_once() {
        let mut room = room_with(1);
        room.start().unwrap();

        let first = room.submit_answer("Alice", Answer::Asserted(true)).unwrap();
        let second = room.submit_answer("alice ", Answer::Asserted(true)).unwrap();

        assert!(first.counted);
        assert!(!second.counted);
        assert_eq!(second.points, 0);
        assert_eq!(room.player("Alice").unwrap().score, 1);
        assert_eq!(room.answered_players.len(), 1);
    }

    #[test]
    fn selected_option_is_scored_against_the_question() {
        let mut room = room_with(1);
        room.join("Bob").unwrap();
        room.start().unwrap();

        let right = room.submit_answer("Alice", Answer::Selected(1)).unwrap();
        let wrong = room.submit_answer("Bob", Answer::Selected(2)).unwrap();
        assert!(right.correct);
        assert!(!wrong.correct);
        assert_eq!(room.player("Alice").unwrap().score, 1);
        assert_eq!(room.player("Bob").unwrap().score, 0);

        assert_eq!(
            room.submit_answer("Bob", Answer::Selected(4)),
            Err(RoomError::InvalidOption(4))
        );
    }

    #[test]
    fn join_after_start_is_rejected() {
        let mut room = room_with(1);
        room.start().unwrap();
        assert_eq!(room.join("Bob").unwrap_err(), RoomError::GameAlreadyStarted);
    }

    #[test]
    fn join_rejects_taken_name_case_insensitively() {
        let mut room = room_with(1);
        assert_eq!(room.join("  alice").unwrap_err(), RoomError::NameTaken);
        room.join("Bob").unwrap();
        assert_eq!(room.players.len(), 2);
    }

    #[test]
    fn start_without_questions_is_rejected() {
        let mut room = room_with(0);
        assert_eq!(room.start(), Err(RoomError::NoQuestions));
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    #[test]
    fn answer_and_next_need_a_running_game() {
        let mut room = room_with(1);
        assert_eq!(
            room.submit_answer("Alice", Answer::Asserted(true)),
            Err(RoomError::GameNotInProgress)
        );
        assert_eq!(room.advance(), Err(RoomError::GameNotInProgress));

        room.start().unwrap();
        room.advance().unwrap();
        assert_eq!(room.status, RoomStatus::Finished);
        assert_eq!(room.advance(), Err(RoomError::GameNotInProgress));
    }

    #[test]
    fn unknown_player_cannot_answer() {
        let mut room = room_with(1);
        room.start().unwrap();
        assert_eq!(
            room.submit_answer("Mallory", Answer::Asserted(true)),
            Err(RoomError::PlayerNotFound)
        );
    }

    #[test]
    fn host_leaving_passes_authority_to_next_joiner() {
        let mut room = room_with(1);
        room.join("Bob").unwrap();
        room.join("Carol").unwrap();

        let outcome = room.leave("Alice").unwrap();
        assert_eq!(
            outcome,
            LeaveOutcome::Remaining {
                new_host: Some("Bob".into())
            }
        );
        assert_eq!(room.host, "Bob");

        let outcome = room.leave("Carol").unwrap();
        assert_eq!(outcome, LeaveOutcome::Remaining { new_host: None });
        assert_eq!(room.leave("Bob").unwrap(), LeaveOutcome::Emptied);
    }

    #[test]
    fn leaving_mid_round_keeps_answered_consistent() {
        let mut room = room_with(2);
        room.join("Bob").unwrap();
        room.join("Carol").unwrap();
        room.start().unwrap();

        room.submit_answer("Alice", Answer::Asserted(true)).unwrap();
        room.submit_answer("Bob", Answer::Asserted(true)).unwrap();
        assert!(!room.show_leaderboard);

        room.leave("Bob").unwrap();
        assert_answered_subset(&room);
        assert_eq!(room.answered_players.len(), 1);
        assert!(!room.show_leaderboard);

        room.leave("Carol").unwrap();
        assert!(room.show_leaderboard);
        assert_answered_subset(&room);
    }

    #[test]
    fn leave_unknown_player_is_not_found() {
        let mut room = room_with(1);
        assert_eq!(room.leave("Zed"), Err(RoomError::PlayerNotFound));
    }

    #[test]
    fn entity_conversion_rejects_malformed_questions() {
        let room = room_with(1);
        let mut entity = RoomEntity::from(room.clone());
        assert_eq!(Room::try_from(entity.clone()).unwrap(), room);

        entity.questions[0].options.pop();
        let err = Room::try_from(entity).unwrap_err();
        assert_eq!(err.code, "ABC234");
        assert!(err.reason.contains("3 options"));
    }
}
