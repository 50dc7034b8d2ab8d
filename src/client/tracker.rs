//! Change detection over consecutive room polls.

use crate::{dto::room::RoomResponse, state::RoomStatus};

/// Consecutive not-found polls required before a room counts as closed.
pub const DEFAULT_MISSING_THRESHOLD: u32 = 2;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The server returned the room.
    Found(Box<RoomResponse>),
    /// The server answered that the room does not exist.
    NotFound,
    /// Transport or server failure; says nothing about the room.
    Failed(String),
}

/// Something a client should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomChange {
    /// Someone joined or left.
    PlayersChanged {
        /// Names in join order.
        players: Vec<String>,
    },
    /// The room left the lobby.
    GameStarted,
    /// A new question is on screen.
    QuestionChanged {
        /// Index of the question now being played.
        index: usize,
    },
    /// Everybody answered the current question.
    LeaderboardShown,
    /// No more questions will be played.
    GameOver,
    /// The room is gone.
    Closed,
}

/// Client-side view of a room, fed with poll outcomes.
#[derive(Debug, Clone)]
pub struct RoomTracker {
    cached: Option<RoomResponse>,
    missing_streak: u32,
    missing_threshold: u32,
    game_over: bool,
    closed: bool,
}

impl Default for RoomTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MISSING_THRESHOLD)
    }
}

impl RoomTracker {
    /// Create a tracker declaring the room closed after `missing_threshold`
    /// consecutive not-found polls.
    pub fn new(missing_threshold: u32) -> Self {
        Self {
            cached: None,
            missing_streak: 0,
            missing_threshold: missing_threshold.max(1),
            game_over: false,
            closed: false,
        }
    }

    /// Last accepted room state.
    pub fn room(&self) -> Option<&RoomResponse> {
        self.cached.as_ref()
    }

    /// Whether nothing more can happen in this room.
    pub fn is_terminal(&self) -> bool {
        self.game_over || self.closed
    }

    /// Fold one poll into the cached view and report what changed.
    pub fn observe(&mut self, outcome: PollOutcome) -> Vec<RoomChange> {
        match outcome {
            PollOutcome::Found(room) => {
                self.missing_streak = 0;
                self.accept(*room)
            }
            PollOutcome::NotFound => {
                self.missing_streak += 1;
                if self.missing_streak >= self.missing_threshold && !self.closed {
                    self.closed = true;
                    vec![RoomChange::Closed]
                } else {
                    Vec::new()
                }
            }
            PollOutcome::Failed(_) => Vec::new(),
        }
    }

    fn accept(&mut self, room: RoomResponse) -> Vec<RoomChange> {
        // A code freed by expiry can be handed to a new room whose versions
        // start over.
        if self
            .cached
            .as_ref()
            .is_some_and(|previous| previous.created_at != room.created_at)
        {
            self.cached = None;
            self.game_over = false;
        }

        if let Some(previous) = &self.cached {
            if room.version < previous.version {
                return Vec::new();
            }
        }

        let mut changes = Vec::new();
        let previous = self.cached.as_ref();

        let names = player_names(&room);
        if previous.is_some_and(|prev| player_names(prev) != names) {
            changes.push(RoomChange::PlayersChanged { players: names });
        }

        let was_waiting = previous.is_none_or(|prev| prev.status == RoomStatus::Waiting);
        if was_waiting && room.status != RoomStatus::Waiting {
            changes.push(RoomChange::GameStarted);
        }

        if room.status == RoomStatus::Playing
            && room.current_question_index < room.questions.len()
        {
            let question_moved = previous.is_none_or(|prev| {
                prev.status != RoomStatus::Playing
                    || prev.current_question_index != room.current_question_index
            });
            if question_moved {
                changes.push(RoomChange::QuestionChanged {
                    index: room.current_question_index,
                });
            }
        }

        let was_shown = previous.is_some_and(|prev| {
            prev.show_leaderboard && prev.current_question_index == room.current_question_index
        });
        if room.show_leaderboard && !was_shown {
            changes.push(RoomChange::LeaderboardShown);
        }

        if is_game_over(&room) && !self.game_over {
            self.game_over = true;
            changes.push(RoomChange::GameOver);
        }

        self.cached = Some(room);
        changes
    }
}

/// Whether no further question will be played in `room`.
pub fn is_game_over(room: &RoomResponse) -> bool {
    room.status == RoomStatus::Finished
        || (room.status == RoomStatus::Playing
            && room.current_question_index >= room.questions.len())
}

fn player_names(room: &RoomResponse) -> Vec<String> {
    room.players.iter().map(|player| player.name.clone()).collect()
}
