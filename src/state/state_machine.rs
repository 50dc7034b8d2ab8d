use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle of a quiz room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Lobby: players can join, nobody can answer yet.
    Waiting,
    /// Questions are being played; joins are closed.
    Playing,
    /// The last question was advanced past; the room is read-only.
    Finished,
}

/// Events that can be applied to a room's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// A new player asks to enter the room.
    Join,
    /// The host starts the game.
    Start,
    /// A player submits an answer for the current question.
    Answer,
    /// The host moves on; `has_next` tells whether another question exists.
    Advance {
        /// Whether the room still has a question after the current one.
        has_next: bool,
    },
    /// A player leaves the room.
    Leave,
}

/// Error returned when an event is not allowed from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the room was in when the event was received.
    pub from: RoomStatus,
    /// The rejected event.
    pub event: RoomEvent,
}

impl RoomStatus {
    /// Compute the status reached by applying `event`, if the transition is valid.
    pub fn on(self, event: RoomEvent) -> Result<RoomStatus, InvalidTransition> {
        let next = match (self, event) {
            (RoomStatus::Waiting, RoomEvent::Join) => RoomStatus::Waiting,
            (RoomStatus::Waiting, RoomEvent::Start) => RoomStatus::Playing,
            (RoomStatus::Playing, RoomEvent::Answer) => RoomStatus::Playing,
            (RoomStatus::Playing, RoomEvent::Advance { has_next: true }) => RoomStatus::Playing,
            (RoomStatus::Playing, RoomEvent::Advance { has_next: false }) => RoomStatus::Finished,
            (status, RoomEvent::Leave) => status,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(status: RoomStatus, event: RoomEvent) -> RoomStatus {
        status.on(event).unwrap()
    }

    #[test]
    fn full_happy_path_through_room() {
        let mut status = RoomStatus::Waiting;

        status = apply(status, RoomEvent::Join);
        assert_eq!(status, RoomStatus::Waiting);
        status = apply(status, RoomEvent::Start);
        assert_eq!(status, RoomStatus::Playing);
        status = apply(status, RoomEvent::Answer);
        assert_eq!(status, RoomStatus::Playing);
        status = apply(status, RoomEvent::Advance { has_next: true });
        assert_eq!(status, RoomStatus::Playing);
        status = apply(status, RoomEvent::Advance { has_next: false });
        assert_eq!(status, RoomStatus::Finished);
    }

    #[test]
    fn leave_keeps_status_everywhere() {
        for status in [
            RoomStatus::Waiting,
            RoomStatus::Playing,
            RoomStatus::Finished,
        ] {
            assert_eq!(apply(status, RoomEvent::Leave), status);
        }
    }

    #[test]
    fn join_rejected_once_started() {
        let err = RoomStatus::Playing.on(RoomEvent::Join).unwrap_err();
        assert_eq!(err.from, RoomStatus::Playing);
        assert_eq!(err.event, RoomEvent::Join);
        assert!(RoomStatus::Finished.on(RoomEvent::Join).is_err());
    }

    #[test]
    fn answer_and_advance_require_playing() {
        for status in [RoomStatus::Waiting, RoomStatus::Finished] {
            assert!(status.on(RoomEvent::Answer).is_err());
            assert!(status.on(RoomEvent::Advance { has_next: true }).is_err());
            assert!(status.on(RoomEvent::Advance { has_next: false }).is_err());
        }
    }

    #[test]
    fn start_is_only_valid_from_waiting() {
        assert!(RoomStatus::Playing.on(RoomEvent::Start).is_err());
        assert!(RoomStatus::Finished.on(RoomEvent::Start).is_err());
    }
}
