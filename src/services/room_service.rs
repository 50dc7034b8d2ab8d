use std::time::{Duration, SystemTime};

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    dto::{
        leaderboard::LeaderboardResponse,
        room::{
            CreateRoomRequest, LeaveRoomResponse, PlayerRequest, QuestionInput, RoomListResponse,
            RoomResponse, RoomSummary, SubmitAnswerRequest,
        },
    },
    error::ServiceError,
    services::room_code,
    state::{Answer, LeaveOutcome, Question, Room, RoomStatus, SharedState},
};

const WRITE_BACKOFF_BASE: Duration = Duration::from_millis(10);
const WRITE_BACKOFF_CAP: Duration = Duration::from_millis(500);

/// Open a new waiting room with the requester as host.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomResponse, ServiceError> {
    let CreateRoomRequest {
        set_id,
        host_name,
        questions,
    } = request;
    let questions = build_questions(questions)?;
    let store = state.require_room_store().await?;
    let config = state.config();

    for attempt in 1..=config.max_code_attempts() {
        let code = room_code::generate(config.code_length());
        let room = Room::open(
            code,
            set_id.trim().to_owned(),
            &host_name,
            questions.clone(),
            SystemTime::now(),
            config.room_ttl(),
        );

        match store.insert_room(room.clone().into()).await {
            Ok(()) => {
                info!(
                    room = %room.code,
                    set_id = %room.set_id,
                    host = %room.host,
                    questions = room.questions.len(),
                    "room created"
                );
                return Ok(room.into());
            }
            Err(StorageError::AlreadyExists { key }) => {
                debug!(code = %key, attempt, "room code collision; drawing another");
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(
        attempts = config.max_code_attempts(),
        "could not allocate a unique room code"
    );
    Err(ServiceError::Conflict(
        "could not allocate a unique room code".into(),
    ))
}

/// Current state of a room.
pub async fn get_room(state: &SharedState, code: &str) -> Result<RoomResponse, ServiceError> {
    let store = state.require_room_store().await?;
    let room = load_room(store.as_ref(), &room_code::normalize(code)).await?;
    Ok(room.into())
}

/// Add a player to a waiting room.
pub async fn join_room(
    state: &SharedState,
    code: &str,
    request: PlayerRequest,
) -> Result<RoomResponse, ServiceError> {
    let name = request.player_name;
    let room = mutate_room(state, code, |room| {
        room.join(&name)?;
        Ok(())
    })
    .await?
    .room;

    let room = room.ok_or_else(room_not_found)?;
    info!(room = %room.code, player = %name.trim(), players = room.players.len(), "player joined");
    Ok(room.into())
}

/// Move a waiting room to its first question.
pub async fn start_room(state: &SharedState, code: &str) -> Result<RoomResponse, ServiceError> {
    let room = mutate_room(state, code, |room| Ok(room.start()?))
        .await?
        .room
        .ok_or_else(room_not_found)?;

    info!(room = %room.code, players = room.players.len(), "game started");
    Ok(room.into())
}

/// Register a player's answer to the current question.
pub async fn submit_answer(
    state: &SharedState,
    code: &str,
    request: SubmitAnswerRequest,
) -> Result<RoomResponse, ServiceError> {
    let answer = match (request.selected_option, request.is_correct) {
        (Some(option), _) => Answer::Selected(option),
        (None, Some(correct)) => Answer::Asserted(correct),
        (None, None) => {
            return Err(ServiceError::InvalidInput(
                "either isCorrect or selectedOption is required".into(),
            ));
        }
    };

    let name = request.player_name;
    let committed = mutate_room(state, code, |room| Ok(room.submit_answer(&name, answer)?)).await?;
    let receipt = committed.value;
    let room = committed.room.ok_or_else(room_not_found)?;

    debug!(
        room = %room.code,
        player = %name.trim(),
        counted = receipt.counted,
        correct = receipt.correct,
        answered = room.answered_players.len(),
        players = room.players.len(),
        "answer submitted"
    );
    if receipt.counted && room.show_leaderboard {
        info!(room = %room.code, question = room.current_question_index, "all players answered");
    }
    Ok(room.into())
}

/// Advance to the next question, finishing the game after the last one.
pub async fn next_question(state: &SharedState, code: &str) -> Result<RoomResponse, ServiceError> {
    let committed = mutate_room(state, code, |room| Ok(room.advance()?)).await?;
    let room = committed.room.ok_or_else(room_not_found)?;

    if committed.value == RoomStatus::Finished {
        info!(room = %room.code, "game finished");
    } else {
        debug!(room = %room.code, question = room.current_question_index, "question advanced");
    }
    Ok(room.into())
}

/// Remove a player; the room is deleted once nobody is left.
pub async fn leave_room(
    state: &SharedState,
    code: &str,
    request: PlayerRequest,
) -> Result<LeaveRoomResponse, ServiceError> {
    let name = request.player_name;
    let committed = mutate_room(state, code, |room| Ok(room.leave(&name)?)).await?;

    match (committed.value, committed.room) {
        (LeaveOutcome::Emptied, _) | (_, None) => {
            info!(room = %room_code::normalize(code), player = %name.trim(), "last player left; room deleted");
            Ok(LeaveRoomResponse::deleted())
        }
        (LeaveOutcome::Remaining { new_host }, Some(room)) => {
            if let Some(host) = new_host {
                info!(room = %room.code, host = %host, "host left; authority reassigned");
            }
            info!(room = %room.code, player = %name.trim(), "player left");
            Ok(LeaveRoomResponse::Room(room.into()))
        }
    }
}

/// Ranked standings of a room.
pub async fn leaderboard(
    state: &SharedState,
    code: &str,
) -> Result<LeaderboardResponse, ServiceError> {
    let store = state.require_room_store().await?;
    let room = load_room(store.as_ref(), &room_code::normalize(code)).await?;
    Ok(LeaderboardResponse::from(&room))
}

/// Live rooms created from a study set, oldest first.
pub async fn rooms_by_set(
    state: &SharedState,
    set_id: &str,
) -> Result<RoomListResponse, ServiceError> {
    let store = state.require_room_store().await?;
    let set_id = set_id.trim().to_owned();

    let rooms = store
        .find_rooms_by_set(&set_id)
        .await?
        .into_iter()
        .filter_map(|entity| match Room::try_from(entity) {
            Ok(room) => Some(RoomSummary::from(&room)),
            Err(err) => {
                warn!(error = %err, "skipping unreadable room record");
                None
            }
        })
        .collect();

    Ok(RoomListResponse { set_id, rooms })
}

/// Result of a committed mutation. `room` is `None` when the record was deleted.
struct Committed<T> {
    value: T,
    room: Option<Room>,
}

/// Load, mutate and conditionally save a room inside its transaction gate.
///
/// The save is a compare-and-swap on the loaded version; on conflict the
/// whole load/mutate/save unit starts over after a jittered backoff, up to the
/// configured number of attempts. The gate only serializes writers of this
/// process, so conflicts come from other instances sharing the store. A room
/// left without players is deleted instead of saved.
async fn mutate_room<T, F>(
    state: &SharedState,
    code: &str,
    mut apply: F,
) -> Result<Committed<T>, ServiceError>
where
    F: FnMut(&mut Room) -> Result<T, ServiceError>,
{
    let code = room_code::normalize(code);
    let max_attempts = state.config().max_write_attempts();

    state
        .run_room_transaction(&code, {
            let code = code.clone();
            move || async move {
                let store = state.require_room_store().await?;

                for attempt in 1..=max_attempts {
                    if attempt > 1 {
                        sleep(write_backoff(attempt - 1)).await;
                    }

                    let mut room = load_room(store.as_ref(), &code).await?;
                    let loaded_version = room.version;
                    let value = apply(&mut room)?;

                    if room.players.is_empty() {
                        match store.delete_room(&code, loaded_version).await {
                            Ok(_) => return Ok(Committed { value, room: None }),
                            Err(StorageError::VersionConflict { .. }) => {
                                debug!(room = %code, attempt, "room changed before delete; retrying");
                                continue;
                            }
                            Err(err) => return Err(err.into()),
                        }
                    }

                    room.version = loaded_version + 1;
                    match store
                        .replace_room(room.clone().into(), loaded_version)
                        .await
                    {
                        Ok(()) => {
                            return Ok(Committed {
                                value,
                                room: Some(room),
                            });
                        }
                        Err(StorageError::VersionConflict { .. }) => {
                            debug!(room = %code, attempt, "room changed before save; retrying");
                        }
                        Err(StorageError::Missing { .. }) => return Err(room_not_found()),
                        Err(err) => return Err(err.into()),
                    }
                }

                warn!(room = %code, attempts = max_attempts, "giving up after repeated write conflicts");
                Err(ServiceError::Busy)
            }
        })
        .await
}

/// Random delay in `0..=min(base * 2^retry, cap)` before retry number `retry`.
fn write_backoff(retry: u32) -> Duration {
    let ceiling = WRITE_BACKOFF_BASE
        .saturating_mul(1u32 << retry.min(16))
        .min(WRITE_BACKOFF_CAP);
    let millis = rand::rng().random_range(0..=ceiling.as_millis() as u64);
    Duration::from_millis(millis)
}

async fn load_room(store: &dyn RoomStore, code: &str) -> Result<Room, ServiceError> {
    let entity = store.find_room(code).await?.ok_or_else(room_not_found)?;
    Ok(Room::try_from(entity)?)
}

fn room_not_found() -> ServiceError {
    ServiceError::NotFound("room not found".into())
}

fn build_questions(inputs: Vec<QuestionInput>) -> Result<Vec<Question>, ServiceError> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            let count = input.options.len();
            let options = input.options.try_into().map_err(|_| {
                ServiceError::InvalidInput(format!(
                    "question {index} must have 4 options (got {count})"
                ))
            })?;
            if input.correct_answer > 3 {
                return Err(ServiceError::InvalidInput(format!(
                    "question {index} has correctAnswer out of range"
                )));
            }
            Ok(Question {
                question: input.question,
                options,
                correct_answer: input.correct_answer,
                explanation: input.explanation,
            })
        })
        .collect()
}
