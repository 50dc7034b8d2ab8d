use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::{
        leaderboard::LeaderboardResponse,
        room::{
            CreateRoomRequest, LeaveRoomResponse, PlayerRequest, RoomListResponse, RoomResponse,
            SubmitAnswerRequest,
        },
    },
    error::{AppError, ErrorBody},
    routes::extract::ValidJson,
    services::room_service,
    state::SharedState,
};

/// Routes driving the multiplayer room lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/multiplayer/rooms", post(create_room))
        .route("/multiplayer/rooms/{code}", get(get_room))
        .route("/multiplayer/rooms/{code}/join", post(join_room))
        .route("/multiplayer/rooms/{code}/start", post(start_room))
        .route("/multiplayer/rooms/{code}/answer", post(submit_answer))
        .route("/multiplayer/rooms/{code}/next", post(next_question))
        .route("/multiplayer/rooms/{code}/leave", post(leave_room))
        .route("/multiplayer/rooms/{code}/leaderboard", get(get_leaderboard))
        .route("/multiplayer/sets/{set_id}/rooms", get(list_rooms_for_set))
}

/// Open a new room; the creator becomes host and first player.
#[utoipa::path(
    post,
    path = "/multiplayer/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "No free room code", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    ValidJson(payload): ValidJson<CreateRoomRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = room_service::create_room(&state, payload).await?;
    Ok(Json(room))
}

/// Fetch the full state of a room. Clients poll this.
#[utoipa::path(
    get,
    path = "/multiplayer/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Current room state", body = RoomResponse),
        (status = 404, description = "Room not found or expired", body = ErrorBody)
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = room_service::get_room(&state, &code).await?;
    Ok(Json(room))
}

#[utoipa::path(
    post,
    path = "/multiplayer/rooms/{code}/join",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Player added", body = RoomResponse),
        (status = 400, description = "Game already started", body = ErrorBody),
        (status = 404, description = "Room not found", body = ErrorBody),
        (status = 409, description = "Player name already taken", body = ErrorBody)
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    ValidJson(payload): ValidJson<PlayerRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = room_service::join_room(&state, &code, payload).await?;
    Ok(Json(room))
}

#[utoipa::path(
    post,
    path = "/multiplayer/rooms/{code}/start",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Game started", body = RoomResponse),
        (status = 400, description = "Game already started or no questions", body = ErrorBody),
        (status = 404, description = "Room not found", body = ErrorBody)
    )
)]
pub async fn start_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = room_service::start_room(&state, &code).await?;
    Ok(Json(room))
}

/// Submit an answer for the current question.
#[utoipa::path(
    post,
    path = "/multiplayer/rooms/{code}/answer",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer registered (repeats are ignored)", body = RoomResponse),
        (status = 400, description = "Game is not in progress or invalid payload", body = ErrorBody),
        (status = 404, description = "Room or player not found", body = ErrorBody)
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    ValidJson(payload): ValidJson<SubmitAnswerRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = room_service::submit_answer(&state, &code, payload).await?;
    Ok(Json(room))
}

/// Advance to the next question; past the last one the room finishes.
#[utoipa::path(
    post,
    path = "/multiplayer/rooms/{code}/next",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Question advanced or game finished", body = RoomResponse),
        (status = 400, description = "Game is not in progress", body = ErrorBody),
        (status = 404, description = "Room not found", body = ErrorBody)
    )
)]
pub async fn next_question(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = room_service::next_question(&state, &code).await?;
    Ok(Json(room))
}

/// Leave a room. Returns `{"deleted": true}` when the last player left.
#[utoipa::path(
    post,
    path = "/multiplayer/rooms/{code}/leave",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Updated room or deletion marker", body = LeaveRoomResponse),
        (status = 404, description = "Room or player not found", body = ErrorBody)
    )
)]
pub async fn leave_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    ValidJson(payload): ValidJson<PlayerRequest>,
) -> Result<Json<LeaveRoomResponse>, AppError> {
    let outcome = room_service::leave_room(&state, &code, payload).await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/multiplayer/rooms/{code}/leaderboard",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Players ranked by score", body = LeaderboardResponse),
        (status = 404, description = "Room not found", body = ErrorBody)
    )
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let board = room_service::leaderboard(&state, &code).await?;
    Ok(Json(board))
}

#[utoipa::path(
    get,
    path = "/multiplayer/sets/{set_id}/rooms",
    tag = "rooms",
    params(("set_id" = String, Path, description = "Study set identifier")),
    responses(
        (status = 200, description = "Live rooms for the study set", body = RoomListResponse)
    )
)]
pub async fn list_rooms_for_set(
    State(state): State<SharedState>,
    Path(set_id): Path<String>,
) -> Result<Json<RoomListResponse>, AppError> {
    let listing = room_service::rooms_by_set(&state, &set_id).await?;
    Ok(Json(listing))
}
