use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz rooms backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::start_room,
        crate::routes::rooms::submit_answer,
        crate::routes::rooms::next_question,
        crate::routes::rooms::leave_room,
        crate::routes::rooms::get_leaderboard,
        crate::routes::rooms::list_rooms_for_set,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::QuestionInput,
            crate::dto::room::PlayerRequest,
            crate::dto::room::SubmitAnswerRequest,
            crate::dto::room::RoomResponse,
            crate::dto::room::PlayerDto,
            crate::dto::room::QuestionDto,
            crate::dto::room::LeaveRoomResponse,
            crate::dto::room::RoomDeleted,
            crate::dto::room::RoomSummary,
            crate::dto::room::RoomListResponse,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::leaderboard::LeaderboardEntry,
            crate::state::RoomStatus,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Multiplayer quiz rooms"),
    )
)]
pub struct ApiDoc;
