use std::sync::Arc;

use quiz_rooms_back::{
    app,
    config::AppConfig,
    dao::room_store::MemoryRoomStore,
    dto::room::RoomResponse,
    state::{AppState, RoomStatus},
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Serve the application with an in-memory store on an ephemeral port.
async fn spawn_app() -> String {
    let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryRoomStore::new())).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    format!("http://{addr}")
}

fn questions(count: usize) -> Value {
    (0..count)
        .map(|i| {
            json!({
                "question": format!("Question {i}?"),
                "options": ["A", "B", "C", "D"],
                "correctAnswer": 2,
                "explanation": "Because."
            })
        })
        .collect()
}

struct TestClient {
    http: Client,
    base: String,
}

impl TestClient {
    async fn new() -> Self {
        Self {
            http: Client::new(),
            base: spawn_app().await,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .http
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn create(&self, host: &str, count: usize) -> RoomResponse {
        let (status, body) = self
            .post(
                "/multiplayer/rooms",
                json!({ "setId": "set-1", "hostName": host, "questions": questions(count) }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        serde_json::from_value(body).unwrap()
    }

    async fn act(&self, code: &str, action: &str, body: Value) -> (StatusCode, Value) {
        self.post(&format!("/multiplayer/rooms/{code}/{action}"), body)
            .await
    }

    async fn room(&self, code: &str) -> RoomResponse {
        let (status, body) = self.get(&format!("/multiplayer/rooms/{code}")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        serde_json::from_value(body).unwrap()
    }
}

fn score(room: &RoomResponse, name: &str) -> u32 {
    room.players
        .iter()
        .find(|player| player.name == name)
        .map(|player| player.score)
        .unwrap()
}

/// Create with Alice and two questions, add Bob, start, both answer.
async fn played_first_question(client: &TestClient) -> RoomResponse {
    let room = client.create("Alice", 2).await;
    let (status, _) = client
        .act(&room.code, "join", json!({ "playerName": "Bob" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = client.act(&room.code, "start", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    client
        .act(
            &room.code,
            "answer",
            json!({ "playerName": "Alice", "isCorrect": true }),
        )
        .await;
    let (status, body) = client
        .act(
            &room.code,
            "answer",
            json!({ "playerName": "Bob", "isCorrect": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    serde_json::from_value(body).unwrap()
}

#[tokio::test]
async fn create_then_get_returns_lobby() {
    let client = TestClient::new().await;
    let created = client.create("Alice", 2).await;

    let fetched = client.room(&created.code.to_lowercase()).await;
    assert_eq!(fetched.status, RoomStatus::Waiting);
    assert_eq!(fetched.players.len(), 1);
    assert_eq!(fetched.host, "Alice");
    assert_eq!(fetched.current_question_index, 0);
    assert_eq!(fetched.questions.len(), 2);
    assert!(!fetched.show_leaderboard);
}

#[tokio::test]
async fn both_players_answering_reveals_leaderboard() {
    let client = TestClient::new().await;
    let room = played_first_question(&client).await;

    assert!(room.show_leaderboard);
    assert_eq!(room.answered_players, ["Alice", "Bob"]);
    assert_eq!(score(&room, "Alice"), 1);
    assert_eq!(score(&room, "Bob"), 0);
}

#[tokio::test]
async fn next_question_resets_the_round() {
    let client = TestClient::new().await;
    let room = played_first_question(&client).await;

    let (status, body) = client.act(&room.code, "next", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let room: RoomResponse = serde_json::from_value(body).unwrap();
    assert_eq!(room.current_question_index, 1);
    assert!(!room.show_leaderboard);
    assert!(room.answered_players.is_empty());
    assert_eq!(room.status, RoomStatus::Playing);

    let (_, body) = client.act(&room.code, "next", json!({})).await;
    let room: RoomResponse = serde_json::from_value(body).unwrap();
    assert_eq!(room.status, RoomStatus::Finished);
    assert_eq!(room.current_question_index, 1);

    let (status, body) = client.act(&room.code, "next", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "game is not in progress");
    assert_eq!(body["kind"], "invalid_state");
}

#[tokio::test]
async fn duplicate_name_is_rejected_without_changes() {
    let client = TestClient::new().await;
    let room = client.create("Alice", 1).await;

    let (status, body) = client
        .act(&room.code, "join", json!({ "playerName": " alice " }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "player name already taken");
    assert_eq!(body["kind"], "conflict");

    let after = client.room(&room.code).await;
    assert_eq!(after, room);
}

#[tokio::test]
async fn join_after_start_is_rejected() {
    let client = TestClient::new().await;
    let room = client.create("Alice", 1).await;
    client.act(&room.code, "start", json!({})).await;

    let (status, body) = client
        .act(&room.code, "join", json!({ "playerName": "Bob" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "game already started");
    assert_eq!(body["kind"], "invalid_state");
}

#[tokio::test]
async fn last_player_leaving_deletes_room() {
    let client = TestClient::new().await;
    let room = client.create("Alice", 1).await;
    client
        .act(&room.code, "join", json!({ "playerName": "Bob" }))
        .await;

    let (status, body) = client
        .act(&room.code, "leave", json!({ "playerName": "Alice" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["host"], "Bob");

    let (status, body) = client
        .act(&room.code, "leave", json!({ "playerName": "Bob" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": true }));

    let (status, body) = client.get(&format!("/multiplayer/rooms/{}", room.code)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn concurrent_answers_all_register() {
    const PLAYERS: usize = 8;

    let client = Arc::new(TestClient::new().await);
    let room = client.create("P0", 1).await;
    for i in 1..PLAYERS {
        let (status, _) = client
            .act(&room.code, "join", json!({ "playerName": format!("P{i}") }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    client.act(&room.code, "start", json!({})).await;

    let submissions = (0..PLAYERS).map(|i| {
        let client = Arc::clone(&client);
        let code = room.code.clone();
        tokio::spawn(async move {
            client
                .act(
                    &code,
                    "answer",
                    json!({ "playerName": format!("P{i}"), "selectedOption": 2 }),
                )
                .await
        })
    });

    let mut revealing = 0;
    for handle in futures::future::join_all(submissions).await {
        let (status, body) = handle.unwrap();
        assert_eq!(status, StatusCode::OK, "{body}");
        let room: RoomResponse = serde_json::from_value(body).unwrap();
        if room.answered_players.len() == PLAYERS {
            assert!(room.show_leaderboard);
            revealing += 1;
        }
    }
    assert_eq!(revealing, 1);

    let room = client.room(&room.code).await;
    assert_eq!(room.answered_players.len(), PLAYERS);
    assert!(room.show_leaderboard);
    assert!(room.players.iter().all(|player| player.score == 1));
}

#[tokio::test]
async fn repeated_answer_scores_once() {
    let client = TestClient::new().await;
    let room = client.create("Alice", 1).await;
    client.act(&room.code, "start", json!({})).await;

    for _ in 0..2 {
        let (status, _) = client
            .act(
                &room.code,
                "answer",
                json!({ "playerName": "Alice", "isCorrect": true }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let room = client.room(&room.code).await;
    assert_eq!(score(&room, "Alice"), 1);
    assert_eq!(room.answered_players, ["Alice"]);
}

#[tokio::test]
async fn malformed_requests_use_the_error_body() {
    let client = TestClient::new().await;
    let room = client.create("Alice", 1).await;

    let (status, body) = client
        .act(&room.code, "answer", json!({ "playerName": "Alice" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = client
        .post(
            "/multiplayer/rooms",
            json!({ "setId": "set-1", "hostName": "   ", "questions": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = client
        .act(&room.code, "join", json!({ "name": "Bob" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn start_without_questions_is_rejected() {
    let client = TestClient::new().await;
    let room = client.create("Alice", 0).await;

    let (status, body) = client.act(&room.code, "start", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_state");
}

#[tokio::test]
async fn leaderboard_and_set_listing() {
    let client = TestClient::new().await;
    let room = played_first_question(&client).await;

    let (status, body) = client
        .get(&format!("/multiplayer/rooms/{}/leaderboard", room.code))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPlayers"], 2);
    assert_eq!(body["totalQuestions"], 2);
    assert_eq!(body["leaderboard"][0]["name"], "Alice");
    assert_eq!(body["leaderboard"][0]["rank"], 1);
    assert_eq!(body["leaderboard"][1]["name"], "Bob");

    let (status, body) = client.get("/multiplayer/sets/set-1/rooms").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rooms"][0]["code"], room.code.as_str());
    assert_eq!(body["rooms"][0]["playerCount"], 2);
}

#[tokio::test]
async fn healthcheck_reports_ok_with_a_store() {
    let client = TestClient::new().await;
    let (status, body) = client.get("/healthcheck").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}
