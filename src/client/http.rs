use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};

use crate::{
    client::{tracker::PollOutcome, watch::RoomSource},
    dto::room::RoomResponse,
};

/// [`RoomSource`] reading rooms from a running server over HTTP.
#[derive(Clone)]
pub struct HttpRoomSource {
    client: Client,
    base_url: Arc<str>,
}

impl HttpRoomSource {
    /// Poll the server reachable at `base_url` (for example `http://localhost:8080`).
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Same as [`HttpRoomSource::new`] with a preconfigured client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        }
    }
}

impl RoomSource for HttpRoomSource {
    fn fetch_room(&self, code: &str) -> BoxFuture<'static, PollOutcome> {
        let url = format!("{}/multiplayer/rooms/{}", self.base_url, code);
        let client = self.client.clone();

        Box::pin(async move {
            let response = match client.get(&url).send().await {
                Ok(response) => response,
                Err(err) => return PollOutcome::Failed(err.to_string()),
            };

            match response.status() {
                StatusCode::NOT_FOUND => PollOutcome::NotFound,
                status if status.is_success() => match response.json::<RoomResponse>().await {
                    Ok(room) => PollOutcome::Found(Box::new(room)),
                    Err(err) => PollOutcome::Failed(err.to_string()),
                },
                status => PollOutcome::Failed(format!("unexpected status {status}")),
            }
        })
    }
}
