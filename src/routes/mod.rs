use axum::Router;

use crate::state::SharedState;

pub mod docs;
mod extract;
pub mod health;
pub mod rooms;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router().merge(rooms::router());

    api_router.merge(docs::router()).with_state(state)
}
