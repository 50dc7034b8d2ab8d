//! Consumer side of the room API: clients learn about changes only by polling
//! `GET /multiplayer/rooms/{code}`.

#[cfg(feature = "poll-client")]
mod http;
pub mod tracker;
pub mod watch;

#[cfg(feature = "poll-client")]
pub use http::HttpRoomSource;
pub use tracker::{PollOutcome, RoomChange, RoomTracker};
pub use watch::{DEFAULT_POLL_INTERVAL, RoomSource, watch_room};
