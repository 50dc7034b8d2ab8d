/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room code generation and normalization.
pub mod room_code;
/// Room lifecycle operations: create, join, answer, advance, leave.
pub mod room_service;
/// Storage connection supervision and expired-room eviction.
pub mod storage_supervisor;
