use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Overall service condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A room store is installed and answering.
    Ok,
    /// No usable room store; room endpoints answer 503.
    Degraded,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

impl HealthResponse {
    pub fn new(degraded: bool) -> Self {
        Self {
            status: if degraded {
                HealthStatus::Degraded
            } else {
                HealthStatus::Ok
            },
        }
    }
}
