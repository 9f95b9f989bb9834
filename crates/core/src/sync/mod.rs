//! Sync domain: entity kinds, LWW policy, gateway contract and the engine.

mod engine;
mod gateway;
mod scheduler;
mod state;

pub use engine::*;
pub use gateway::*;
pub use scheduler::*;
pub use state::*;


use serde::{Deserialize, Serialize};

/// Entity kinds that participate in sync.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    Goal,
    Account,
    ForecastLine,
    Movement,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Task,
        EntityKind::Goal,
        EntityKind::Account,
        EntityKind::ForecastLine,
        EntityKind::Movement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::Goal => "goal",
            EntityKind::Account => "account",
            EntityKind::ForecastLine => "forecast_line",
            EntityKind::Movement => "movement",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger source for sync cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Startup,
    Foreground,
    LocalMutation,
    Periodic,
    Manual,
}

/// Determines whether an incoming remote copy should overwrite local state.
///
/// Rule: no local timestamp, or a strictly later remote timestamp, means the
/// remote wins; a tie keeps the local copy (which stays dirty and wins by a
/// later push).
pub fn remote_wins(local_updated_at: Option<&str>, remote_client_timestamp: &str) -> bool {
    let Some(local) = local_updated_at else {
        return true;
    };

    let local_parsed =
        chrono::DateTime::parse_from_rfc3339(local).map(|dt| dt.timestamp_millis());
    let remote_parsed = chrono::DateTime::parse_from_rfc3339(remote_client_timestamp)
        .map(|dt| dt.timestamp_millis());

    if let (Ok(local_ts), Ok(remote_ts)) = (local_parsed, remote_parsed) {
        return remote_ts > local_ts;
    }

    // Fallback to lexical ordering when one/both timestamps are non-RFC3339.
    remote_client_timestamp > local
}
