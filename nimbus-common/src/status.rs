use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalised server lifecycle status.
///
/// Nova exposes a larger vocabulary (`ACTIVE`, `BUILD`, `SHUTOFF`, ...); [`ServerStatus::from_nova`]
/// folds it down to the handful of states chat users care about.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerStatus {
    Running,
    Provisioning,
    Reboot,
    Stopped,
    Error,
    Terminated,
    Unknown,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Running => "RUNNING",
            ServerStatus::Provisioning => "PROVISIONING",
            ServerStatus::Reboot => "REBOOT",
            ServerStatus::Stopped => "STOPPED",
            ServerStatus::Error => "ERROR",
            ServerStatus::Terminated => "TERMINATED",
            ServerStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn from_nova(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => ServerStatus::Running,
            "BUILD" | "REBUILD" | "RESIZE" | "VERIFY_RESIZE" | "MIGRATING" => {
                ServerStatus::Provisioning
            }
            "REBOOT" | "HARD_REBOOT" => ServerStatus::Reboot,
            "SHUTOFF" | "SUSPENDED" | "PAUSED" | "SHELVED" | "SHELVED_OFFLOADED" | "STOPPED" => {
                ServerStatus::Stopped
            }
            "ERROR" => ServerStatus::Error,
            "DELETED" | "SOFT_DELETED" => ServerStatus::Terminated,
            _ => ServerStatus::Unknown,
        }
    }

    /// States a freshly created server will not leave on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerStatus::Running | ServerStatus::Error | ServerStatus::Terminated
        )
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
