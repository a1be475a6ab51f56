use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub mod status;

pub use status::ServerStatus;

// --- Entities (as returned by the compute provider) ---

/// A named compute sizing template.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    /// Megabytes.
    pub ram: u64,
    /// Gigabytes.
    pub disk: u64,
    pub vcpus: u32,
    /// Megabytes. Nova reports "no swap" as an empty string.
    #[serde(default, deserialize_with = "swap_from_nova")]
    pub swap: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Server {
    pub id: String,
    pub name: String,
    /// Fixed (private) addresses, in the order the provider lists them.
    #[serde(default)]
    pub private_addresses: Vec<String>,
    pub status: ServerStatus,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub tenant_id: String,
    pub created: DateTime<Utc>,
}

impl Server {
    /// Booted and reachable; the end of a successful create.
    pub fn is_running(&self) -> bool {
        self.status == ServerStatus::Running
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
}

/// Everything needed to boot a server once flavor and image are resolved to ids.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerCreateRequest {
    pub name: String,
    pub flavor_id: String,
    pub image_id: String,
    pub key_name: String,
}

fn swap_from_nova<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    match raw {
        serde_json::Value::Number(n) => Ok(n.as_u64().unwrap_or(0)),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(0),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid swap '{}': {}", s, e))),
        serde_json::Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!("invalid swap value: {}", other))),
    }
}
