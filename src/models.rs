//! Data model of the rport REST and WebSocket APIs.
//!
//! Field names follow the server's JSON. Everything is `#[serde(default)]` so
//! that partial payloads (e.g. a tunnel returned with only `id` and `lhost`)
//! still decode.

use serde::{Deserialize, Deserializer, Serialize};

/// The server encodes empty lists as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Envelope used by every rport REST response.
#[derive(Debug, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// A managed endpoint ("client" in rport terms).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub os: String,
    pub os_arch: String,
    pub os_family: String,
    pub os_kernel: String,
    pub hostname: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ipv4: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub ipv6: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    pub version: String,
    pub address: String,
    pub timezone: String,
    pub connection_state: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tunnels: Vec<Tunnel>,
}

/// A provisioned tunnel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunnel {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub lhost: String,
    pub lport: String,
    pub rhost: String,
    pub rport: String,
    pub lport_random: bool,
    pub scheme: String,
    pub acl: String,
}

/// A freshly created tunnel plus a hint on how to use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelCreated {
    #[serde(flatten)]
    pub tunnel: Tunnel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

/// Outcome marker for operations without a body, e.g. tunnel deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: String,
}

impl StatusReport {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
        }
    }

    /// Announces the cleanup that follows an ssh session.
    pub fn deletion() -> Self {
        Self {
            status: "Deletion Status".to_string(),
        }
    }
}

/// The authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Me {
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub groups: Vec<String>,
    pub two_fa_send_to: String,
}

/// Session token returned by `GET /api/v1/login`.
#[derive(Debug, Deserialize)]
pub struct LoginToken {
    pub token: String,
}

/// Frame submitted over the execution channel.
///
/// `command` and `script` are mutually exclusive; `script` carries the
/// base64-encoded file content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsScriptCommand {
    pub client_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub script: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub interpreter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cwd: String,
    pub is_sudo: bool,
    pub execute_concurrently: bool,
    pub abort_on_error: bool,
    pub timeout_sec: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobResult {
    pub stdout: String,
    pub stderr: String,
}

/// One execution of a command or script on one client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub jid: String,
    pub status: String,
    pub client_id: String,
    pub client_name: String,
    pub command: String,
    pub interpreter: String,
    pub cwd: String,
    pub is_sudo: bool,
    pub is_script: bool,
    pub timeout_sec: u64,
    pub created_by: String,
    pub multi_job_id: String,
    pub error: String,
    pub result: Option<JobResult>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl Job {
    /// A job is terminal once the server reports any status other than a
    /// running one.
    pub fn is_terminal(&self) -> bool {
        !self.status.is_empty() && !matches!(self.status.as_str(), "in_progress" | "running")
    }
}
