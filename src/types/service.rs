use crate::types::port::ListeningPort;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Status reported by `brew services`.
///
/// Unrecognized strings decode to `Unknown` instead of failing the whole list.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ServiceStatus {
    Started,
    Stopped,
    Scheduled,
    /// `none`: the service is not loaded.
    NotLoaded,
    Error,
    #[default]
    Unknown,
}

impl ServiceStatus {
    pub(crate) fn parse(s: &str) -> Self {
        match s {
            "started" => ServiceStatus::Started,
            "stopped" => ServiceStatus::Stopped,
            "scheduled" => ServiceStatus::Scheduled,
            "none" => ServiceStatus::NotLoaded,
            "error" => ServiceStatus::Error,
            _ => ServiceStatus::Unknown,
        }
    }

    /// Wire value used by `brew services --json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Started => "started",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Scheduled => "scheduled",
            ServiceStatus::NotLoaded => "none",
            ServiceStatus::Error => "error",
            ServiceStatus::Unknown => "unknown",
        }
    }

    /// Human-readable label.
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceStatus::Started => "Running",
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::Scheduled => "Scheduled",
            ServiceStatus::NotLoaded => "Not Loaded",
            ServiceStatus::Error => "Error",
            ServiceStatus::Unknown => "Unknown",
        }
    }

    /// `started` and `scheduled` count as active.
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceStatus::Started | ServiceStatus::Scheduled)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl Serialize for ServiceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(ServiceStatus::Unknown, ServiceStatus::parse))
    }
}

const LAUNCH_DAEMONS_PREFIX: &str = "/Library/LaunchDaemons/";

/// One entry of `brew services list --json`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ServiceDescriptor {
    pub name: String,
    pub status: ServiceStatus,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

impl ServiceDescriptor {
    /// Build a descriptor with only a name and status.
    pub fn new(name: impl Into<String>, status: ServiceStatus) -> Self {
        Self {
            name: name.into(),
            status,
            user: None,
            file: None,
            exit_code: None,
        }
    }

    /// Set the owning user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the launchd definition file.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Whether the service runs as a system daemon (plist under `/Library/LaunchDaemons/`, or
    /// owned by root).
    pub fn is_system_service(&self) -> bool {
        is_system(self.file.as_deref(), self.user.as_deref())
    }
}

/// The single element of `brew services info <name> --json`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ServiceDetail {
    pub name: String,
    #[serde(default)]
    pub service_name: Option<String>,
    pub status: ServiceStatus,
    #[serde(default)]
    pub running: Option<bool>,
    #[serde(default)]
    pub loaded: Option<bool>,
    #[serde(default)]
    pub schedulable: Option<bool>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub registered: Option<bool>,
    #[serde(default)]
    pub loaded_file: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub root_dir: Option<String>,
    #[serde(default)]
    pub log_path: Option<String>,
    #[serde(default)]
    pub error_log_path: Option<String>,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub cron: Option<String>,

    /// Listening ports found at runtime. Never part of the brew JSON.
    #[serde(skip)]
    pub detected_ports: Option<Vec<ListeningPort>>,
}

impl ServiceDetail {
    /// Return a copy with `detected_ports` replaced.
    pub fn with_detected_ports(mut self, ports: Vec<ListeningPort>) -> Self {
        self.detected_ports = Some(ports);
        self
    }

    /// Same rule as [`ServiceDescriptor::is_system_service`].
    pub fn is_system_service(&self) -> bool {
        is_system(self.file.as_deref(), self.user.as_deref())
    }
}

fn is_system(file: Option<&str>, user: Option<&str>) -> bool {
    file.is_some_and(|f| f.starts_with(LAUNCH_DAEMONS_PREFIX)) || user == Some("root")
}
