//! Request and response shapes exchanged with the execution backend.
//!
//! These are backend-neutral: [`EcsBackend`](super::EcsBackend) maps them to
//! and from the ECS API, test doubles build them directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stop code reported when the task's essential container exited on its own.
pub const STOP_CODE_ESSENTIAL_EXITED: &str = "EssentialContainerExited";

/// Everything needed to start one execution unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub cluster: String,
    pub task_definition: String,
    /// Container receiving the environment overrides.
    pub container_name: String,
    pub network: NetworkSpec,
    /// Environment bundle handed to the container, in order.
    pub environment: Vec<(String, String)>,
}

impl RunRequest {
    pub fn env(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Network placement of the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub assign_public_ip: bool,
}

/// Lifecycle phase reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPhase {
    Provisioning,
    Pending,
    Running,
    Stopped,
    /// Any phase the engine has no special handling for.
    Other(String),
}

impl TaskPhase {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PROVISIONING" => TaskPhase::Provisioning,
            "PENDING" => TaskPhase::Pending,
            "RUNNING" => TaskPhase::Running,
            "STOPPED" => TaskPhase::Stopped,
            _ => TaskPhase::Other(raw.to_string()),
        }
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPhase::Provisioning => write!(f, "PROVISIONING"),
            TaskPhase::Pending => write!(f, "PENDING"),
            TaskPhase::Running => write!(f, "RUNNING"),
            TaskPhase::Stopped => write!(f, "STOPPED"),
            TaskPhase::Other(raw) => write!(f, "{raw}"),
        }
    }
}

/// One container of the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubUnit {
    pub name: Option<String>,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
}

/// Snapshot of a task as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub phase: TaskPhase,
    pub stop_code: Option<String>,
    pub stopped_reason: Option<String>,
    pub sub_units: Vec<SubUnit>,
}

impl TaskDescriptor {
    /// A task still in the given phase, with no stop information.
    pub fn active(phase: TaskPhase) -> Self {
        Self {
            phase,
            stop_code: None,
            stopped_reason: None,
            sub_units: Vec::new(),
        }
    }

    /// A stopped task whose single container exited with `exit_code`.
    pub fn exited(exit_code: i32) -> Self {
        Self {
            phase: TaskPhase::Stopped,
            stop_code: Some(STOP_CODE_ESSENTIAL_EXITED.to_string()),
            stopped_reason: Some("Essential container in task exited".to_string()),
            sub_units: vec![SubUnit {
                name: Some("transcoder".to_string()),
                exit_code: Some(exit_code),
                reason: None,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parse_known_values() {
        assert_eq!(TaskPhase::parse("PROVISIONING"), TaskPhase::Provisioning);
        assert_eq!(TaskPhase::parse("pending"), TaskPhase::Pending);
        assert_eq!(TaskPhase::parse("RUNNING"), TaskPhase::Running);
        assert_eq!(TaskPhase::parse("STOPPED"), TaskPhase::Stopped);
    }

    #[test]
    fn phase_parse_keeps_unknown_raw() {
        let phase = TaskPhase::parse("DEPROVISIONING");
        assert_eq!(phase, TaskPhase::Other("DEPROVISIONING".into()));
        assert_eq!(phase.to_string(), "DEPROVISIONING");
    }

    #[test]
    fn run_request_env_lookup() {
        let req = RunRequest {
            cluster: "c".into(),
            task_definition: "td".into(),
            container_name: "transcoder".into(),
            network: NetworkSpec {
                subnets: vec![],
                security_groups: vec![],
                assign_public_ip: true,
            },
            environment: vec![("INPUT_KEY".into(), "uploads/a.mp4".into())],
        };
        assert_eq!(req.env("INPUT_KEY"), Some("uploads/a.mp4"));
        assert_eq!(req.env("MISSING"), None);
    }

    #[test]
    fn exited_descriptor_shape() {
        let d = TaskDescriptor::exited(3);
        assert_eq!(d.phase, TaskPhase::Stopped);
        assert_eq!(d.stop_code.as_deref(), Some(STOP_CODE_ESSENTIAL_EXITED));
        assert_eq!(d.sub_units[0].exit_code, Some(3));
    }
}
